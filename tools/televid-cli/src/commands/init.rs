//! Write a default configuration file.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use televid_common::config::{config_file_path, AppConfig};
use televid_cue_model::style::{StyleDefinition, StyleSheet};

#[derive(Serialize)]
struct StyleSheetFile<'a> {
    styles: Vec<&'a StyleDefinition>,
}

pub fn run(
    config_path: Option<PathBuf>,
    force: bool,
    styles: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config_file_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }

    let mut config = AppConfig::default();
    if let Some(sheet_path) = &styles {
        let builtin = StyleSheet::builtin();
        let file = StyleSheetFile {
            styles: builtin.iter().collect(),
        };
        if let Some(parent) = sheet_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(sheet_path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write {}", sheet_path.display()))?;
        config.style_sheet = Some(sheet_path.clone());
    }

    config
        .save_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Configuration written to {}", path.display());
    println!("  Engine: {} / {}", config.engine.ffmpeg, config.engine.ffprobe);
    println!("  Work dir: {}", config.work_dir.display());
    println!("  Font dir: {}", config.font_dir.display());
    for (id, font) in &config.fonts {
        println!("    {id}: {}", font.display());
    }
    if let Some(sheet) = &config.style_sheet {
        println!("  Style sheet: {}", sheet.display());
    }
    println!();
    println!("Place the font files under the font dir, then run `televid check`.");
    Ok(())
}
