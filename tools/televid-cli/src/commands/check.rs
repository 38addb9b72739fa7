//! Check system capabilities.

use std::process::Command;

use televid_common::config::{config_file_path, AppConfig};
use televid_font_resolver::FontResolver;
use televid_render_engine::EngineCommand;

use super::load_styles;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("televid System Check");
    println!("{}", "=".repeat(50));

    let mut required_ok = true;

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!(
            "[WARN] Config: {} not found, using defaults (run `televid init`)",
            config_path.display()
        );
    }

    // Engine programs
    for program in [&config.engine.ffmpeg, &config.engine.ffprobe] {
        if EngineCommand::new(program).is_available() {
            println!("[OK] Engine: {program}");
        } else {
            println!("[FAIL] Engine: {program} not found on PATH");
            required_ok = false;
        }
    }

    if required_ok {
        if has_drawtext(&config.engine.ffmpeg) {
            println!("[OK] Filter: drawtext");
        } else {
            println!("[FAIL] Filter: drawtext missing (ffmpeg built without libfreetype?)");
            required_ok = false;
        }
    }

    // Fonts referenced by the style sheet
    match load_styles(config, None) {
        Ok(styles) => {
            let count = styles.len();
            let resolver = FontResolver::new(config.resolved_fonts(), styles);
            match resolver.verify_all() {
                Ok(resolved) => {
                    println!("[OK] Styles: {count} loaded");
                    for style in &resolved {
                        println!("     {} -> {}", style.style.name, style.font_path.display());
                    }
                }
                Err(e) => {
                    println!("[FAIL] Fonts: {e}");
                    required_ok = false;
                }
            }
        }
        Err(e) => {
            println!("[FAIL] Styles: {e:#}");
            required_ok = false;
        }
    }

    // Work directory
    match std::fs::create_dir_all(&config.work_dir) {
        Ok(()) => println!("[OK] Work dir: {}", config.work_dir.display()),
        Err(e) => {
            println!("[FAIL] Work dir: {} ({e})", config.work_dir.display());
            required_ok = false;
        }
    }

    println!();
    if required_ok {
        println!("All required capabilities are available. televid is ready.");
        Ok(())
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
        anyhow::bail!("system check failed")
    }
}

fn has_drawtext(ffmpeg: &str) -> bool {
    Command::new(ffmpeg)
        .args(["-hide_banner", "-filters"])
        .output()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some("drawtext"))
        })
        .unwrap_or(false)
}
