pub mod demo_curve;
pub mod export_bars;
pub mod fetch_bars;
pub mod run_plan;
pub mod validate_plan;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Pretty JSON to `output` when given, stdout otherwise.
pub(crate) fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    write_text(&json, output)
}

pub(crate) fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory {}", parent.display())
                    })?;
                }
            }
            fs::write(path, text)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Wrote output to {}", path.display());
        }
        None => println!("{}", text.trim_end()),
    }
    Ok(())
}
