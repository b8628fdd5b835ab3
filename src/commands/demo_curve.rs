use crate::commands::write_json;
use crate::visualization::demo_curve;
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub async fn run(final_return: f64, points: usize, output: Option<&Path>) -> Result<()> {
    if !final_return.is_finite() {
        return Err(anyhow!("--final-return must be a finite number"));
    }
    let curve = demo_curve(final_return, points);
    info!(
        "Generated demo curve with {} point(s) ending at {:.4}",
        curve.len(),
        1.0 + final_return
    );
    write_json(&curve, output)
}
