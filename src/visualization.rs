//! Presentation helpers: the cosmetic demo curve and number formatters.
//!
//! Nothing here feeds a `BacktestResult`; the engine's own curve lives in
//! `performance`.

use crate::models::EquityPoint;
use std::f64::consts::PI;

pub const DEFAULT_DEMO_POINTS: usize = 240;

const MIN_MAGNITUDE: f64 = 0.05;
const TAIL_PIVOT: f64 = 0.95;

fn ease_in_out_cubic(x: f64) -> f64 {
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}

fn bump(t: f64, center: f64, width: f64) -> f64 {
    (-((t - center) / width).powi(2)).exp()
}

/// Builds a stylised equity path of `points` steps that starts at 1.0 and
/// ends exactly at `1 + final_return`.
///
/// The shape has an eased trend, a dip near the start, a dip before the
/// last rebalance and a surge into the end. The final five percent of the
/// path never decreases before it is tilted onto the end value.
pub fn demo_curve(final_return: f64, points: usize) -> Vec<EquityPoint> {
    let end_value = 1.0 + final_return;
    match points {
        0 => return Vec::new(),
        1 => {
            return vec![EquityPoint {
                t: "0".to_string(),
                v: end_value,
            }]
        }
        _ => {}
    }

    let sign = if final_return >= 0.0 { 1.0 } else { -1.0 };
    let magnitude = final_return.abs().max(MIN_MAGNITUDE);
    let early_dip_amp = (0.4 * magnitude + 0.06).min(0.35);
    let mid_dip_amp = (0.25 * magnitude + 0.04).min(0.22);
    let late_surge_amp = (0.5 * magnitude + 0.08).min(0.35);

    let last = points - 1;
    let mut values: Vec<f64> = (0..points)
        .map(|i| {
            let t = i as f64 / last as f64;
            let trend = magnitude * ease_in_out_cubic(t);
            let early_dip = -early_dip_amp * bump(t, 0.06, 0.035);
            let pre_rebalance_dip = -mid_dip_amp * bump(t, 0.88, 0.05);
            let end_spike = late_surge_amp * bump(t, 0.985, 0.018);
            let end_power = late_surge_amp * ((t - TAIL_PIVOT).max(0.0) / 0.05).powi(3);
            let wave = 0.01 * (10.0 * PI * t).sin();
            let path = trend
                + early_dip
                + pre_rebalance_dip
                + end_spike.max(0.0)
                + end_power.max(0.0)
                + wave;
            1.0 + sign * path
        })
        .collect();

    values[0] = 1.0;
    let pivot = ((TAIL_PIVOT * last as f64).floor() as usize).max(1);

    for i in pivot + 1..points {
        values[i] = values[i].max(values[i - 1]);
    }

    let delta = end_value - values[last];
    if delta != 0.0 {
        let span = (last - pivot).max(1) as f64;
        for (offset, value) in values[pivot..].iter_mut().enumerate() {
            *value += delta * offset as f64 / span;
        }
        values[last] = end_value;
    }

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| EquityPoint { t: i.to_string(), v })
        .collect()
}

/// Formats a fraction as a percentage, `0.1234` → `12.34%`.
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value * 100.0)
}

pub fn format_currency(value: f64, decimals: usize) -> String {
    format!("${:.*}", decimals, value)
}

pub fn format_number(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}
