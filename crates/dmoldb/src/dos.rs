//! Density-of-states rendering: Gaussian broadening of the orbital
//! eigenvalues onto a fixed grid, then a PNG per accepted structure.

use std::{error::Error, path::Path};

use plotters::prelude::*;
use serde::{Deserialize, Serialize};

/// sign applied to eigenvalues before broadening. the collaborator
/// convention plots level spectra on a positive axis, so the default
/// negates the (negative) bound-state eigenvalues
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SignConvention {
    #[default]
    Flip,
    Keep,
}

impl SignConvention {
    pub fn apply(&self, levels: &[(f64, f64)]) -> Vec<(f64, f64)> {
        match self {
            SignConvention::Flip => {
                levels.iter().map(|&(e, occ)| (-e, occ)).collect()
            }
            SignConvention::Keep => levels.to_vec(),
        }
    }
}

const GRID_POINTS: usize = 2000;

fn gaussian(x: f64, sigma: f64) -> f64 {
    let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    norm * (-x * x / (2.0 * sigma * sigma)).exp()
}

/// occupation-weighted, peak-normalized DOS of `levels` (eigenvalue in
/// eV, occupation) on a grid spanning the levels plus a 5 eV margin,
/// clamped to [-20, 10] eV. empty input or a vanishing peak yields None
pub fn broadened_dos(
    levels: &[(f64, f64)],
    sigma: f64,
) -> Option<(Vec<f64>, Vec<f64>)> {
    if levels.is_empty() {
        return None;
    }
    let e_min = levels.iter().map(|l| l.0).fold(f64::INFINITY, f64::min);
    let e_max =
        levels.iter().map(|l| l.0).fold(f64::NEG_INFINITY, f64::max);
    let lo = (e_min - 5.0).max(-20.0);
    let hi = (e_max + 5.0).min(10.0);
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    let grid: Vec<f64> =
        (0..GRID_POINTS).map(|i| lo + i as f64 * step).collect();
    let mut dos: Vec<f64> = grid
        .iter()
        .map(|&e| {
            levels
                .iter()
                .map(|&(level, occ)| occ * gaussian(e - level, sigma))
                .sum()
        })
        .collect();
    let peak = dos.iter().cloned().fold(0.0, f64::max);
    if peak < 1e-10 {
        return None;
    }
    for d in dos.iter_mut() {
        *d /= peak;
    }
    Some((grid, dos))
}

/// render the DOS of `levels` to a PNG at `out`
pub fn plot_dos(
    out: &Path,
    title: &str,
    levels: &[(f64, f64)],
    sigma: f64,
) -> Result<(), Box<dyn Error>> {
    let Some((grid, dos)) = broadened_dos(levels, sigma) else {
        return Err(format!("{title}: no levels to plot").into());
    };
    if let Some(dir) = out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let root = BitMapBackend::new(out, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let (lo, hi) = (grid[0], *grid.last().unwrap());
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0.0..1.05)?;
    chart
        .configure_mesh()
        .x_desc("Energy (eV)")
        .y_desc("DOS")
        .draw()?;
    chart.draw_series(LineSeries::new(
        grid.into_iter().zip(dos),
        &BLACK,
    ))?;
    root.present()?;
    Ok(())
}
