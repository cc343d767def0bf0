//! Aggregate statistics over a store: a three-panel figure with the
//! composition counts, the cluster-size distribution, and the HOMO-LUMO
//! gap distribution.

use std::{collections::BTreeSet, error::Error, path::Path};

use plotters::prelude::*;
use rustc_hash::FxHashMap;

use crate::db::{Db, DbRecord};

/// how many compositions get their own bar before the rest collapse
/// into "Others"
const TOP_COMPOSITIONS: usize = 18;

/// the element-set label of a record: the distinct species, sorted and
/// concatenated, so every C/H/O cluster counts as one composition type
fn composition_label(rec: &DbRecord) -> String {
    let set: BTreeSet<&str> =
        rec.species.iter().map(String::as_str).collect();
    set.into_iter().collect()
}

fn composition_counts(records: &[DbRecord]) -> Vec<(String, usize)> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for rec in records {
        *counts.entry(composition_label(rec)).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if counts.len() > TOP_COMPOSITIONS {
        let others: usize =
            counts[TOP_COMPOSITIONS..].iter().map(|c| c.1).sum();
        counts.truncate(TOP_COMPOSITIONS);
        counts.push((String::from("Others"), others));
    }
    counts
}

/// cluster sizes binned by tens up to 110 atoms, with an overflow bin
fn size_bins(records: &[DbRecord]) -> Vec<usize> {
    let mut bins = vec![0; 12];
    for rec in records {
        let n = rec.natoms();
        bins[(n / 10).min(11)] += 1;
    }
    bins
}

fn gap_bins(gaps: &[f64], nbins: usize) -> (f64, Vec<usize>) {
    let max = gaps.iter().cloned().fold(0.0, f64::max) + 0.5;
    let mut bins = vec![0; nbins];
    for &g in gaps {
        let i = ((g / max) * nbins as f64) as usize;
        bins[i.min(nbins - 1)] += 1;
    }
    (max, bins)
}

/// render the statistics figure for `db` to a PNG at `out`
pub fn plot_stats(db: &Db, out: &Path) -> Result<(), Box<dyn Error>> {
    let records = db.records()?;
    if records.is_empty() {
        return Err(format!("{}: store is empty", db.path().display()).into());
    }
    let compositions = composition_counts(&records);
    let sizes = size_bins(&records);
    let gaps: Vec<f64> = records
        .iter()
        .filter_map(|r| r.params.get("GAP_DFT").copied())
        .collect();

    let root = BitMapBackend::new(out, (1800, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 3));

    {
        let ymax = compositions.iter().map(|c| c.1).max().unwrap_or(1);
        let labels: Vec<&str> =
            compositions.iter().map(|c| c.0.as_str()).collect();
        let mut chart = ChartBuilder::on(&panels[0])
            .caption("Cluster compositions", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(50)
            .build_cartesian_2d(
                0..compositions.len() as i32,
                0..(ymax + 1) as i32,
            )?;
        chart
            .configure_mesh()
            .x_labels(compositions.len())
            .x_label_formatter(&|x| {
                labels
                    .get(*x as usize)
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            })
            .y_desc("Counts")
            .draw()?;
        chart.draw_series(compositions.iter().enumerate().map(
            |(i, (_, c))| {
                Rectangle::new(
                    [(i as i32, 0), (i as i32 + 1, *c as i32)],
                    BLUE.mix(0.6).filled(),
                )
            },
        ))?;
    }

    {
        let ymax = sizes.iter().max().copied().unwrap_or(1);
        let mut chart = ChartBuilder::on(&panels[1])
            .caption("Cluster sizes", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..12i32, 0..(ymax + 1) as i32)?;
        chart
            .configure_mesh()
            .x_label_formatter(&|x| {
                if *x >= 11 {
                    String::from(">110")
                } else {
                    format!("{}", x * 10)
                }
            })
            .x_desc("Number of atoms in a cluster")
            .y_desc("Counts")
            .draw()?;
        chart.draw_series(sizes.iter().enumerate().map(|(i, c)| {
            Rectangle::new(
                [(i as i32, 0), (i as i32 + 1, *c as i32)],
                BLUE.mix(0.6).filled(),
            )
        }))?;
    }

    if !gaps.is_empty() {
        let (gmax, bins) = gap_bins(&gaps, 30);
        let ymax = bins.iter().max().copied().unwrap_or(1);
        let width = gmax / 30.0;
        let mut chart = ChartBuilder::on(&panels[2])
            .caption("HOMO-LUMO gaps", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..gmax, 0..(ymax + 1) as i32)?;
        chart
            .configure_mesh()
            .x_desc("Gap (eV)")
            .y_desc("Counts")
            .draw()?;
        chart.draw_series(bins.iter().enumerate().map(|(i, c)| {
            Rectangle::new(
                [
                    (i as f64 * width, 0),
                    ((i + 1) as f64 * width, *c as i32),
                ],
                BLUE.mix(0.6).filled(),
            )
        }))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outmol::read_output;

    fn records() -> Vec<DbRecord> {
        let res = read_output("testfiles/dmol/opt.outmol").unwrap();
        (1..=3)
            .map(|i| DbRecord::new(i, format!("H2O_{i}"), &res))
            .collect()
    }

    #[test]
    fn composition_labels() {
        let recs = records();
        assert_eq!(composition_label(&recs[0]), "HO");
        let counts = composition_counts(&recs);
        assert_eq!(counts, vec![(String::from("HO"), 3)]);
    }

    #[test]
    fn size_binning() {
        let recs = records();
        let bins = size_bins(&recs);
        assert_eq!(bins[0], 3);
        assert_eq!(bins.iter().sum::<usize>(), 3);
    }

    #[test]
    fn gap_binning() {
        let (max, bins) = gap_bins(&[0.1, 0.1, 2.4], 30);
        assert_eq!(max, 2.9);
        assert_eq!(bins.iter().sum::<usize>(), 3);
        assert_eq!(bins[1], 2);
    }
}
