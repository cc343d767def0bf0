//! The harvesting pipeline: discover workspaces, collect and deduplicate
//! candidates (or reconcile the converged step), and persist the
//! survivors. no failure in one workspace ever aborts its siblings.

use std::path::Path;

use anyhow::Context;

use crate::{
    cluster,
    collect::{self, SourceId},
    config::{Config, Mode, RunPaths},
    db::{Db, DbRecord, NameSeq},
    dos, elog,
    lines::LineBuffer,
    outmol::{self, OutmolResult},
    reconcile,
};

/// run the configured pipeline over every workspace under `root`
pub fn run(root: &Path, config: &Config, paths: &RunPaths) -> anyhow::Result<()> {
    let db = Db::open(&paths.db);
    let mut names = NameSeq::new();
    match config.mode {
        Mode::Direct => {
            let candidates =
                collect::collect_direct(root, &config.result_file);
            log::info!(
                "{} candidates found under {}",
                candidates.len(),
                root.display()
            );
            let groups =
                cluster::group_candidates(candidates, config.rmsd_cutoff);
            for sel in cluster::select(&groups) {
                log::info!(
                    "keeping structure {}, energy {} eV",
                    sel.source,
                    sel.energy
                );
                let SourceId::Path(path) = &sel.source else {
                    continue;
                };
                extract_and_persist(
                    &db, &mut names, config, paths, path,
                )?;
            }
        }
        Mode::Trajectory => {
            for search in workspaces(root)? {
                if let Err(e) =
                    harvest_search(&search, config, paths, &db, &mut names)
                {
                    log::error!("{}: {e:#}", search.display());
                }
            }
        }
        Mode::Reconcile => {
            for search in workspaces(root)? {
                if let Err(e) =
                    reconcile_search(&search, config, paths, &db, &mut names)
                {
                    log::error!("{}: {e:#}", search.display());
                }
            }
        }
    }
    log::info!(
        "all workspaces done, {} records in {}",
        db.count(),
        paths.db.display()
    );
    Ok(())
}

fn workspaces(root: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let found = collect::find_workspaces(root)?;
    if found.is_empty() {
        log::warn!("no search workspaces under {}", root.display());
    }
    Ok(found)
}

/// trajectory mode for one workspace: population trace in, deduplicated
/// selections mapped back to their working folders
fn harvest_search(
    search: &Path,
    config: &Config,
    paths: &RunPaths,
    db: &Db,
    names: &mut NameSeq,
) -> anyhow::Result<()> {
    let Some(candidates) =
        collect::collect_trajectory(search, &config.trace_file)
    else {
        // already logged as a skip
        return Ok(());
    };
    let trace_log = LineBuffer::read(search.join(&config.log_file))
        .with_context(|| format!("missing {}", config.log_file))?;
    log::info!("processing {}", search.display());
    let groups =
        cluster::group_candidates(candidates, config.rmsd_cutoff);
    for sel in cluster::select(&groups) {
        log::info!(
            "keeping structure {}, energy {} eV",
            sel.source,
            sel.energy
        );
        let &SourceId::Population(pop) = &sel.source else {
            continue;
        };
        let Some(folder) = elog::locate_population_folder(&trace_log, pop)
        else {
            log::warn!("no working folder for pop {pop}, skipping");
            continue;
        };
        let path = search.join(&folder).join(&config.result_file);
        extract_and_persist(db, names, config, paths, &path)?;
    }
    Ok(())
}

/// reconcile mode for one workspace: one converged structure, resolved
/// from the energy log with backtracking
fn reconcile_search(
    search: &Path,
    config: &Config,
    paths: &RunPaths,
    db: &Db,
    names: &mut NameSeq,
) -> anyhow::Result<()> {
    let energy_log = LineBuffer::read(search.join(&config.energy_file))
        .with_context(|| format!("missing {}", config.energy_file))?;
    let trace_log = LineBuffer::read(search.join(&config.log_file))
        .with_context(|| format!("missing {}", config.log_file))?;
    match reconcile::reconcile(
        search,
        &energy_log,
        &trace_log,
        &config.result_file,
    ) {
        Ok(rec) => {
            log::info!(
                "step {} reconciled to folder {}",
                rec.step,
                rec.folder
            );
            let path =
                search.join(&rec.folder).join(&config.result_file);
            persist(db, names, config, paths, &path, &rec.result)?;
        }
        Err(e) => {
            log::error!("{}: {e}", search.display());
        }
    }
    Ok(())
}

/// extract from `path` and persist if complete; extraction failures are
/// logged skips
fn extract_and_persist(
    db: &Db,
    names: &mut NameSeq,
    config: &Config,
    paths: &RunPaths,
    path: &Path,
) -> anyhow::Result<()> {
    match outmol::read_output(path) {
        Ok(res) if res.is_complete() => {
            persist(db, names, config, paths, path, &res)
        }
        Ok(_) => {
            log::warn!("{}: incomplete result, skipping", path.display());
            Ok(())
        }
        Err(e) => {
            log::warn!("{}: {e}, skipping", path.display());
            Ok(())
        }
    }
}

/// append one accepted structure to the store and render its DOS
fn persist(
    db: &Db,
    names: &mut NameSeq,
    config: &Config,
    paths: &RunPaths,
    source: &Path,
    res: &OutmolResult,
) -> anyhow::Result<()> {
    let name = names.next(&res.mol);
    let id = db.next_id()?;
    db.record(&DbRecord::new(id, name.clone(), res))?;
    log::info!("stored {} as {name}", source.display());
    if config.dos {
        match outmol::read_eigenvalues(source) {
            Ok(levels) if !levels.is_empty() => {
                let levels = config.dos_sign.apply(&levels);
                let out = paths.dos_dir.join(format!("{name}.png"));
                match dos::plot_dos(&out, &name, &levels, config.dos_sigma)
                {
                    Ok(()) => {
                        log::info!("DOS written to {}", out.display());
                    }
                    Err(e) => {
                        log::warn!("{name}: DOS rendering failed: {e}");
                    }
                }
            }
            Ok(_) => {
                log::warn!(
                    "{}: no eigenvalues, skipping DOS",
                    source.display()
                );
            }
            Err(e) => {
                log::warn!("{}: {e}, skipping DOS", source.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn no_dos_config(mode: Mode) -> Config {
        Config {
            mode,
            dos: false,
            ..Config::default()
        }
    }

    fn paths_under(dir: &Path) -> RunPaths {
        let now: jiff::Zoned = "2026-08-06T10:30:00[UTC]".parse().unwrap();
        RunPaths::new(&now).under(dir)
    }

    fn put_outmol(folder: &Path) {
        fs::create_dir_all(folder).unwrap();
        fs::copy("testfiles/dmol/opt.outmol", folder.join("dmol.outmol"))
            .unwrap();
    }

    #[test]
    fn trajectory_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("runs");
        let search = root.join("ws1/search");
        fs::create_dir_all(&search).unwrap();
        // pops 1 and 2 are the same structure with permuted atom order;
        // pop 3 is distinct
        fs::write(
            search.join("recover.txt"),
            "pop 1
-50.0
O 0.0 0.0 0.1173
H 0.0 0.7572 -0.4692
H 0.0 -0.7572 -0.4692
pop 2
-50.5
H 0.0 -0.7572 -0.4692
O 0.0 0.0 0.1173
H 0.0 0.7572 -0.4692
pop 3
-48.0
O 0.0 0.0 0.0
H 0.0 0.0 0.96
H 0.0 0.0 -0.96
",
        )
        .unwrap();
        fs::write(
            search.join("log.txt"),
            "init 2\nfolder name: f2\n\ninit 3\nfolder name: f3\n",
        )
        .unwrap();
        put_outmol(&search.join("f2"));
        put_outmol(&search.join("f3"));

        let paths = paths_under(tmp.path());
        run(&root, &no_dos_config(Mode::Trajectory), &paths).unwrap();

        let records = Db::open(&paths.db).records().unwrap();
        assert_eq!(records.len(), 2);
        // pop 2 wins its group on energy, pop 3 is alone
        assert_eq!(records[0].name, "H2O_1");
        assert_eq!(records[1].name, "H2O_2");
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
    }

    #[test]
    fn trajectory_skips_incomplete_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("runs");
        // workspace without recover.txt/log.txt must be skipped, not fatal
        fs::create_dir_all(root.join("broken/search")).unwrap();
        let paths = paths_under(tmp.path());
        run(&root, &no_dos_config(Mode::Trajectory), &paths).unwrap();
        assert_eq!(Db::open(&paths.db).count(), 0);
    }

    #[test]
    fn direct_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("runs");
        // identical results in two folders collapse into one record
        put_outmol(&root.join("a"));
        put_outmol(&root.join("b"));
        let paths = paths_under(tmp.path());
        run(&root, &no_dos_config(Mode::Direct), &paths).unwrap();
        let records = Db::open(&paths.db).records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "H2O_1");
    }

    #[test]
    fn reconcile_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("runs");
        let search = root.join("ws1/search");
        fs::create_dir_all(&search).unwrap();
        fs::write(
            search.join("energy.txt"),
            "0: init 7 -50.0\n1: step1 -50.0\n2: step2 -55.0\n",
        )
        .unwrap();
        fs::write(
            search.join("log.txt"),
            "step 2\nfolder name: opt_2\n",
        )
        .unwrap();
        put_outmol(&search.join("opt_2"));
        let paths = paths_under(tmp.path());
        run(&root, &no_dos_config(Mode::Reconcile), &paths).unwrap();
        let records = Db::open(&paths.db).records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "H2O_1");
    }
}
