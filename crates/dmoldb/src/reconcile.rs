//! Map the converged step of a search run back to the working folder that
//! produced it, retrying over earlier steps when the preferred folder's
//! output is missing or incomplete.

use std::{error::Error, fmt::Display, path::Path};

use crate::{
    elog::{ElogError, EnergyLog, locate_folder},
    lines::LineBuffer,
    outmol::{self, OutmolResult},
};

#[derive(Debug, PartialEq)]
pub enum ReconcileError {
    Log(ElogError),
    /// no working folder could be located for the resolved step
    FolderNotFound(usize),
    /// backtracking re-resolved the step that just failed
    Cycle(usize),
    /// no earlier step remained to retry
    Exhausted(usize),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Log(e) => write!(f, "{e}"),
            ReconcileError::FolderNotFound(s) => {
                write!(f, "no working folder for step {s}")
            }
            ReconcileError::Cycle(s) => {
                write!(f, "step {s} already failed, refusing to retry")
            }
            ReconcileError::Exhausted(s) => {
                write!(f, "no earlier step than {s} left to try")
            }
        }
    }
}

impl Error for ReconcileError {}

impl From<ElogError> for ReconcileError {
    fn from(e: ElogError) -> Self {
        ReconcileError::Log(e)
    }
}

/// a successful reconciliation: the folder whose output was accepted and
/// its extraction result
#[derive(Debug, PartialEq)]
pub struct Reconciled {
    pub folder: String,
    pub step: usize,
    pub result: OutmolResult,
}

/// resolve the trusted working folder for `search` and extract from it.
///
/// starts from the energy log's final step and, whenever the folder's
/// result file is missing or incomplete, backtracks to the nearest
/// earlier step with the same energy (else a different energy). the loop
/// is strictly finite: every retry moves to an earlier log entry, and
/// re-resolving the step that just failed terminates immediately
pub fn reconcile(
    search: &Path,
    energy_log: &LineBuffer,
    trace_log: &LineBuffer,
    result_file: &str,
) -> Result<Reconciled, ReconcileError> {
    let log = EnergyLog::parse(energy_log)?;
    let mut target = log.final_target();
    loop {
        let Some(folder) = locate_folder(trace_log, &target) else {
            return Err(ReconcileError::FolderNotFound(target.step));
        };
        let path = search.join(&folder).join(result_file);
        match outmol::read_output(&path) {
            Ok(res) if res.is_complete() => {
                return Ok(Reconciled {
                    folder,
                    step: target.step,
                    result: res,
                });
            }
            Ok(_) => {
                log::warn!(
                    "{}: incomplete output, backtracking",
                    path.display()
                );
            }
            Err(e) => {
                log::warn!("{}: {e}, backtracking", path.display());
            }
        }
        let failed = target;
        let Some(next) = log.backtrack(&failed) else {
            return Err(ReconcileError::Exhausted(failed.step));
        };
        if next.step == failed.step {
            return Err(ReconcileError::Cycle(failed.step));
        }
        target = next;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    /// lay out a search workspace with the given folders, each holding a
    /// copy of the reference outmol testfile
    fn workspace(dir: &Path, folders: &[&str]) {
        for f in folders {
            fs::create_dir_all(dir.join(f)).unwrap();
            fs::copy(
                "testfiles/dmol/opt.outmol",
                dir.join(f).join("dmol.outmol"),
            )
            .unwrap();
        }
    }

    #[test]
    fn first_try_success() {
        let tmp = tempfile::tempdir().unwrap();
        workspace(tmp.path(), &["opt_2"]);
        let energy = LineBuffer::from(
            "0: init 7 -50.0\n1: step1 -50.0\n2: step2 -55.0\n",
        );
        let trace = LineBuffer::from("step 2\nfolder name: opt_2\n");
        let got =
            reconcile(tmp.path(), &energy, &trace, "dmol.outmol").unwrap();
        assert_eq!(got.folder, "opt_2");
        assert_eq!(got.step, 2);
        assert!(got.result.is_complete());
    }

    #[test]
    fn backtracks_to_same_energy_step() {
        let tmp = tempfile::tempdir().unwrap();
        // only the earlier same-energy step's folder has real output
        workspace(tmp.path(), &["opt_1"]);
        let energy = LineBuffer::from(
            "0: init 7 -50.0\n1: a -55.0\n2: b -53.0\n3: c -55.0\n",
        );
        let trace = LineBuffer::from(
            "step 1\nfolder name: opt_1\nstep 3\nfolder name: opt_3\n",
        );
        let got =
            reconcile(tmp.path(), &energy, &trace, "dmol.outmol").unwrap();
        assert_eq!(got.step, 1);
        assert_eq!(got.folder, "opt_1");
    }

    #[test]
    fn cycle_guard_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        // the same step value is revisited through the same folder, whose
        // output never exists; without the guard this would retry forever
        let energy = LineBuffer::from(
            "5: a -20.0\n6: b -10.0\n5: c -20.0\n",
        );
        let trace = LineBuffer::from("step 5\nfolder name: ghost\n");
        let got = reconcile(tmp.path(), &energy, &trace, "dmol.outmol");
        assert_eq!(got, Err(ReconcileError::Cycle(5)));
    }

    #[test]
    fn exhausted_when_nothing_earlier() {
        let tmp = tempfile::tempdir().unwrap();
        let energy = LineBuffer::from("0: init 4 -50.0\n");
        let trace = LineBuffer::from("init 4\nfolder name: gen0_4\n");
        let got = reconcile(tmp.path(), &energy, &trace, "dmol.outmol");
        assert_eq!(got, Err(ReconcileError::Exhausted(0)));
    }

    #[test]
    fn folder_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let energy = LineBuffer::from("3: a -20.0\n");
        let trace = LineBuffer::from("step 9\nfolder name: elsewhere\n");
        let got = reconcile(tmp.path(), &energy, &trace, "dmol.outmol");
        assert_eq!(got, Err(ReconcileError::FolderNotFound(3)));
    }
}
