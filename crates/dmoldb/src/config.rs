//! Run configuration: the TOML-loadable [Config] and the timestamp-derived
//! [RunPaths] computed once at startup and passed through the pipeline.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{die, dos::SignConvention};

/// how candidates are located within a workspace
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// parse the population trace, deduplicate, and map each selected
    /// population back to its working folder
    #[default]
    Trajectory,
    /// walk every subdirectory and extract from every result file found
    Direct,
    /// resolve the converged step from the per-step energy log, with
    /// backtracking over earlier steps when output is missing
    Reconcile,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,

    /// similarity cutoff in Å below which two geometries are the same
    /// structure
    pub rmsd_cutoff: f64,

    /// name of the result file inside each working folder
    pub result_file: String,

    /// population trace inside each search workspace
    pub trace_file: String,

    /// calculation trace log inside each search workspace
    pub log_file: String,

    /// per-step energy log inside each search workspace, used in
    /// reconcile mode
    pub energy_file: String,

    /// render a DOS plot per accepted structure
    pub dos: bool,

    /// gaussian broadening width for the DOS, in eV
    pub dos_sigma: f64,

    /// eigenvalue sign convention applied before broadening
    pub dos_sign: SignConvention,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            rmsd_cutoff: 0.2,
            result_file: String::from("dmol.outmol"),
            trace_file: String::from("recover.txt"),
            log_file: String::from("log.txt"),
            energy_file: String::from("energy.txt"),
            dos: true,
            dos_sigma: 0.1,
            dos_sign: SignConvention::default(),
        }
    }
}

impl Config {
    pub fn load(filename: &str) -> Self {
        let contents = match read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                die!("failed to read config file {filename} with {e}");
            }
        };
        match toml::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                die!("failed to deserialize {filename} with {e}");
            }
        }
    }
}

/// output names for one run, derived from a single timestamp taken at
/// startup
#[derive(Clone, Debug, PartialEq)]
pub struct RunPaths {
    pub db: PathBuf,
    pub log: PathBuf,
    pub dos_dir: PathBuf,
}

impl RunPaths {
    pub fn new(now: &jiff::Zoned) -> Self {
        let stamp = now.strftime("%Y_%m_%d_%H_%M_%S").to_string();
        Self {
            db: PathBuf::from(format!("DMOL_RESULTS_{stamp}.jsonl")),
            log: PathBuf::from(format!("log_{stamp}.log")),
            dos_dir: PathBuf::from("dmol_dos"),
        }
    }

    /// root all three outputs under `dir` instead of the working directory
    pub fn under(mut self, dir: &Path) -> Self {
        self.db = dir.join(&self.db);
        self.log = dir.join(&self.log);
        self.dos_dir = dir.join(&self.dos_dir);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let got = Config::default();
        assert_eq!(got.mode, Mode::Trajectory);
        assert_eq!(got.rmsd_cutoff, 0.2);
        assert_eq!(got.result_file, "dmol.outmol");
        assert!(got.dos);
    }

    #[test]
    fn toml_overrides() {
        let got: Config = toml::from_str(
            r#"
mode = "direct"
rmsd_cutoff = 0.35
dos = false
"#,
        )
        .unwrap();
        assert_eq!(got.mode, Mode::Direct);
        assert_eq!(got.rmsd_cutoff, 0.35);
        assert!(!got.dos);
        // unset fields keep their defaults
        assert_eq!(got.trace_file, "recover.txt");
        assert_eq!(got.dos_sigma, 0.1);
    }

    #[test]
    fn run_paths() {
        let now: jiff::Zoned =
            "2026-08-06T10:30:00[UTC]".parse().unwrap();
        let got = RunPaths::new(&now);
        assert_eq!(
            got.db,
            PathBuf::from("DMOL_RESULTS_2026_08_06_10_30_00.jsonl")
        );
        assert_eq!(got.log, PathBuf::from("log_2026_08_06_10_30_00.log"));
    }
}
