//! Candidate collection: workspace discovery plus the two discovery
//! strategies, direct file walking and the population trace.

use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
};

use molfit::Molecule;

use crate::{lines::LineBuffer, outmol, trace};

/// where a candidate came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    Population(usize),
    Step(usize),
    Path(PathBuf),
}

impl Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Population(n) => write!(f, "pop {n}"),
            SourceId::Step(n) => write!(f, "step {n}"),
            SourceId::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// one parsed geometry+energy sample from simulation output. immutable
/// once parsed; the species/position pairing is enforced by [Molecule]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: SourceId,
    /// total energy in eV
    pub energy: f64,
    pub mol: Molecule,
}

impl Candidate {
    pub fn new(source: SourceId, energy: f64, mol: Molecule) -> Self {
        Self {
            source,
            energy,
            mol,
        }
    }
}

/// collect `dir` and every directory below it, depth-first, sorted by
/// name for a stable discovery order
fn subdirs(dir: &Path, out: &mut Vec<PathBuf>) {
    out.push(dir.to_path_buf());
    let Ok(rd) = std::fs::read_dir(dir) else {
        log::warn!("failed to read directory {}", dir.display());
        return;
    };
    let mut children: Vec<_> = rd
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    children.sort();
    for child in children {
        subdirs(&child, out);
    }
}

/// every `search` workspace at or below `root`, in walk order
pub fn find_workspaces(root: &Path) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }
    let mut dirs = Vec::new();
    subdirs(root, &mut dirs);
    Ok(dirs
        .into_iter()
        .filter(|d| d.join("search").is_dir())
        .map(|d| d.join("search"))
        .collect())
}

/// direct discovery: walk every subdirectory beneath `dir` and attempt
/// extraction from each result file named `result_file`. failures are
/// logged and skipped, never fatal to the walk
pub fn collect_direct(dir: &Path, result_file: &str) -> Vec<Candidate> {
    let mut dirs = Vec::new();
    subdirs(dir, &mut dirs);
    let mut ret = Vec::new();
    for d in dirs {
        let path = d.join(result_file);
        if !path.is_file() {
            continue;
        }
        match outmol::read_output(&path) {
            Ok(res) if res.is_complete() => {
                let energy = res.energy().unwrap();
                ret.push(Candidate::new(
                    SourceId::Path(path),
                    energy,
                    res.mol,
                ));
            }
            Ok(_) => {
                log::warn!(
                    "{}: incomplete result, skipping",
                    path.display()
                );
            }
            Err(e) => {
                log::warn!("{}: {e}, skipping", path.display());
            }
        }
    }
    ret
}

/// trajectory-driven discovery: parse the workspace's population trace.
/// a malformed trace skips the whole workspace
pub fn collect_trajectory(
    search: &Path,
    trace_file: &str,
) -> Option<Vec<Candidate>> {
    let path = search.join(trace_file);
    let buf = match LineBuffer::read(&path) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("{}: {e}, skipping workspace", path.display());
            return None;
        }
    };
    match trace::parse_population_trace(&buf) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("{}: {e}, skipping workspace", path.display());
            None
        }
    }
}
