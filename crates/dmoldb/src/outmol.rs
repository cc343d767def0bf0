//! Reader for DMOL3 "outmol" optimization logs.
//!
//! Extraction always starts from the *last* optimization section in the
//! file, so restarted jobs report their final state. Scalar quantities are
//! converted to eV (energies) and eV/Å (forces) on the way out.

use std::{
    error::Error,
    fmt::Display,
    fs::read_to_string,
    path::Path,
    sync::OnceLock,
};

use molfit::{Atom, Molecule};
use regex::Regex;
use rustc_hash::FxHashMap;

#[cfg(test)]
mod tests;

/// Hartree to eV
pub const HARTREE_EV: f64 = 27.212;
/// atomic force unit to eV/Å
pub const AU_FORCE_EV_ANG: f64 = 51.422067;

/// the banner opening every optimization cycle table
const OPT_BANNER: &str =
    "Total Energy           Binding E       Cnvgnce     Time   Iter";

/// the banner opening the orbital-eigenvalue table
const EIG_BANNER: &str = "state";

#[derive(Debug, PartialEq, Eq)]
pub enum ExtractError {
    FileNotFound(String),
    ReadFileError(String, std::io::ErrorKind),
    /// no geometry-optimization section in the file
    OptNotFound(String),
    EnergyNotFound(String),
    /// a malformed token where a coordinate or species was expected
    GeomParse(String),
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for ExtractError {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutmolResult {
    /// scalar quantities in eV / eV/Å: TOTEN, HOMO_DFT, LUMO_DFT, GAP_DFT,
    /// Max_Force
    pub params: FxHashMap<String, f64>,
    /// exchange-correlation functional tag
    pub functional: String,
    /// final geometry in Å
    pub mol: Molecule,
}

impl OutmolResult {
    /// whether extraction produced both an energy and a geometry, the
    /// precondition for accepting a candidate
    pub fn is_complete(&self) -> bool {
        self.params.contains_key("TOTEN") && !self.mol.is_empty()
    }

    pub fn energy(&self) -> Option<f64> {
        self.params.get("TOTEN").copied()
    }
}

static CELL: OnceLock<[Regex; 4]> = OnceLock::new();

fn read_lines(path: &Path) -> Result<Vec<String>, ExtractError> {
    let name = path.display().to_string();
    if !path.exists() {
        return Err(ExtractError::FileNotFound(name));
    }
    match read_to_string(path) {
        Ok(s) => Ok(s.lines().map(String::from).collect()),
        Err(e) => Err(ExtractError::ReadFileError(name, e.kind())),
    }
}

/// read the final optimization state out of the outmol file at `path`
pub fn read_output(path: impl AsRef<Path>) -> Result<OutmolResult, ExtractError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let lines = read_lines(path)?;

    let start = lines
        .iter()
        .rposition(|l| l.contains(OPT_BANNER))
        .ok_or_else(|| ExtractError::OptNotFound(name.clone()))?;

    let [homo_re, lumo_re, ef_re, force_re] = CELL.get_or_init(|| {
        [
            Regex::new(
                r"Energy of Highest Occupied Molecular Orbital:\s*(-?\d+\.\d+)",
            )
            .unwrap(),
            Regex::new(
                r"Energy of Lowest Unoccupied Molecular Orbital:\s*(-?\d+\.\d+)",
            )
            .unwrap(),
            Regex::new(r"Ef\s*(-?\d+\.\d+)").unwrap(),
            Regex::new(r"\|\s*\|F\|max\s*\|\s*(-?\d+\.\d+E?-?\d*)").unwrap(),
        ]
    });

    let mut params = FxHashMap::default();
    let mut atoms = Vec::new();
    let mut skip = 0;
    let mut geom = false;
    for line in &lines[start..] {
        if skip > 0 {
            skip -= 1;
        } else if geom {
            if line.trim_start().starts_with("------") {
                geom = false;
            } else {
                let sp: Vec<_> = line.split_whitespace().collect();
                if sp.len() >= 5 {
                    let coord: Result<Vec<f64>, _> =
                        sp[2..5].iter().map(|s| s.parse()).collect();
                    let coord = coord.map_err(|_| {
                        ExtractError::GeomParse(name.clone())
                    })?;
                    atoms.push(
                        Atom::try_from_label(
                            sp[1], coord[0], coord[1], coord[2],
                        )
                        .ok_or_else(|| {
                            ExtractError::GeomParse(name.clone())
                        })?,
                    );
                }
            }
        } else if line.contains("Final Coordinates (Angstroms)") {
            // two header lines between the banner and the first atom
            skip = 2;
            geom = true;
            atoms.clear();
        } else if let Some(c) = homo_re.captures(line) {
            params.insert(
                String::from("HOMO_DFT"),
                c[1].parse::<f64>().unwrap() * HARTREE_EV,
            );
        } else if let Some(c) = lumo_re.captures(line) {
            params.insert(
                String::from("LUMO_DFT"),
                c[1].parse::<f64>().unwrap() * HARTREE_EV,
            );
        } else if let Some(c) = force_re.captures(line) {
            params.insert(
                String::from("Max_Force"),
                c[1].parse::<f64>().unwrap() * AU_FORCE_EV_ANG,
            );
        } else if let Some(c) = ef_re.captures(line) {
            // later cycles overwrite, leaving the final energy
            params.insert(
                String::from("TOTEN"),
                c[1].parse::<f64>().unwrap() * HARTREE_EV,
            );
        }
    }

    if let (Some(&h), Some(&l)) =
        (params.get("HOMO_DFT"), params.get("LUMO_DFT"))
    {
        params.insert(String::from("GAP_DFT"), l - h);
    }

    if !params.contains_key("TOTEN") {
        return Err(ExtractError::EnergyNotFound(name));
    }

    Ok(OutmolResult {
        params,
        functional: String::from("PBE"),
        mol: Molecule::new(atoms),
    })
}

/// read the orbital eigenvalue table as (eigenvalue in eV, occupation)
/// pairs, exactly as printed. an absent table is an empty list, not an
/// error, so callers can skip DOS rendering
pub fn read_eigenvalues(
    path: impl AsRef<Path>,
) -> Result<Vec<(f64, f64)>, ExtractError> {
    let lines = read_lines(path.as_ref())?;
    let Some(banner) = lines.iter().rposition(|l| {
        l.contains(EIG_BANNER)
            && l.contains("eigenvalue")
            && l.contains("occupation")
    }) else {
        return Ok(Vec::new());
    };
    let mut ret = Vec::new();
    // the banner is followed by a units line and a separator
    for line in &lines[banner + 3..] {
        if line.trim().is_empty() {
            break;
        }
        let sp: Vec<_> = line.split_whitespace().collect();
        if sp.len() >= 7
            && let (Ok(ev), Ok(occ)) =
                (sp[5].parse::<f64>(), sp[6].parse::<f64>())
        {
            ret.push((ev, occ));
        }
    }
    Ok(ret)
}
