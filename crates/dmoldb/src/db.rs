//! The structured store: an append-only JSON-lines file, one record per
//! accepted structure, plus the merge and CSV flattening utilities that
//! operate on it.

use std::{
    collections::BTreeSet,
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use molfit::Molecule;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::outmol::OutmolResult;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbRecord {
    pub id: usize,
    /// generated identifier: Hill formula plus per-formula index
    pub name: String,
    pub functional: String,
    /// scalar quantities in eV / eV/Å
    pub params: FxHashMap<String, f64>,
    pub species: Vec<String>,
    pub positions: Vec<[f64; 3]>,
}

impl DbRecord {
    pub fn new(id: usize, name: String, res: &OutmolResult) -> Self {
        Self {
            id,
            name,
            functional: res.functional.clone(),
            params: res.params.clone(),
            species: res
                .mol
                .atoms
                .iter()
                .map(|a| a.label().to_string())
                .collect(),
            positions: res
                .mol
                .atoms
                .iter()
                .map(|a| [a.x, a.y, a.z])
                .collect(),
        }
    }

    pub fn natoms(&self) -> usize {
        self.species.len()
    }
}

/// handle to one store file. the file is opened and closed per
/// operation; one producer at a time is assumed
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// every record in the store, in insertion order. a store that does
    /// not exist yet is empty
    pub fn records(&self) -> io::Result<Vec<DbRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(io::Error::from))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records().map(|r| r.len()).unwrap_or(0)
    }

    /// the id the next appended record should carry
    pub fn next_id(&self) -> io::Result<usize> {
        Ok(self.records()?.iter().map(|r| r.id).max().unwrap_or(0) + 1)
    }

    /// append one record
    pub fn record(&self, rec: &DbRecord) -> io::Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", serde_json::to_string(rec)?)
    }

    /// append every record of `other`, renumbering ids to continue after
    /// the last id already present. returns the number of merged records
    pub fn merge(&self, other: &Db) -> io::Result<usize> {
        let last = self.records()?.iter().map(|r| r.id).max().unwrap_or(0);
        let incoming = other.records()?;
        let n = incoming.len();
        for (i, mut rec) in incoming.into_iter().enumerate() {
            rec.id = last + i + 1;
            self.record(&rec)?;
        }
        Ok(n)
    }

    /// flatten every record into a CSV file next to the store. the
    /// columns are the union of all scalar-parameter keys, sorted;
    /// missing values are left empty
    pub fn to_csv(&self) -> io::Result<PathBuf> {
        let out = self.path.with_extension("csv");
        let mut f = std::fs::File::create(&out)?;
        f.write_all(self.csv_string()?.as_bytes())?;
        Ok(out)
    }

    pub(crate) fn csv_string(&self) -> io::Result<String> {
        let records = self.records()?;
        let keys: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.params.keys().map(String::as_str))
            .collect();
        let mut ret = String::from("id,name,functional,natoms");
        for k in &keys {
            ret.push(',');
            ret.push_str(k);
        }
        ret.push('\n');
        for r in &records {
            use std::fmt::Write;
            write!(ret, "{},{},{},{}", r.id, r.name, r.functional, r.natoms())
                .unwrap();
            for k in &keys {
                ret.push(',');
                if let Some(v) = r.params.get(*k) {
                    write!(ret, "{v}").unwrap();
                }
            }
            ret.push('\n');
        }
        Ok(ret)
    }
}

/// generates the unique, human-readable identifier for each accepted
/// structure: the normalized formula, suffixed with a sequence index
/// counting structures sharing that formula within one run
#[derive(Debug, Default)]
pub struct NameSeq {
    counts: FxHashMap<String, usize>,
}

impl NameSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, mol: &Molecule) -> String {
        let formula = mol.formula();
        let n = self.counts.entry(formula.clone()).or_insert(0);
        *n += 1;
        format!("{formula}_{n}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use molfit::molecule;

    use super::*;
    use crate::outmol::read_output;

    fn sample(id: usize, name: &str) -> DbRecord {
        let res = read_output("testfiles/dmol/opt.outmol").unwrap();
        DbRecord::new(id, name.to_string(), &res)
    }

    #[test]
    fn append_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Db::open(tmp.path().join("run.jsonl"));
        assert_eq!(db.count(), 0);
        assert_eq!(db.next_id().unwrap(), 1);
        db.record(&sample(1, "H2O_1")).unwrap();
        db.record(&sample(2, "H2O_2")).unwrap();
        let got = db.records().unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].name, "H2O_1");
        assert_eq!(got[0].species, vec!["O", "H", "H"]);
        assert_eq!(got[1].id, 2);
        assert_eq!(db.next_id().unwrap(), 3);
    }

    #[test]
    fn merge_renumbers() {
        let tmp = tempfile::tempdir().unwrap();
        let into = Db::open(tmp.path().join("main.jsonl"));
        let from = Db::open(tmp.path().join("extra.jsonl"));
        into.record(&sample(1, "H2O_1")).unwrap();
        into.record(&sample(2, "H2O_2")).unwrap();
        from.record(&sample(1, "H2O_1")).unwrap();
        from.record(&sample(2, "H2O_2")).unwrap();
        let n = into.merge(&from).unwrap();
        assert_eq!(n, 2);
        let ids: Vec<_> =
            into.records().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn csv_flattening() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Db::open(tmp.path().join("run.jsonl"));
        let mut a = sample(1, "H2O_1");
        a.params = FxHashMap::default();
        a.params.insert(String::from("TOTEN"), -2044.25);
        a.params.insert(String::from("GAP_DFT"), 2.5);
        let mut b = sample(2, "H2O_2");
        b.params = FxHashMap::default();
        b.params.insert(String::from("TOTEN"), -2044.5);
        db.record(&a).unwrap();
        db.record(&b).unwrap();
        assert_snapshot!(db.csv_string().unwrap(), @r"
        id,name,functional,natoms,GAP_DFT,TOTEN
        1,H2O_1,PBE,3,2.5,-2044.25
        2,H2O_2,PBE,3,,-2044.5
        ");
        let out = db.to_csv().unwrap();
        assert_eq!(out, tmp.path().join("run.csv"));
        assert!(out.is_file());
    }

    #[test]
    fn name_sequence() {
        let mut seq = NameSeq::new();
        let water = molecule![
            O 0.0 0.0 0.0
            H 0.0 0.757 0.586
            H 0.0 -0.757 0.586
        ];
        let dimer = molecule![
            H 0.0 0.0 0.0
            H 0.0 0.0 0.74
        ];
        assert_eq!(seq.next(&water), "H2O_1");
        assert_eq!(seq.next(&dimer), "H2_1");
        assert_eq!(seq.next(&water), "H2O_2");
    }
}
