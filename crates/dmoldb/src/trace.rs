//! Parser for the append-only population trace written during a search
//! run: repeating blocks of a `pop <N>` header, an energy line, and one
//! line per atom.

use std::{error::Error, fmt::Display};

use molfit::{Atom, Molecule};

use crate::{
    collect::{Candidate, SourceId},
    lines::LineBuffer,
};

#[derive(Debug, PartialEq, Eq)]
pub enum TraceError {
    /// a `pop` header without a parseable population number
    Header(usize),
    /// a block that ends before its energy line
    Truncated(usize),
    /// a malformed numeric or species token inside a block
    Malformed(usize),
}

impl Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Header(l) => {
                write!(f, "bad population header on line {}", l + 1)
            }
            TraceError::Truncated(l) => {
                write!(f, "truncated population block on line {}", l + 1)
            }
            TraceError::Malformed(l) => {
                write!(f, "malformed token on line {}", l + 1)
            }
        }
    }
}

impl Error for TraceError {}

/// parse every `pop` block in `buf` into a [Candidate], in file order.
/// records are strictly sequential; a block ends at the next header or
/// end of file
pub fn parse_population_trace(
    buf: &LineBuffer,
) -> Result<Vec<Candidate>, TraceError> {
    let mut ret = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        let line = buf.get(i).unwrap();
        if !line.starts_with("pop") {
            i += 1;
            continue;
        }
        let pop: usize = line
            .split_whitespace()
            .nth(1)
            .and_then(|t| t.parse().ok())
            .ok_or(TraceError::Header(i))?;
        let energy: f64 = buf
            .get(i + 1)
            .ok_or(TraceError::Truncated(i))?
            .split_whitespace()
            .next()
            .ok_or(TraceError::Truncated(i + 1))?
            .parse()
            .map_err(|_| TraceError::Malformed(i + 1))?;
        let mut atoms = Vec::new();
        let mut j = i + 2;
        while j < buf.len() {
            let l = buf.get(j).unwrap();
            if l.trim().is_empty() || l.starts_with("pop") {
                break;
            }
            let sp: Vec<_> = l.split_whitespace().collect();
            if sp.len() >= 4 {
                let coord: Result<Vec<f64>, _> =
                    sp[1..4].iter().map(|s| s.parse()).collect();
                let coord =
                    coord.map_err(|_| TraceError::Malformed(j))?;
                atoms.push(
                    Atom::try_from_label(sp[0], coord[0], coord[1], coord[2])
                        .ok_or(TraceError::Malformed(j))?,
                );
            }
            j += 1;
        }
        ret.push(Candidate::new(
            SourceId::Population(pop),
            energy,
            Molecule::new(atoms),
        ));
        i = j;
    }
    Ok(ret)
}
