//! Molecular geometries and structural-similarity fitting.
//!
//! [Molecule] holds an ordered list of [Atom]s; [align] provides the two
//! rigid-alignment RMSD metrics used to decide whether two geometries are
//! the same structure.

pub use atom::*;
use na::SymmetricEigen;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

#[cfg(test)]
mod tests;

pub mod align;
pub mod atom;
mod hungarian;

use nalgebra as na;

pub(crate) type Vec3 = na::Vector3<f64>;
pub(crate) type Mat3 = na::Matrix3<f64>;

#[macro_export]
macro_rules! molecule {
    ($($num:ident $x:literal $y:literal $z:literal)+) => {
	$crate::Molecule::new(vec![
	    $($crate::Atom::new_from_label(stringify!($num), $x, $y, $z),)*
	    ])
    };
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// return the atomic numbers of each atom as a vector
    pub fn atomic_numbers(&self) -> Vec<usize> {
        self.atoms.iter().map(|a| a.atomic_number).collect()
    }

    /// geometric centroid of the atoms, all species weighted equally
    pub fn centroid(&self) -> Vec3 {
        let mut c = Vec3::zeros();
        for atom in &self.atoms {
            c += atom.coord();
        }
        c / self.atoms.len() as f64
    }

    /// translate each of the atoms in `self` by vec
    pub fn translate(&mut self, vec: Vec3) -> &mut Self {
        for atom in self.atoms.iter_mut() {
            atom.x += vec[0];
            atom.y += vec[1];
            atom.z += vec[2];
        }
        self
    }

    /// compute the unit-weight gyration tensor about the centroid
    pub fn gyration(&self) -> Mat3 {
        let c = self.centroid();
        let mut ret = Mat3::zeros();
        for atom in &self.atoms {
            let r = atom.coord() - c;
            let (x, y, z) = (r[0], r[1], r[2]);
            // diagonal
            ret[(0, 0)] += y * y + z * z;
            ret[(1, 1)] += x * x + z * z;
            ret[(2, 2)] += x * x + y * y;
            // off-diagonal
            ret[(1, 0)] -= x * y;
            ret[(2, 0)] -= x * z;
            ret[(2, 1)] -= y * z;
        }
        ret.fill_upper_triangle_with_lower_triangle();
        ret
    }

    /// eigenfactorize the gyration tensor and return the principal axes as a
    /// 3x3 matrix with the axes as columns, ordered by ascending
    /// eigenvalue so equivalent geometries produce corresponding frames
    pub fn principal_axes(&self) -> Mat3 {
        let sym = SymmetricEigen::new(self.gyration());
        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| {
            sym.eigenvalues[i]
                .partial_cmp(&sym.eigenvalues[j])
                .unwrap()
        });
        let cols = order.map(|i| sym.eigenvectors.column(i).clone_owned());
        Mat3::from_columns(&cols)
    }

    /// whether `self` and `other` contain the same multiset of species
    pub fn same_composition(&self, other: &Self) -> bool {
        if self.atoms.len() != other.atoms.len() {
            return false;
        }
        let count = |m: &Self| {
            let mut c = BTreeMap::new();
            for a in &m.atoms {
                *c.entry(a.atomic_number).or_insert(0usize) += 1;
            }
            c
        };
        count(self) == count(other)
    }

    /// normalized Hill-order chemical formula: carbon first, then hydrogen,
    /// then the remaining species alphabetically; all species alphabetical
    /// when no carbon is present. unit counts are omitted
    pub fn formula(&self) -> String {
        let mut counts = BTreeMap::new();
        for a in &self.atoms {
            *counts.entry(a.label()).or_insert(0usize) += 1;
        }
        let mut symbols: Vec<&str> = counts.keys().copied().collect();
        symbols.sort_unstable();
        if counts.contains_key("C") {
            symbols.retain(|&s| s != "C" && s != "H");
            let mut head = vec!["C"];
            if counts.contains_key("H") {
                head.push("H");
            }
            head.extend(symbols);
            symbols = head;
        }
        let mut ret = String::new();
        for sym in symbols {
            ret.push_str(sym);
            let n = counts[sym];
            if n > 1 {
                ret.push_str(&n.to_string());
            }
        }
        ret
    }
}

impl std::fmt::Debug for Molecule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Molecule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precision = f.precision().unwrap_or(8);
        let width = f.width().unwrap_or(precision + 4);
        writeln!(f)?;
        for atom in &self.atoms {
            writeln!(
                f,
                "{:5}{:w$.p$}{:w$.p$}{:w$.p$}",
                atom.label(),
                atom.x,
                atom.y,
                atom.z,
                w = width,
                p = precision,
            )?;
        }
        Ok(())
    }
}

impl FromStr for Molecule {
    type Err = std::io::Error;

    /// parse lines like
    ///      O           0.000000000    0.000000000   -0.124238453
    ///      H           0.000000000    1.431390207    0.986041184
    ///      H           0.000000000   -1.431390207    0.986041184
    /// into a molecule, skipping lines with the wrong number of fields
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ret = Self::default();
        for line in s.lines() {
            if line.split_whitespace().count() == 4 {
                ret.atoms.push(line.parse()?);
            }
        }
        Ok(ret)
    }
}
