//! Rigid-alignment RMSD metrics between two geometries.
//!
//! [kabsch_rmsd] assumes the atom order of the two geometries already
//! corresponds and finds the best rotation+translation (no reflection).
//! [assigned_rmsd] additionally searches for the best 1:1 atom
//! correspondence, so it is invariant to atom ordering. [similarity] is the
//! minimum of the two, which is the score the deduplication pipeline
//! compares against its cutoff.

use std::{collections::BTreeMap, error::Error, fmt::Display};

use crate::{Mat3, Molecule, Vec3, hungarian};

#[derive(Debug, PartialEq, Eq)]
pub enum AlignError {
    /// the two geometries contain different multisets of species
    Composition,
    /// the two geometries contain different numbers of atoms
    AtomCount,
}

impl Display for AlignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignError::Composition => write!(f, "incompatible compositions"),
            AlignError::AtomCount => write!(f, "mismatched atom counts"),
        }
    }
}

impl Error for AlignError {}

/// positions of `mol` relative to its centroid
fn centered(mol: &Molecule) -> Vec<Vec3> {
    let c = mol.centroid();
    mol.atoms.iter().map(|a| a.coord() - c).collect()
}

fn rmsd(p: &[Vec3], q: &[Vec3]) -> f64 {
    let n = p.len() as f64;
    (p.iter()
        .zip(q)
        .map(|(a, b)| (a - b).norm_squared())
        .sum::<f64>()
        / n)
        .sqrt()
}

/// optimal proper rotation R minimizing sum |R q_i - p_i|^2 over centered
/// point sets, by SVD of the covariance matrix with the usual determinant
/// correction to exclude reflections
fn kabsch_rotation(p: &[Vec3], q: &[Vec3]) -> Mat3 {
    let mut h = Mat3::zeros();
    for (pi, qi) in p.iter().zip(q) {
        h += qi * pi.transpose();
    }
    let svd = h.svd(true, true);
    let u = svd.u.unwrap();
    let vt = svd.v_t.unwrap();
    let mut v = vt.transpose();
    if (v * u.transpose()).determinant() < 0.0 {
        // flip the axis of the smallest singular value
        let c = -v.column(2);
        v.set_column(2, &c);
    }
    v * u.transpose()
}

/// best rigid-body (rotation+translation, no reflection) RMS displacement
/// between `a` and `b`, assuming atom order already corresponds
pub fn kabsch_rmsd(a: &Molecule, b: &Molecule) -> Result<f64, AlignError> {
    if a.len() != b.len() {
        return Err(AlignError::AtomCount);
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let p = centered(a);
    let q = centered(b);
    let r = kabsch_rotation(&p, &q);
    let rotated: Vec<_> = q.iter().map(|qi| r * qi).collect();
    Ok(rmsd(&p, &rotated))
}

/// flip the last column if needed to make `m` a proper rotation
fn proper(mut m: Mat3) -> Mat3 {
    if m.determinant() < 0.0 {
        let c = -m.column(2);
        m.set_column(2, &c);
    }
    m
}

/// the four diagonal sign matrices with determinant +1
const SIGNS: [[f64; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
];

/// per-species minimum-cost assignment from atoms of `a` to atoms of `b`,
/// with `p` and `q` the (centered, possibly rotated) positions. returns
/// perm such that a's atom i corresponds to b's atom perm[i]. both
/// geometries must have the same composition
fn assign(a: &Molecule, b: &Molecule, p: &[Vec3], q: &[Vec3]) -> Vec<usize> {
    let mut blocks: BTreeMap<usize, (Vec<usize>, Vec<usize>)> =
        BTreeMap::new();
    for (i, at) in a.atoms.iter().enumerate() {
        blocks.entry(at.atomic_number).or_default().0.push(i);
    }
    for (j, bt) in b.atoms.iter().enumerate() {
        blocks.entry(bt.atomic_number).or_default().1.push(j);
    }
    let mut perm = vec![0; p.len()];
    for (ia, ib) in blocks.values() {
        let cost: Vec<Vec<f64>> = ia
            .iter()
            .map(|&i| ib.iter().map(|&j| (p[i] - q[j]).norm_squared()).collect())
            .collect();
        for (row, &col) in hungarian::minimize(&cost).iter().enumerate() {
            perm[ia[row]] = ib[col];
        }
    }
    perm
}

/// best atom-assignment RMS displacement between `a` and `b`: invariant to
/// atom ordering. the correspondence search tries the identity orientation
/// plus the principal-axes alignments of `b` onto `a` over the proper sign
/// combinations; each trial's per-species optimal assignment is refined
/// with a final Kabsch fit before scoring
pub fn assigned_rmsd(a: &Molecule, b: &Molecule) -> Result<f64, AlignError> {
    if !a.same_composition(b) {
        return Err(AlignError::Composition);
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let p = centered(a);
    let q = centered(b);
    let pa = proper(a.principal_axes());
    let pb = proper(b.principal_axes());
    let mut trials = vec![Mat3::identity()];
    for s in SIGNS {
        trials.push(pa * Mat3::from_diagonal(&Vec3::from(s)) * pb.transpose());
    }
    let mut best = f64::INFINITY;
    for r0 in trials {
        let oriented: Vec<_> = q.iter().map(|qi| r0 * qi).collect();
        let perm = assign(a, b, &p, &oriented);
        let qperm: Vec<_> = perm.iter().map(|&j| q[j]).collect();
        let r = kabsch_rotation(&p, &qperm);
        let rotated: Vec<_> = qperm.iter().map(|qi| r * qi).collect();
        best = best.min(rmsd(&p, &rotated));
    }
    Ok(best)
}

/// effective similarity score between two geometries: the minimum of
/// [assigned_rmsd] and [kabsch_rmsd]. an incompatible composition is an
/// error for the caller to treat as "not similar"
pub fn similarity(a: &Molecule, b: &Molecule) -> Result<f64, AlignError> {
    let perm_score = assigned_rmsd(a, b)?;
    // same composition implies equal counts, so this cannot fail
    let fixed_score = kabsch_rmsd(a, b)?;
    Ok(perm_score.min(fixed_score))
}
