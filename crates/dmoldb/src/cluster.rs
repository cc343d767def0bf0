//! Structural deduplication: greedy grouping of candidates under the
//! min(assignment, Kabsch) similarity score, then lowest-energy selection
//! per group.
//!
//! A candidate is compared against the *first* member of each existing
//! group only, in group-creation order, and joins the first group scoring
//! strictly below the cutoff. Groups are never merged or re-clustered
//! afterward, so the grouping depends on discovery order.

use molfit::align;

use crate::collect::Candidate;

/// a non-empty ordered family of structurally indistinguishable
/// candidates. the first-inserted member is the reference every later
/// comparison is made against
#[derive(Debug, Clone)]
pub struct EquivalenceGroup {
    members: Vec<Candidate>,
}

impl EquivalenceGroup {
    fn new(first: Candidate) -> Self {
        Self {
            members: vec![first],
        }
    }

    pub fn reference(&self) -> &Candidate {
        &self.members[0]
    }

    pub fn members(&self) -> &[Candidate] {
        &self.members
    }

    /// the member with the numerically smallest energy; ties go to the
    /// first-encountered member
    pub fn selected(&self) -> &Candidate {
        let mut best = &self.members[0];
        for m in &self.members[1..] {
            if m.energy < best.energy {
                best = m;
            }
        }
        best
    }
}

/// group `candidates` in discovery order at the given cutoff in Å. an
/// incompatible composition is treated as "not similar", never an error
pub fn group_candidates(
    candidates: Vec<Candidate>,
    cutoff: f64,
) -> Vec<EquivalenceGroup> {
    let mut groups: Vec<EquivalenceGroup> = Vec::new();
    for cand in candidates {
        let mut joined = None;
        for (gi, group) in groups.iter().enumerate() {
            match align::similarity(&group.reference().mol, &cand.mol) {
                Ok(score) if score < cutoff => {
                    joined = Some(gi);
                    break;
                }
                Ok(_) => {}
                Err(align::AlignError::Composition
                | align::AlignError::AtomCount) => {}
            }
        }
        match joined {
            Some(gi) => groups[gi].members.push(cand),
            None => groups.push(EquivalenceGroup::new(cand)),
        }
    }
    groups
}

/// the selected structure of every group, in group-creation order
pub fn select(groups: &[EquivalenceGroup]) -> Vec<&Candidate> {
    groups.iter().map(|g| g.selected()).collect()
}
