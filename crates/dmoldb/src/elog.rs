//! Readers for the per-step energy log and the free-text calculation
//! trace, both built on [LineBuffer](crate::lines::LineBuffer).
//!
//! The energy log holds lines `<step>: <label> <energy> ...` in
//! nondecreasing step order; step-0 lines carry an `init <N>` label with
//! the initial-population number. The calculation trace associates
//! `step N` / `init N` / `replace ... N` markers with the nearest
//! `folder name:` line.

use std::{error::Error, fmt::Display};

use crate::lines::LineBuffer;

#[derive(Debug, PartialEq, Eq)]
pub enum ElogError {
    /// the log contained no parseable entries
    Empty,
    /// a line that does not match `<step>: <label> <energy> ...`
    Malformed(usize),
}

impl Display for ElogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElogError::Empty => write!(f, "empty energy log"),
            ElogError::Malformed(l) => {
                write!(f, "malformed energy-log line {}", l + 1)
            }
        }
    }
}

impl Error for ElogError {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    step: usize,
    init: Option<usize>,
    energy: f64,
}

fn parse_entry(line: &str) -> Option<Entry> {
    let (head, rest) = line.split_once(':')?;
    let step = head.trim().parse().ok()?;
    let fields: Vec<_> = rest.split_whitespace().collect();
    if fields.first() == Some(&"init") {
        Some(Entry {
            step,
            init: Some(fields.get(1)?.parse().ok()?),
            energy: fields.get(2)?.parse().ok()?,
        })
    } else {
        Some(Entry {
            step,
            init: None,
            energy: fields.get(1)?.parse().ok()?,
        })
    }
}

/// a resolved target in the energy log: which step (and, for step 0,
/// which initial population) should be extracted next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTarget {
    /// index of the resolved entry within the log
    idx: usize,
    pub step: usize,
    pub energy: f64,
    /// initial-population number, present when `step` is 0
    pub init: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyLog {
    entries: Vec<Entry>,
}

impl EnergyLog {
    pub fn parse(buf: &LineBuffer) -> Result<Self, ElogError> {
        let mut entries = Vec::new();
        for (i, line) in buf.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            entries
                .push(parse_entry(line).ok_or(ElogError::Malformed(i))?);
        }
        if entries.is_empty() {
            return Err(ElogError::Empty);
        }
        Ok(Self { entries })
    }

    fn target_at(&self, idx: usize) -> StepTarget {
        let e = self.entries[idx];
        StepTarget {
            idx,
            step: e.step,
            energy: e.energy,
            // step 0 may refer to an initial-generation structure
            init: if e.step == 0 {
                self.entries.first().and_then(|f| f.init)
            } else {
                None
            },
        }
    }

    /// resolve the initial target: the final line's step, walked backward
    /// to the earliest consecutive entry reporting the identical energy,
    /// since later steps may just repeat the converged value
    pub fn final_target(&self) -> StepTarget {
        let mut idx = self.entries.len() - 1;
        let energy = self.entries[idx].energy;
        while idx > 0 && self.entries[idx - 1].energy == energy {
            idx -= 1;
        }
        self.target_at(idx)
    }

    /// after `failed`, the nearest earlier entry with the same energy, or
    /// failing that the nearest earlier entry with a different energy
    /// (the last known-good prior optimization state)
    pub fn backtrack(&self, failed: &StepTarget) -> Option<StepTarget> {
        let earlier = &self.entries[..failed.idx];
        let found = earlier
            .iter()
            .rposition(|e| e.energy == failed.energy)
            .or_else(|| {
                earlier.iter().rposition(|e| e.energy != failed.energy)
            })?;
        Some(self.target_at(found))
    }
}

fn is_marker(line: &str) -> bool {
    line.starts_with("step ")
        || line.starts_with("init ")
        || line.starts_with("replace ")
}

fn folder_of(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if !trimmed.starts_with("folder name") {
        return None;
    }
    trimmed
        .split(':')
        .next_back()
        .map(|f| f.trim().to_string())
}

/// the folder substituted for population `pop`, if any: `replace` markers
/// scanned back-to-front so the latest substitution wins, each paired
/// with the nearest preceding `folder name:` line
fn find_replacement(buf: &LineBuffer, pop: usize) -> Option<String> {
    let want = pop.to_string();
    let mark = buf.find_backward(buf.len().saturating_sub(1), |l| {
        let t = l.trim();
        t.starts_with("replace")
            && t.split_whitespace().next_back() == Some(&want)
    })?;
    let folder = buf.find_backward(mark.saturating_sub(1), |l| {
        l.trim().starts_with("folder name")
    })?;
    folder_of(buf.get(folder).unwrap())
}

/// the folder declared after `marker`, reading forward from the marker
/// line and stopping at a blank line or the next marker
fn find_after_marker(buf: &LineBuffer, marker: &str) -> Option<String> {
    let start = buf.find_forward(0, |l| l.trim() == marker)?;
    for j in start + 1..buf.len() {
        let line = buf.get(j).unwrap().trim();
        if line.is_empty() || is_marker(line) {
            return None;
        }
        if let Some(folder) = folder_of(line) {
            return Some(folder);
        }
    }
    None
}

/// locate the working folder for population `pop`: the latest `replace`
/// substitution if any, otherwise the folder declared under the
/// population's `init` marker
pub fn locate_population_folder(
    buf: &LineBuffer,
    pop: usize,
) -> Option<String> {
    find_replacement(buf, pop)
        .or_else(|| find_after_marker(buf, &format!("init {pop}")))
}

/// locate the working folder for `target` in the calculation trace
pub fn locate_folder(buf: &LineBuffer, target: &StepTarget) -> Option<String> {
    if let Some(init) = target.init {
        locate_population_folder(buf, init)
    } else {
        find_after_marker(buf, &format!("step {}", target.step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_target_distinct_energy() {
        let log = EnergyLog::parse(&LineBuffer::from(
            "0: init 7 -50.0\n1: step1 -50.0\n2: step2 -55.0\n",
        ))
        .unwrap();
        let got = log.final_target();
        assert_eq!(got.step, 2);
        assert_eq!(got.energy, -55.0);
        assert_eq!(got.init, None);
    }

    #[test]
    fn final_target_backward_merge() {
        let log = EnergyLog::parse(&LineBuffer::from(
            "0: init 7 -50.0\n1: step1 -50.0\n",
        ))
        .unwrap();
        let got = log.final_target();
        assert_eq!(got.step, 0);
        assert_eq!(got.init, Some(7));
    }

    #[test]
    fn backtrack_prefers_same_energy() {
        let log = EnergyLog::parse(&LineBuffer::from(
            "0: init 2 -50.0\n1: a -55.0\n2: b -53.0\n3: c -55.0\n4: d -60.0\n",
        ))
        .unwrap();
        let target = log.final_target();
        assert_eq!(target.step, 4);
        // step 4 failed: no earlier -60.0, so fall back to the nearest
        // earlier different energy
        let next = log.backtrack(&target).unwrap();
        assert_eq!(next.step, 3);
        assert_eq!(next.energy, -55.0);
        // step 3 failed: the nearest earlier entry with the same -55.0
        let next = log.backtrack(&next).unwrap();
        assert_eq!(next.step, 1);
        // step 1 failed: nearest earlier different energy is step 0
        let next = log.backtrack(&next).unwrap();
        assert_eq!(next.step, 0);
        assert_eq!(next.init, Some(2));
        // nothing earlier remains
        assert_eq!(log.backtrack(&next), None);
    }

    #[test]
    fn malformed_line() {
        assert_eq!(
            EnergyLog::parse(&LineBuffer::from("0: init 7 -50.0\nwat\n")),
            Err(ElogError::Malformed(1))
        );
        assert_eq!(
            EnergyLog::parse(&LineBuffer::from("\n")),
            Err(ElogError::Empty)
        );
    }

    fn trace() -> LineBuffer {
        LineBuffer::from(
            "starting search
init 7
some chatter
folder name: gen0_7
init 8
folder name: gen0_8

step 3
folder name: opt_step_3
step 4

folder name: unreachable_after_blank
replace candidate 7
folder name: swap_a
replace candidate 7
folder name: swap_b
",
        )
    }

    #[test]
    fn folder_for_step() {
        let log = EnergyLog::parse(&LineBuffer::from("3: s -1.0\n")).unwrap();
        let t = log.final_target();
        assert_eq!(
            locate_folder(&trace(), &t),
            Some(String::from("opt_step_3"))
        );
    }

    #[test]
    fn folder_lookup_stops_at_blank() {
        let log = EnergyLog::parse(&LineBuffer::from("4: s -1.0\n")).unwrap();
        let t = log.final_target();
        assert_eq!(locate_folder(&trace(), &t), None);
    }

    #[test]
    fn replacement_wins_for_init() {
        let log =
            EnergyLog::parse(&LineBuffer::from("0: init 7 -1.0\n")).unwrap();
        let t = log.final_target();
        // the *latest* substitution, scanned back-to-front, and its
        // nearest preceding folder line
        assert_eq!(locate_folder(&trace(), &t), Some(String::from("swap_a")));
    }

    #[test]
    fn init_marker_fallback() {
        let log =
            EnergyLog::parse(&LineBuffer::from("0: init 8 -1.0\n")).unwrap();
        let t = log.final_target();
        assert_eq!(locate_folder(&trace(), &t), Some(String::from("gen0_8")));
    }
}
