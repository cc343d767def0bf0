//! An indexed, immutable line buffer with explicit cursor state.
//!
//! Both trace-log readers in [crate::elog] and the population-trace parser
//! in [crate::trace] scan whole files by line index, forward and backward.
//! [LineBuffer] holds the file once and exposes the searches so the
//! readers share one scanning mechanism.

use std::{fs::read_to_string, io, path::Path};

#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from(read_to_string(path)?.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// index of the first line at or after `from` satisfying `pred`
    pub fn find_forward(
        &self,
        from: usize,
        pred: impl Fn(&str) -> bool,
    ) -> Option<usize> {
        (from..self.lines.len()).find(|&i| pred(&self.lines[i]))
    }

    /// index of the last line at or before `from` satisfying `pred`
    pub fn find_backward(
        &self,
        from: usize,
        pred: impl Fn(&str) -> bool,
    ) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        (0..=from.min(self.lines.len() - 1))
            .rev()
            .find(|&i| pred(&self.lines[i]))
    }
}

impl From<&str> for LineBuffer {
    fn from(s: &str) -> Self {
        Self {
            lines: s.lines().map(String::from).collect(),
        }
    }
}
