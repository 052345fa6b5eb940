//! Per-mock record of actual invocations.

use crate::error::{HypoError, Result};
use crate::value::ArgValue;

/// One recorded invocation. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub file: &'static str,
    pub line: u32,
    pub args: Vec<ArgValue>,
}

impl CallRecord {
    #[must_use]
    pub fn new(file: &'static str, line: u32, args: Vec<ArgValue>) -> Self {
        Self { file, line, args }
    }
}

/// Growable, append-only (until cleared) call list for one mock.
///
/// The owning mock name is kept so that out-of-range reads can say which
/// ledger was misindexed.
#[derive(Debug, Clone, Default)]
pub struct CallLedger {
    owner: String,
    calls: Vec<CallRecord>,
}

impl CallLedger {
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            calls: Vec::new(),
        }
    }

    /// Append a record and return its index.
    pub fn append(&mut self, record: CallRecord) -> usize {
        self.calls.push(record);
        self.calls.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&CallRecord> {
        self.calls.get(index).ok_or_else(|| HypoError::OutOfRange {
            mock: self.owner.clone(),
            index,
            len: self.calls.len(),
        })
    }

    #[must_use]
    pub fn records(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Release every record. Capacity is dropped as well so a noisy test
    /// does not pin memory for the rest of the run.
    pub fn clear(&mut self) {
        self.calls = Vec::new();
    }
}
