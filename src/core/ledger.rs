use std::{fmt, time::Instant};

use log::trace;

use crate::op::{HistoryEntry, OpValue, OperationKind};

/// Classification returned by [`HistoryLedger::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerResponse {
    /// The kind differs from the previous entry (or the ledger was empty).
    NewOperation,
    /// The previous entry has the same kind. Still recorded as its own step.
    SameAsLastOperation,
    /// Nothing was recorded; the caller wants no history effects.
    Dummy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    MissingValue(OperationKind),
    UnexpectedValue { kind: OperationKind, value: OpValue },
    OutOfRange { kind: OperationKind, value: OpValue },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(kind) => write!(f, "{kind} requires a value"),
            Self::UnexpectedValue { kind, value } => {
                write!(f, "{kind} cannot be recorded with {value:?}")
            }
            Self::OutOfRange { kind, value } => write!(f, "{value:?} is out of range for {kind}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Checks that `value` is what `kind` expects. Returns the value to store.
pub fn validate(kind: OperationKind, value: Option<OpValue>) -> Result<OpValue, LedgerError> {
    let expected = kind.traits().shape;
    match value {
        None | Some(OpValue::Unset) if kind.requires_value() => Err(LedgerError::MissingValue(kind)),
        None | Some(OpValue::Unset) => Ok(OpValue::Unset),
        // Exposure is a multiplier of 1 + value and must stay positive.
        Some(OpValue::Scalar(v)) if kind == OperationKind::Exposure && (v.is_nan() || v <= -1.0) => {
            Err(LedgerError::OutOfRange {
                kind,
                value: OpValue::Scalar(v),
            })
        }
        Some(v) if v.shape() == expected => Ok(v),
        Some(v) => Err(LedgerError::UnexpectedValue { kind, value: v }),
    }
}

/// Linear log of applied operations for one image session.
///
/// `entries` and `values` are always the same length; value-less operations
/// store [`OpValue::Unset`].
#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: Vec<OperationKind>,
    values: Vec<OpValue>,
    last_appended: Option<Instant>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `kind` with `value`.
    ///
    /// Repeats of the previous kind are reported as
    /// [`LedgerResponse::SameAsLastOperation`] but are never merged: every
    /// repeat stays undoable on its own.
    pub fn append(
        &mut self,
        kind: OperationKind,
        value: Option<OpValue>,
    ) -> Result<LedgerResponse, LedgerError> {
        let value = validate(kind, value)?;
        let response = if self.entries.last() == Some(&kind) {
            LedgerResponse::SameAsLastOperation
        } else {
            LedgerResponse::NewOperation
        };

        trace!("ledger append {kind:?} -> {response:?}");
        self.entries.push(kind);
        self.values.push(value);
        self.last_appended = Some(Instant::now());
        Ok(response)
    }

    /// Removes the last entry. No-op when empty.
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        let kind = self.entries.pop()?;
        let value = self.values.pop().unwrap_or_default();
        Some(HistoryEntry { kind, value })
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.values.clear();
        self.last_appended = None;
    }

    pub fn last_kind(&self) -> Option<OperationKind> {
        self.entries.last().copied()
    }

    /// Value of the most recent entry of `kind`, scanning backwards.
    pub fn last_value_of(&self, kind: OperationKind) -> Option<&OpValue> {
        self.entries
            .iter()
            .rposition(|k| *k == kind)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn entries(&self) -> &[OperationKind] {
        &self.entries
    }

    pub fn values(&self) -> &[OpValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_appended_at(&self) -> Option<Instant> {
        self.last_appended
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .zip(&self.values)
            .map(|(kind, value)| HistoryEntry {
                kind: *kind,
                value: value.clone(),
            })
            .collect()
    }
}
