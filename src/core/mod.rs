//! Edit-history core: ledger, version store, and slider echo values.

/// Last applied filter values and engine-call planning.
pub mod filters;
/// Operation log with clone-or-mutate classification.
pub mod ledger;
/// Copy-on-write list of image generations.
pub mod versions;
