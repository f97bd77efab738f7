//! Page type returned by store scans.

use crate::model::Record;

/// One page of a key-ordered scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub records: Vec<Record>,
    /// Key to resume after; `None` once the table is exhausted.
    pub last_key: Option<String>,
}
