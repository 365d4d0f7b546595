//! Instance name uniqueness check
//!
//! Runs after disambiguation. Local file names are derived from instance
//! names, so a duplicate would make one series overwrite another on disk.

use crate::models::SeriesRecord;
use std::collections::{BTreeSet, HashSet};

/// True iff every record carries a distinct instance name
pub fn verify_unique_names(records: &[SeriesRecord]) -> bool {
    let names: HashSet<&str> = records.iter().map(|r| r.instance_name.as_str()).collect();
    names.len() == records.len()
}

/// Instance names held by more than one record, sorted
pub fn duplicate_names(records: &[SeriesRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for record in records {
        if !seen.insert(record.instance_name.as_str()) {
            duplicates.insert(record.instance_name.clone());
        }
    }
    duplicates.into_iter().collect()
}
