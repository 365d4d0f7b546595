//! Series disambiguation and instance naming
//!
//! # Algorithm
//! 1. Stable sort by `(description, timestamp)`; ties keep input order.
//! 2. Walk once: the first record of a description run gets ordinal 1, each
//!    following record of the same run gets its predecessor's ordinal + 1.
//! 3. Flag, then name: a record is unique when it is the only member of its
//!    run and its description is not a special case. Unique records are named
//!    after their description, all others `description_ordinal`.
//! 4. Re-sort by series number. Names are final before this sort.
//!
//! Special-case descriptions therefore come out as `description_1` even when
//! they occur once, so a later acquisition of the same description can become
//! `description_2` without renaming the first.

use crate::models::SeriesRecord;
use std::collections::HashSet;
use tracing::debug;

/// Assigns instance ordinals and names
#[derive(Debug, Clone, Default)]
pub struct Disambiguator {
    special_cases: HashSet<String>,
}

impl Disambiguator {
    pub fn new<I, S>(special_cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            special_cases: special_cases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_special_case(&self, description: &str) -> bool {
        self.special_cases.contains(description)
    }

    /// Populate `instance_ordinal`, `is_unique` and `instance_name` on every
    /// record, leaving the collection ordered by series number.
    pub fn disambiguate(&self, records: &mut [SeriesRecord]) {
        // sort_by is stable
        records.sort_by(|a, b| {
            a.description
                .cmp(&b.description)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        for i in 0..records.len() {
            records[i].instance_ordinal = if i > 0 && records[i - 1].description == records[i].description {
                records[i - 1].instance_ordinal + 1
            } else {
                1
            };
        }

        let mut start = 0;
        while start < records.len() {
            let end = start
                + records[start..]
                    .iter()
                    .take_while(|r| r.description == records[start].description)
                    .count();
            let sole_member = end - start == 1;

            for record in &mut records[start..end] {
                record.is_unique = sole_member && !self.is_special_case(&record.description);
                record.instance_name = if record.is_unique {
                    record.description.clone()
                } else {
                    format!("{}_{}", record.description, record.instance_ordinal)
                };

                debug!(
                    series = record.series_number,
                    description = %record.description,
                    ordinal = record.instance_ordinal,
                    instance_name = %record.instance_name,
                    "Assigned instance name"
                );
            }

            start = end;
        }

        records.sort_by_key(|r| r.series_number);
    }
}
