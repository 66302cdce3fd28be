use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

use crate::config::OutputConfig;
use crate::domain::EventRecord;
use crate::pipeline::processing::resolve::ConflictResolver;

static DATE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern compiles"));

/// Last pass over merged output: complete deadlines, fill the CFP sentinel, sort.
///
/// No record leaves here with a null `cfp`.
pub fn finalize_records(
    records: &mut [EventRecord],
    output: &OutputConfig,
    resolver: &ConflictResolver,
) {
    for record in records.iter_mut() {
        record.cfp = Some(match record.cfp.take() {
            Some(cfp) if !resolver.is_placeholder(Some(&cfp)) => {
                complete_deadline(&cfp, &output.default_cfp_time)
            }
            _ => output.cfp_sentinel.clone(),
        });

        record.cfp_ext = match record.cfp_ext.take() {
            Some(ext) if !resolver.is_placeholder(Some(&ext)) => {
                Some(complete_deadline(&ext, &output.default_cfp_time))
            }
            _ => None,
        };
    }

    if output.sort {
        records.sort_by(|a, b| compare_for_output(a, b, &output.cfp_sentinel));
        debug!("Sorted {} output records by deadline", records.len());
    }
}

/// Append the default time of day to a bare `YYYY-MM-DD` deadline
pub fn complete_deadline(value: &str, default_time: &str) -> String {
    let trimmed = value.trim();
    if DATE_ONLY.is_match(trimmed) {
        format!("{} {}", trimmed, default_time)
    } else {
        value.to_string()
    }
}

// Known deadlines first in date order, sentinel deadlines last; then start date and name
fn compare_for_output(a: &EventRecord, b: &EventRecord, sentinel: &str) -> Ordering {
    let deadline = |r: &EventRecord| {
        let cfp = r.cfp.as_deref().unwrap_or(sentinel);
        (cfp == sentinel, cfp.to_string())
    };
    deadline(a)
        .cmp(&deadline(b))
        .then_with(|| a.start.cmp(&b.start))
        .then_with(|| a.conference.cmp(&b.conference))
}
