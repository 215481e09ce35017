//! Upload-stage show matching: payload override, then a `(label, date)`
//! heuristic against the recording's filename or mtime, else unattached.

use chrono::{Datelike, NaiveDate};

use scc_clients::Show;
use scc_models::Recording;

/// Outcome of attempting to match a Recording to a Cablecast show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowMatch {
    Matched(scc_models::CablecastShowId),
    /// No match found; upload proceeds unattached and is flagged for review.
    Unattached,
}

/// Parse a `YYYYMMDD` token out of a filename stem, if present.
fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    for token in filename.split(|c: char| !c.is_ascii_digit()) {
        if token.len() == 8 {
            if let Ok(date) = NaiveDate::parse_from_str(token, "%Y%m%d") {
                return Some(date);
            }
        }
    }
    None
}

fn recording_date(recording: &Recording) -> NaiveDate {
    date_from_filename(&recording.filename).unwrap_or_else(|| recording.mtime.date_naive())
}

/// `shows` is assumed to already be scoped to the volume's municipality
/// label (the caller, not this function, decides which Cablecast account/
/// label a volume maps to).
pub fn match_show(volume_label: &str, recording: &Recording, shows: &[Show]) -> ShowMatch {
    let target_date = recording_date(recording);

    for show in shows {
        let Some(show_date_str) = &show.cablecast_date else { continue };
        let Ok(show_date) = NaiveDate::parse_from_str(show_date_str, "%Y-%m-%d") else { continue };
        if show.title.eq_ignore_ascii_case(volume_label) && show_date == target_date {
            return ShowMatch::Matched(show.id.clone());
        }
    }

    ShowMatch::Unattached
}

/// Kept for callers that only need the year for log context (e.g. the
/// caption-check audit path), not full matching.
pub fn recording_year(recording: &Recording) -> i32 {
    recording_date(recording).year()
}
