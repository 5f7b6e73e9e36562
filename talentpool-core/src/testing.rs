//! Builders shared by unit tests

use crate::events::ActivityEvent;
use crate::folders::FolderName;
use chrono::{NaiveDate, NaiveDateTime};

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .unwrap_or_else(|e| panic!("bad test timestamp {s}: {e}"))
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad test date {s}: {e}"))
}

/// An event with invitation at the activity time and no optional fields
pub fn event(candidate: &str, when: &str, from: &str, to: &str) -> ActivityEvent {
    ActivityEvent {
        row: 0,
        candidate_id: candidate.to_string(),
        invited_at: Some(at(when)),
        activity_at: Some(at(when)),
        folder_from: FolderName::parse(from),
        folder_to: FolderName::parse(to),
        site: Some("Manila".to_string()),
        title: Some("Voice Support".to_string()),
        failed_reason: None,
        cefr: None,
    }
}

pub fn rejected(mut e: ActivityEvent, reason: &str) -> ActivityEvent {
    e.failed_reason = Some(reason.to_string());
    e
}

pub fn with_cefr(mut e: ActivityEvent, level: &str) -> ActivityEvent {
    e.cefr = Some(level.to_string());
    e
}

/// Assign row numbers in slice order
pub fn numbered(mut events: Vec<ActivityEvent>) -> Vec<ActivityEvent> {
    for (i, e) in events.iter_mut().enumerate() {
        e.row = i;
    }
    events
}
