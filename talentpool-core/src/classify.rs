//! Latest-activity classification for the talent pool breakdown
//!
//! Each candidate is reduced to its most recent dated event, then given at
//! most one label. Label priority is fixed: databank first, then new, then
//! rejected. Client-folder history is judged over the candidate's whole
//! filtered history, not only the latest row.

use crate::events::ActivityEvent;
use crate::folders::{normalize_folder, FolderCatalog};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Breakdown row label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowLabel {
    #[serde(rename = "New (for endorsement)")]
    NewForEndorsement,
    #[serde(rename = "Rejected (for waterfall)")]
    RejectedForWaterfall,
    #[serde(rename = "Candidate Databank (in Cooling Period)")]
    CandidateDatabank,
}

impl RowLabel {
    /// Display order of breakdown rows
    pub const ALL: [RowLabel; 3] = [
        RowLabel::NewForEndorsement,
        RowLabel::RejectedForWaterfall,
        RowLabel::CandidateDatabank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RowLabel::NewForEndorsement => "New (for endorsement)",
            RowLabel::RejectedForWaterfall => "Rejected (for waterfall)",
            RowLabel::CandidateDatabank => "Candidate Databank (in Cooling Period)",
        }
    }
}

/// Age of the latest activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "<24hrs")]
    Under24Hours, // < 1 day
    #[serde(rename = "1-3 days")]
    OneToThreeDays,
    #[serde(rename = "4-7 days")]
    FourToSevenDays,
    #[serde(rename = "8-15 days")]
    EightToFifteenDays,
    #[serde(rename = "16-30 days")]
    SixteenToThirtyDays,
    #[serde(rename = "31+ days")]
    OverThirtyDays,
}

impl AgeBand {
    pub const ALL: [AgeBand; 6] = [
        AgeBand::Under24Hours,
        AgeBand::OneToThreeDays,
        AgeBand::FourToSevenDays,
        AgeBand::EightToFifteenDays,
        AgeBand::SixteenToThirtyDays,
        AgeBand::OverThirtyDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBand::Under24Hours => "<24hrs",
            AgeBand::OneToThreeDays => "1-3 days",
            AgeBand::FourToSevenDays => "4-7 days",
            AgeBand::EightToFifteenDays => "8-15 days",
            AgeBand::SixteenToThirtyDays => "16-30 days",
            AgeBand::OverThirtyDays => "31+ days",
        }
    }

    /// Band for an age in whole elapsed days
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 1 => AgeBand::Under24Hours,
            1..=3 => AgeBand::OneToThreeDays,
            4..=7 => AgeBand::FourToSevenDays,
            8..=15 => AgeBand::EightToFifteenDays,
            16..=30 => AgeBand::SixteenToThirtyDays,
            _ => AgeBand::OverThirtyDays,
        }
    }

    /// Band for timestamp `t` seen at `now`
    pub fn of(t: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self::from_days((now - t).num_days())
    }
}

/// Folder names the labels key on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRules {
    databank: String,
    talent_pool: String,
}

impl LabelRules {
    pub fn new(databank_folder: &str, talent_pool_folder: &str) -> Self {
        LabelRules {
            databank: normalize_folder(databank_folder),
            talent_pool: normalize_folder(talent_pool_folder),
        }
    }

    fn destination_is(folder: &str, event: &ActivityEvent) -> bool {
        event.folder_to.as_ref().is_some_and(|f| f.key() == folder)
    }

    /// Label for a candidate's latest event
    pub fn label(&self, latest: &ActivityEvent, has_client_history: bool) -> Option<RowLabel> {
        let in_databank = Self::destination_is(&self.databank, latest);
        let rejected = latest.failed_reason.is_some();

        if in_databank {
            Some(RowLabel::CandidateDatabank)
        } else if Self::destination_is(&self.talent_pool, latest) && !has_client_history && !rejected
        {
            Some(RowLabel::NewForEndorsement)
        } else if has_client_history && rejected {
            Some(RowLabel::RejectedForWaterfall)
        } else {
            None
        }
    }
}

impl Default for LabelRules {
    fn default() -> Self {
        LabelRules::new("Candidate Databank", "Talent Pool")
    }
}

/// A candidate reduced to its latest event
#[derive(Debug, Clone)]
pub struct ClassifiedCandidate<'a> {
    pub latest: &'a ActivityEvent,
    pub latest_at: NaiveDateTime,
    pub has_client_history: bool,
    pub label: Option<RowLabel>,
    pub band: AgeBand,
}

impl ClassifiedCandidate<'_> {
    pub fn candidate_id(&self) -> &str {
        &self.latest.candidate_id
    }
}

/// Latest dated event per candidate, ordered by candidate id
///
/// Ties on the maximum timestamp keep the earliest row in input order.
pub fn latest_per_candidate<'a>(events: &[&'a ActivityEvent]) -> Vec<&'a ActivityEvent> {
    let mut latest: BTreeMap<&'a str, &'a ActivityEvent> = BTreeMap::new();
    for &event in events {
        let Some(t) = event.activity_at else {
            continue;
        };
        latest
            .entry(event.candidate_id.as_str())
            .and_modify(|cur| {
                if cur.activity_at.is_some_and(|c| t > c) {
                    *cur = event;
                }
            })
            .or_insert(event);
    }
    latest.into_values().collect()
}

/// Candidates with any dated move into or out of a client folder
pub fn client_history<'a>(events: &[&'a ActivityEvent], catalog: &FolderCatalog) -> HashSet<&'a str> {
    events
        .iter()
        .filter(|e| e.activity_at.is_some() && e.touches_client_folder(catalog))
        .map(|e| e.candidate_id.as_str())
        .collect()
}

/// Classify every candidate with at least one dated event
pub fn classify<'a>(
    events: &[&'a ActivityEvent],
    catalog: &FolderCatalog,
    rules: &LabelRules,
    now: NaiveDateTime,
) -> Vec<ClassifiedCandidate<'a>> {
    let with_history = client_history(events, catalog);
    let classified: Vec<ClassifiedCandidate<'a>> = latest_per_candidate(events)
        .into_iter()
        .filter_map(|latest| {
            let latest_at = latest.activity_at?;
            let has_client_history = with_history.contains(latest.candidate_id.as_str());
            Some(ClassifiedCandidate {
                latest,
                latest_at,
                has_client_history,
                label: rules.label(latest, has_client_history),
                band: AgeBand::of(latest_at, now),
            })
        })
        .collect();

    tracing::debug!(
        candidates = classified.len(),
        labeled = classified.iter().filter(|c| c.label.is_some()).count(),
        "classified latest activity"
    );
    classified
}
