//! Folder-transition funnel metrics
//!
//! For each named (from, to) pair: how many distinct candidates made the move
//! in a single event, what share of all candidates that is, and how long they
//! took to get from entering the "from" stage to entering the "to" stage.
//!
//! Invariants:
//! - `count <= total_candidates`
//! - A candidate is counted once per metric regardless of how many matching events it has
//! - Durations with `end < start` or a missing endpoint are excluded from averages

use crate::events::ActivityEvent;
use crate::folders::{FolderCatalog, FolderCondition};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A named transition to measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    pub title: String,
    pub from: FolderCondition,
    pub to: FolderCondition,
}

impl MetricSpec {
    pub fn new(title: &str, from: &str, to: &str) -> Self {
        MetricSpec {
            title: title.to_string(),
            from: FolderCondition::parse(from),
            to: FolderCondition::parse(to),
        }
    }
}

/// The standard pipeline conversion rows
pub fn default_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("Application to Completed", "Any", "Completed"),
        MetricSpec::new("Application to Passed Prescreening", "Any", "Passed MQ"),
        MetricSpec::new("Passed Prescreening to Talent Pool", "Passed MQ", "Talent Pool"),
        MetricSpec::new("Application to Talent Pool", "Any", "Talent Pool"),
        MetricSpec::new("Application to Client Folder", "Any", "Client Folder"),
        MetricSpec::new("Application to Shortlisted", "Any", "Shortlisted"),
        MetricSpec::new("Application to Hired", "Any", "Hired"),
        MetricSpec::new("Talent Pool to Client Folder", "Talent Pool", "Client Folder"),
        MetricSpec::new("Talent Pool to Shortlisted", "Talent Pool", "Shortlisted"),
        MetricSpec::new("Client Folder to Shortlisted", "Client Folder", "Shortlisted"),
        MetricSpec::new("Shortlisted to Hired", "Shortlisted", "Hired"),
        MetricSpec::new("Shortlisted to Rejected", "Shortlisted", "Rejected"),
    ]
}

/// One row of the folder movement summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransitionSummary {
    pub metric: String,
    pub count: usize,
    /// Share of all candidates, two decimals
    pub percentage: String,
    /// Mean whole days, one decimal, or "N/A"
    pub avg_days: String,
    /// Mean whole days over engaged candidates only
    pub avg_days_engaged: String,
    pub unengaged_count: usize,
}

/// Funnel output for one filtered run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FunnelReport {
    pub total_candidates: usize,
    pub rows: Vec<TransitionSummary>,
}

/// Candidates with a gap longer than `threshold` between consecutive dated events
pub fn unengaged_candidates<'a>(
    events: &[&'a ActivityEvent],
    threshold: Duration,
) -> HashSet<&'a str> {
    let mut timelines: HashMap<&'a str, Vec<NaiveDateTime>> = HashMap::new();
    for event in events {
        if let Some(t) = event.activity_at {
            timelines
                .entry(event.candidate_id.as_str())
                .or_default()
                .push(t);
        }
    }

    timelines
        .into_iter()
        .filter_map(|(cid, mut times)| {
            times.sort();
            times
                .windows(2)
                .any(|pair| pair[1] - pair[0] > threshold)
                .then_some(cid)
        })
        .collect()
}

/// Each candidate's earliest dated event
pub fn first_activity<'a>(events: &[&'a ActivityEvent]) -> HashMap<&'a str, NaiveDateTime> {
    let mut first: HashMap<&'a str, NaiveDateTime> = HashMap::new();
    for event in events {
        if let Some(t) = event.activity_at {
            first
                .entry(event.candidate_id.as_str())
                .and_modify(|cur| *cur = (*cur).min(t))
                .or_insert(t);
        }
    }
    first
}

/// Format `count / total` as a percentage with two decimals
pub fn format_percentage(count: usize, total: usize) -> String {
    if total == 0 {
        "0.00".to_string()
    } else {
        format!("{:.2}", count as f64 / total as f64 * 100.0)
    }
}

/// Mean of whole-day durations, one decimal, "N/A" when empty
pub fn format_average(days: &[i64]) -> String {
    if days.is_empty() {
        "N/A".to_string()
    } else {
        let sum: i64 = days.iter().sum();
        format!("{:.1}", sum as f64 / days.len() as f64)
    }
}

/// Per-run state shared by every metric
pub struct FunnelContext<'a> {
    events: &'a [&'a ActivityEvent],
    catalog: &'a FolderCatalog,
    total_candidates: usize,
    unengaged: HashSet<&'a str>,
    first_activity: HashMap<&'a str, NaiveDateTime>,
}

impl<'a> FunnelContext<'a> {
    pub fn new(
        events: &'a [&'a ActivityEvent],
        catalog: &'a FolderCatalog,
        total_candidates: usize,
        unengaged_after: Duration,
    ) -> Self {
        let unengaged = unengaged_candidates(events, unengaged_after);
        tracing::debug!(
            candidates = total_candidates,
            unengaged = unengaged.len(),
            "prepared funnel context"
        );
        FunnelContext {
            events,
            catalog,
            total_candidates,
            unengaged,
            first_activity: first_activity(events),
        }
    }

    pub fn total_candidates(&self) -> usize {
        self.total_candidates
    }

    pub fn is_unengaged(&self, candidate_id: &str) -> bool {
        self.unengaged.contains(candidate_id)
    }

    /// Latest time each candidate in `cids` was moved into a folder matching `condition`
    fn latest_entry(
        &self,
        condition: &FolderCondition,
        cids: &BTreeSet<&'a str>,
    ) -> HashMap<&'a str, NaiveDateTime> {
        let mut latest: HashMap<&'a str, NaiveDateTime> = HashMap::new();
        for event in self.events {
            let cid = event.candidate_id.as_str();
            if !cids.contains(cid) || !condition.matches(event.folder_to.as_ref(), self.catalog) {
                continue;
            }
            if let Some(t) = event.activity_at {
                latest
                    .entry(cid)
                    .and_modify(|cur| *cur = (*cur).max(t))
                    .or_insert(t);
            }
        }
        latest
    }

    /// Compute one summary row
    pub fn compute(&self, spec: &MetricSpec) -> TransitionSummary {
        let transitioned: BTreeSet<&'a str> = self
            .events
            .iter()
            .filter(|e| {
                spec.from.matches(e.folder_from.as_ref(), self.catalog)
                    && spec.to.matches(e.folder_to.as_ref(), self.catalog)
            })
            .map(|e| e.candidate_id.as_str())
            .collect();

        let start_times = if spec.from.is_any() {
            None
        } else {
            Some(self.latest_entry(&spec.from, &transitioned))
        };
        let end_times = self.latest_entry(&spec.to, &transitioned);

        let mut all_days = Vec::new();
        let mut engaged_days = Vec::new();
        for cid in &transitioned {
            let start = match &start_times {
                Some(times) => times.get(cid),
                None => self.first_activity.get(cid),
            };
            let (Some(start), Some(end)) = (start, end_times.get(cid)) else {
                continue;
            };
            if end < start {
                continue;
            }
            let days = (*end - *start).num_days();
            all_days.push(days);
            if !self.is_unengaged(cid) {
                engaged_days.push(days);
            }
        }

        let unengaged_count = transitioned
            .iter()
            .filter(|cid| self.is_unengaged(cid))
            .count();

        TransitionSummary {
            metric: spec.title.clone(),
            count: transitioned.len(),
            percentage: format_percentage(transitioned.len(), self.total_candidates),
            avg_days: format_average(&all_days),
            avg_days_engaged: format_average(&engaged_days),
            unengaged_count,
        }
    }
}

/// Compute every metric over the filtered events
pub fn compute_funnel(
    events: &[&ActivityEvent],
    metrics: &[MetricSpec],
    catalog: &FolderCatalog,
    unengaged_after: Duration,
) -> FunnelReport {
    let total_candidates = events
        .iter()
        .map(|e| e.candidate_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let ctx = FunnelContext::new(events, catalog, total_candidates, unengaged_after);
    let rows = metrics.iter().map(|spec| ctx.compute(spec)).collect();
    FunnelReport {
        total_candidates,
        rows,
    }
}
