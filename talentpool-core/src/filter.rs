//! Invitation-date, site and campaign-title filtering
//!
//! Filters are an immutable value built once per run. An empty site or title
//! selection places no restriction on that column.

use crate::error::{DashboardError, Result};
use crate::events::{ActivityEvent, EventTable};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Earliest and latest invitation dates in the export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateBounds {
    /// Scan the export for valid invitation dates
    pub fn of(table: &EventTable) -> Result<Self> {
        let mut dates = table
            .events()
            .iter()
            .filter_map(|e| e.invited_at.map(|t| t.date()));
        let first = dates.next().ok_or(DashboardError::NoValidDates)?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Ok(DateBounds { min, max })
    }

    /// The last `lookback_days` days up to the latest invitation, clamped to the data
    pub fn default_range(&self, lookback_days: u32) -> (NaiveDate, NaiveDate) {
        let start = self.max - Duration::days(i64::from(lookback_days));
        (start.max(self.min), self.max)
    }
}

/// Row filter over invitation date, site and campaign title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// First invitation date included
    pub start: NaiveDate,
    /// Last invitation date included
    pub end: NaiveDate,
    pub sites: BTreeSet<String>,
    pub titles: BTreeSet<String>,
}

impl FilterOptions {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        FilterOptions {
            start,
            end,
            sites: BTreeSet::new(),
            titles: BTreeSet::new(),
        }
    }

    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sites = selection(sites);
        self
    }

    pub fn with_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.titles = selection(titles);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(DashboardError::InvalidFilter(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Half-open invitation window `[start 00:00, end + 1 day 00:00)`
    fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let lo = self.start.and_time(chrono::NaiveTime::MIN);
        let hi = (self.end + Duration::days(1)).and_time(chrono::NaiveTime::MIN);
        (lo, hi)
    }

    fn admits(&self, event: &ActivityEvent, window: (NaiveDateTime, NaiveDateTime)) -> bool {
        let in_window = event
            .invited_at
            .is_some_and(|t| t >= window.0 && t < window.1);
        in_window
            && selected(&self.sites, event.site.as_deref())
            && selected(&self.titles, event.title.as_deref())
    }

    /// Whether a single event passes every filter
    pub fn matches(&self, event: &ActivityEvent) -> bool {
        self.admits(event, self.window())
    }
}

fn selection<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn selected(set: &BTreeSet<String>, value: Option<&str>) -> bool {
    set.is_empty() || value.is_some_and(|v| set.contains(v))
}

/// Events that passed a filter, borrowed from their table
#[derive(Debug, Clone)]
pub struct FilteredEvents<'a> {
    table: &'a EventTable,
    events: Vec<&'a ActivityEvent>,
    options: FilterOptions,
}

impl<'a> FilteredEvents<'a> {
    pub fn table(&self) -> &'a EventTable {
        self.table
    }

    pub fn events(&self) -> &[&'a ActivityEvent] {
        &self.events
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct candidates among the filtered events
    pub fn candidate_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.candidate_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Apply a filter to the export
///
/// Fails with `NoMatchingRows` when nothing survives.
pub fn apply<'a>(table: &'a EventTable, options: &FilterOptions) -> Result<FilteredEvents<'a>> {
    options.validate()?;
    let window = options.window();
    let events: Vec<&ActivityEvent> = table
        .events()
        .iter()
        .filter(|e| options.admits(e, window))
        .collect();

    tracing::debug!(
        kept = events.len(),
        total = table.len(),
        start = %options.start,
        end = %options.end,
        "applied filters"
    );

    if events.is_empty() {
        return Err(DashboardError::NoMatchingRows);
    }
    Ok(FilteredEvents {
        table,
        events,
        options: options.clone(),
    })
}

/// Sorted distinct campaign sites
pub fn available_sites(table: &EventTable) -> Vec<String> {
    table
        .events()
        .iter()
        .filter_map(|e| e.site.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct campaign titles offered for a site selection
///
/// With no sites selected every title is offered.
pub fn available_titles(table: &EventTable, sites: &BTreeSet<String>) -> Vec<String> {
    table
        .events()
        .iter()
        .filter(|e| selected(sites, e.site.as_deref()))
        .filter_map(|e| e.title.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Everything a caller can choose from when building a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChoices {
    pub bounds: DateBounds,
    /// Range used when no dates are given
    pub default_start: NaiveDate,
    pub default_end: NaiveDate,
    pub sites: Vec<String>,
    /// Titles offered for the selected sites
    pub titles: Vec<String>,
}

impl FilterChoices {
    pub fn of(table: &EventTable, sites: &BTreeSet<String>, lookback_days: u32) -> Result<Self> {
        let bounds = DateBounds::of(table)?;
        let (default_start, default_end) = bounds.default_range(lookback_days);
        Ok(FilterChoices {
            bounds,
            default_start,
            default_end,
            sites: available_sites(table),
            titles: available_titles(table, sites),
        })
    }

    /// Filter over the default range with the given selections
    pub fn default_filter(&self) -> FilterOptions {
        FilterOptions::new(self.default_start, self.default_end)
    }
}
