//! talentpool core library - recruiting funnel and talent pool analytics over ATS activity exports

// Global invariants enforced in this crate:
// - Reports are pure functions of (filtered events, settings, as-of time)
// - No global mutable state
// - No clocks, threads, or async; callers supply the as-of time
// - Candidates are counted distinctly in every table
// - Row and column orders are fixed, never derived from hash iteration
// - Identical input yields byte-for-byte identical output

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod folders;
pub mod funnel;
pub mod pivot;
pub mod report;

#[cfg(test)]
mod testing;

pub use cache::TableCache;
pub use classify::{AgeBand, ClassifiedCandidate, LabelRules, RowLabel};
pub use config::{DashboardSettings, ResolvedConfig};
pub use error::{DashboardError, Result};
pub use events::{ActivityEvent, EventTable};
pub use filter::{DateBounds, FilterChoices, FilterOptions, FilteredEvents};
pub use funnel::{FunnelReport, MetricSpec, TransitionSummary};
pub use pivot::{DayWindow, PivotTable, WindowAnchor};
pub use report::{render_json, BreakdownReport, DashboardReport};

use chrono::NaiveDateTime;

/// Compute the folder movement summary for the filtered events
pub fn funnel_report(filtered: &FilteredEvents<'_>, settings: &DashboardSettings) -> FunnelReport {
    funnel::compute_funnel(
        filtered.events(),
        &settings.metrics,
        &settings.catalog,
        settings.unengaged_after,
    )
}

/// Classified candidates together with the breakdown built from them
#[derive(Debug, Clone)]
pub struct Breakdown<'a> {
    pub classified: Vec<ClassifiedCandidate<'a>>,
    pub report: BreakdownReport,
}

/// Classify the filtered candidates and build every breakdown pivot
///
/// Sections that cannot be computed are left out and explained in
/// `report.warnings`.
pub fn breakdown<'a>(
    filtered: &FilteredEvents<'a>,
    settings: &DashboardSettings,
    now: NaiveDateTime,
) -> Breakdown<'a> {
    let classified = classify::classify(
        filtered.events(),
        &settings.catalog,
        &settings.label_rules,
        now,
    );
    let window = DayWindow::resolve(
        settings.window_anchor,
        settings.window_days,
        now.date(),
        filtered.options().end,
    );
    let columns = filtered.table().columns();
    let mut warnings = Vec::new();
    let mut skip = |message: String| {
        tracing::warn!("{}", message);
        warnings.push(message);
    };

    let labeled = classified.iter().filter(|c| c.label.is_some()).count();
    let mut by_band = None;
    let mut by_day = None;
    let mut cefr_by_day = None;
    let mut reason_cefr_by_day = None;

    if labeled == 0 {
        skip(
            "no candidates matched the breakdown criteria for the selected filters; breakdown skipped"
                .to_string(),
        );
    } else {
        by_band = Some(pivot::label_by_band(&classified));
        let day_table = pivot::label_by_day(&classified, &window);
        let in_window = !day_table.is_empty();
        if in_window {
            by_day = Some(day_table);
        } else {
            skip(format!(
                "no labeled candidates with latest activity between {} and {}; daily breakdowns skipped",
                window.start(),
                window.end
            ));
        }

        if !columns.cefr {
            skip(format!(
                "{} column not found; CEFR breakdowns skipped",
                events::COL_CEFR
            ));
        } else if in_window {
            let table = pivot::cefr_by_day(
                &classified,
                RowLabel::NewForEndorsement,
                &settings.cefr_levels,
                &window,
            );
            if table.is_empty() {
                skip(format!(
                    "no {} candidates in the daily window; CEFR breakdown skipped",
                    RowLabel::NewForEndorsement.as_str()
                ));
            } else {
                cefr_by_day = Some(table);
            }

            if !columns.failed_reason {
                skip(format!(
                    "{} column not found; rejection reason breakdown skipped",
                    events::COL_FAILED_REASON
                ));
            } else {
                let table = pivot::reason_cefr_by_day(&classified, &settings.cefr_levels, &window);
                if table.is_empty() {
                    skip(format!(
                        "no {} candidates in the daily window; rejection reason breakdown skipped",
                        RowLabel::RejectedForWaterfall.as_str()
                    ));
                } else {
                    reason_cefr_by_day = Some(table);
                }
            }
        }
    }

    let report = BreakdownReport {
        as_of: now,
        candidates: classified.len(),
        labeled,
        by_band,
        window,
        by_day,
        cefr_by_day,
        reason_cefr_by_day,
        warnings,
    };
    Breakdown { classified, report }
}
