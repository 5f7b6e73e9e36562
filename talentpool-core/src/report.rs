//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs for the same `as_of`

use crate::filter::FilterOptions;
use crate::funnel::FunnelReport;
use crate::pivot::{DayWindow, PivotTable, GRAND_TOTAL};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Talent pool breakdown: every pivot computed for one run
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownReport {
    pub as_of: NaiveDateTime,
    /// Distinct candidates with a dated latest activity
    pub candidates: usize,
    /// Candidates carrying one of the three labels
    pub labeled: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_band: Option<PivotTable>,
    pub window: DayWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_day: Option<PivotTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cefr_by_day: Option<PivotTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_cefr_by_day: Option<PivotTable>,
    /// Sections that were skipped, and why
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl BreakdownReport {
    /// Present pivots in display order
    pub fn tables(&self) -> Vec<&PivotTable> {
        self.by_band
            .iter()
            .chain(self.by_day.as_ref())
            .chain(self.cefr_by_day.as_ref())
            .chain(self.reason_cefr_by_day.as_ref())
            .collect()
    }
}

/// Funnel and breakdown computed from one load
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub filters: FilterOptions,
    pub funnel: FunnelReport,
    pub breakdown: BreakdownReport,
}

const FUNNEL_TITLE: &str = "FOLDER MOVEMENT SUMMARY";

/// Render the funnel summary as text output
pub fn render_funnel_text(report: &FunnelReport) -> String {
    let headers = [
        "Metric",
        "Count",
        "Percentage(%)",
        "Avg Time (In Days)",
        "Avg Time (Engaged)",
        "Unengaged Candidates",
    ];
    let metric_width = report
        .rows
        .iter()
        .map(|r| r.metric.chars().count())
        .chain(std::iter::once(headers[0].len()))
        .max()
        .unwrap_or(0);

    let mut output = title_block(&format!(
        "{} ({} candidates)",
        FUNNEL_TITLE, report.total_candidates
    ));
    output.push_str(&format!(
        "{:<mw$}  {:>5}  {:>13}  {:>18}  {:>18}  {:>20}\n",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        headers[4],
        headers[5],
        mw = metric_width,
    ));
    for row in &report.rows {
        output.push_str(&format!(
            "{:<mw$}  {:>5}  {:>13}  {:>18}  {:>18}  {:>20}\n",
            row.metric,
            row.count,
            row.percentage,
            row.avg_days,
            row.avg_days_engaged,
            row.unengaged_count,
            mw = metric_width,
        ));
    }
    output
}

/// Render one pivot with its Grand Total column and row
pub fn render_pivot_text(table: &PivotTable) -> String {
    let levels = table.row_levels.len();

    // Width of each row-key column
    let key_widths: Vec<usize> = (0..levels)
        .map(|i| {
            table
                .rows
                .iter()
                .map(|r| r.key.get(i).map_or(0, |k| k.chars().count()))
                .chain(std::iter::once(table.row_levels[i].chars().count()))
                .chain((i == 0).then_some(GRAND_TOTAL.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let cell_widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(j, col)| {
            col.chars()
                .count()
                .max(table.totals.get(j).map_or(1, |t| t.to_string().len()))
        })
        .collect();
    let total_width = GRAND_TOTAL.len().max(table.grand_total.to_string().len());

    let mut output = title_block(&table.title);

    let mut line = Vec::new();
    for (level, width) in table.row_levels.iter().zip(&key_widths) {
        line.push(format!("{:<width$}", level, width = width));
    }
    for (col, width) in table.columns.iter().zip(&cell_widths) {
        line.push(format!("{:>width$}", col, width = width));
    }
    line.push(format!("{:>width$}", GRAND_TOTAL, width = total_width));
    push_line(&mut output, &line);

    for row in &table.rows {
        line.clear();
        for (key, width) in row.key.iter().zip(&key_widths) {
            line.push(format!("{:<width$}", key, width = width));
        }
        for (cell, width) in row.cells.iter().zip(&cell_widths) {
            line.push(format!("{:>width$}", cell, width = width));
        }
        line.push(format!("{:>width$}", row.total, width = total_width));
        push_line(&mut output, &line);
    }

    line.clear();
    for (i, width) in key_widths.iter().enumerate() {
        let label = if i == 0 { GRAND_TOTAL } else { "" };
        line.push(format!("{:<width$}", label, width = width));
    }
    for (total, width) in table.totals.iter().zip(&cell_widths) {
        line.push(format!("{:>width$}", total, width = width));
    }
    line.push(format!(
        "{:>width$}",
        table.grand_total,
        width = total_width
    ));
    push_line(&mut output, &line);

    output
}

/// Render every breakdown table, separated by blank lines
pub fn render_breakdown_text(report: &BreakdownReport) -> String {
    report
        .tables()
        .into_iter()
        .map(render_pivot_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the combined dashboard: funnel first, then the breakdown
pub fn render_dashboard_text(report: &DashboardReport) -> String {
    format!(
        "{}\n{}",
        render_funnel_text(&report.funnel),
        render_breakdown_text(&report.breakdown)
    )
}

/// Render any report as JSON output
pub fn render_json<T: Serialize + ?Sized>(report: &T) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

fn title_block(title: &str) -> String {
    format!("{}\n{}\n", title, "=".repeat(title.chars().count()))
}

fn push_line(output: &mut String, cells: &[String]) {
    output.push_str(cells.join("  ").trim_end());
    output.push('\n');
}
