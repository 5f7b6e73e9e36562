//! Cross-tab tables over classified candidates
//!
//! Every table counts distinct candidates per (row, column) cell. Row and
//! column sets are fixed up front so empty categories show as zero, and a
//! grand-total column and row are always present.

use crate::classify::{AgeBand, ClassifiedCandidate, RowLabel};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const GRAND_TOTAL: &str = "Grand Total";
pub const NO_CEFR: &str = "No CEFR";
pub const OTHER_CEFR: &str = "Others";

/// One row of a cross-tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotRow {
    /// One value per row-key level
    pub key: Vec<String>,
    pub cells: Vec<usize>,
    pub total: usize,
}

/// A count table with grand totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotTable {
    pub title: String,
    /// Names of the row-key levels
    pub row_levels: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    /// Column sums
    pub totals: Vec<usize>,
    pub grand_total: usize,
}

impl PivotTable {
    /// Build a table from `(row key, column, candidate id)` observations
    ///
    /// Observations whose row or column is not listed are dropped.
    pub fn build<'c, I>(
        title: &str,
        row_levels: &[&str],
        row_keys: Vec<Vec<String>>,
        columns: Vec<String>,
        observations: I,
    ) -> Self
    where
        I: IntoIterator<Item = (Vec<String>, String, &'c str)>,
    {
        let mut seen: Vec<Vec<BTreeSet<&'c str>>> =
            vec![vec![BTreeSet::new(); columns.len()]; row_keys.len()];
        {
            let row_index: HashMap<&[String], usize> = row_keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.as_slice(), i))
                .collect();
            let col_index: HashMap<&str, usize> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| (c.as_str(), i))
                .collect();
            for (key, column, candidate) in observations {
                let (Some(&r), Some(&c)) =
                    (row_index.get(key.as_slice()), col_index.get(column.as_str()))
                else {
                    continue;
                };
                seen[r][c].insert(candidate);
            }
        }

        let rows: Vec<PivotRow> = row_keys
            .iter()
            .zip(&seen)
            .map(|(key, sets)| {
                let cells: Vec<usize> = sets.iter().map(BTreeSet::len).collect();
                let total = cells.iter().sum();
                PivotRow {
                    key: key.clone(),
                    cells,
                    total,
                }
            })
            .collect();

        let totals: Vec<usize> = (0..columns.len())
            .map(|c| rows.iter().map(|r| r.cells[c]).sum::<usize>())
            .collect();
        let grand_total = totals.iter().sum();

        PivotTable {
            title: title.to_string(),
            row_levels: row_levels.iter().map(|s| s.to_string()).collect(),
            columns,
            rows,
            totals,
            grand_total,
        }
    }

    /// True when no candidate was counted
    pub fn is_empty(&self) -> bool {
        self.grand_total == 0
    }

    pub fn row(&self, key: &[&str]) -> Option<&PivotRow> {
        self.rows
            .iter()
            .find(|r| r.key.iter().map(String::as_str).eq(key.iter().copied()))
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Which day closes the trailing daily window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowAnchor {
    /// Window ends yesterday; today is excluded
    #[default]
    Today,
    /// Window ends on the filter's end date, inclusive
    EndDate,
}

/// Consecutive calendar days ending on `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub end: NaiveDate,
    pub days: u32,
}

impl DayWindow {
    pub fn resolve(anchor: WindowAnchor, days: u32, today: NaiveDate, filter_end: NaiveDate) -> Self {
        let end = match anchor {
            WindowAnchor::Today => today - Duration::days(1),
            WindowAnchor::EndDate => filter_end,
        };
        DayWindow { end, days }
    }

    pub fn start(&self) -> NaiveDate {
        self.end - Duration::days(i64::from(self.days.saturating_sub(1)))
    }

    /// Days in ascending order
    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.days)
            .rev()
            .map(|back| self.end - Duration::days(i64::from(back)))
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days > 0 && date >= self.start() && date <= self.end
    }

    /// Column header for a day, e.g. `May_03`
    pub fn column(date: NaiveDate) -> String {
        date.format("%b_%d").to_string()
    }

    fn columns(&self) -> Vec<String> {
        self.dates().into_iter().map(Self::column).collect()
    }
}

/// Known CEFR levels in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CefrLevels {
    levels: Vec<String>,
}

impl CefrLevels {
    pub fn new<S: AsRef<str>>(levels: &[S]) -> Self {
        CefrLevels {
            levels: levels
                .iter()
                .map(|l| l.as_ref().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Category of a CEFR cell: a known level, `Others`, or `No CEFR`
    pub fn categorize(&self, cefr: Option<&str>) -> String {
        let Some(value) = cefr.map(str::trim).filter(|v| !v.is_empty()) else {
            return NO_CEFR.to_string();
        };
        self.levels
            .iter()
            .find(|l| l.eq_ignore_ascii_case(value))
            .cloned()
            .unwrap_or_else(|| OTHER_CEFR.to_string())
    }

    /// Row order: levels, then `Others`, then `No CEFR`
    pub fn categories(&self) -> Vec<String> {
        let mut all = self.levels.clone();
        all.push(OTHER_CEFR.to_string());
        all.push(NO_CEFR.to_string());
        all
    }

    fn rank(&self, category: &str) -> usize {
        let known = self.levels.len();
        match self.levels.iter().position(|l| l == category) {
            Some(i) => i,
            None if category == OTHER_CEFR => known,
            None if category == NO_CEFR => known + 1,
            None => usize::MAX,
        }
    }
}

impl Default for CefrLevels {
    fn default() -> Self {
        CefrLevels::new(&["A1", "A2", "B1", "B2", "C1", "C2"])
    }
}

fn labeled<'a, 'c>(
    classified: &'a [ClassifiedCandidate<'c>],
) -> impl Iterator<Item = (&'a ClassifiedCandidate<'c>, RowLabel)> {
    classified.iter().filter_map(|c| c.label.map(|l| (c, l)))
}

/// Day of the latest activity when it falls inside the window
fn day_in(candidate: &ClassifiedCandidate<'_>, window: &DayWindow) -> Option<NaiveDate> {
    let day = candidate.latest_at.date();
    window.contains(day).then_some(day)
}

/// Label × age band
pub fn label_by_band(classified: &[ClassifiedCandidate<'_>]) -> PivotTable {
    PivotTable::build(
        "TALENTPOOL BREAKDOWN",
        &["Row_label"],
        RowLabel::ALL
            .iter()
            .map(|l| vec![l.as_str().to_string()])
            .collect(),
        AgeBand::ALL.iter().map(|b| b.as_str().to_string()).collect(),
        labeled(classified).map(|(c, label)| {
            (
                vec![label.as_str().to_string()],
                c.band.as_str().to_string(),
                c.candidate_id(),
            )
        }),
    )
}

/// Label × calendar day of latest activity
pub fn label_by_day(classified: &[ClassifiedCandidate<'_>], window: &DayWindow) -> PivotTable {
    PivotTable::build(
        "TALENTPOOL BREAKDOWN (Daily)",
        &["Row_label"],
        RowLabel::ALL
            .iter()
            .map(|l| vec![l.as_str().to_string()])
            .collect(),
        window.columns(),
        labeled(classified).filter_map(|(c, label)| {
            let day = day_in(c, window)?;
            Some((
                vec![label.as_str().to_string()],
                DayWindow::column(day),
                c.candidate_id(),
            ))
        }),
    )
}

/// CEFR category × day for one label's candidates
pub fn cefr_by_day(
    classified: &[ClassifiedCandidate<'_>],
    label: RowLabel,
    levels: &CefrLevels,
    window: &DayWindow,
) -> PivotTable {
    PivotTable::build(
        &format!("CEFR BREAKDOWN (Daily): {}", label.as_str()),
        &["CEFR"],
        levels.categories().into_iter().map(|c| vec![c]).collect(),
        window.columns(),
        labeled(classified)
            .filter(|(_, l)| *l == label)
            .filter_map(|(c, _)| {
                let day = day_in(c, window)?;
                Some((
                    vec![levels.categorize(c.latest.cefr.as_deref())],
                    DayWindow::column(day),
                    c.candidate_id(),
                ))
            }),
    )
}

/// (Rejection reason, CEFR category) × day for waterfall candidates
///
/// Only observed (reason, CEFR) pairs are listed, reasons ascending.
pub fn reason_cefr_by_day<'c>(
    classified: &[ClassifiedCandidate<'c>],
    levels: &CefrLevels,
    window: &DayWindow,
) -> PivotTable {
    let observations: Vec<(Vec<String>, String, &'c str)> = labeled(classified)
        .filter(|(_, l)| *l == RowLabel::RejectedForWaterfall)
        .filter_map(|(c, _)| {
            let day = day_in(c, window)?;
            let reason = c.latest.failed_reason.clone()?;
            let key = vec![reason, levels.categorize(c.latest.cefr.as_deref())];
            Some((key, DayWindow::column(day), c.latest.candidate_id.as_str()))
        })
        .collect();

    let mut row_keys: Vec<Vec<String>> = observations
        .iter()
        .map(|(key, _, _)| key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    row_keys.sort_by(|a, b| {
        a[0].cmp(&b[0])
            .then_with(|| levels.rank(&a[1]).cmp(&levels.rank(&b[1])))
    });

    PivotTable::build(
        "REJECTED (FOR WATERFALL) BY REASON AND CEFR (Daily)",
        &["FAILED_REASON", "CEFR"],
        row_keys,
        window.columns(),
        observations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, LabelRules};
    use crate::events::ActivityEvent;
    use crate::folders::FolderCatalog;
    use crate::testing::{at, day, event, rejected, with_cefr};

    fn classified<'a>(events: &'a [ActivityEvent], now: &str) -> Vec<ClassifiedCandidate<'a>> {
        let refs: Vec<&ActivityEvent> = events.iter().collect();
        classify(
            &refs,
            &FolderCatalog::standard(),
            &LabelRules::default(),
            at(now),
        )
    }

    fn sample() -> Vec<ActivityEvent> {
        vec![
            // new, 0 days old
            event("n1", "2024-06-10 08:00", "Passed MQ", "Talent Pool"),
            // new, 2 days old
            with_cefr(
                event("n2", "2024-06-08 08:00", "Passed MQ", "Talent Pool"),
                "b2",
            ),
            // databank, 5 days old
            event("d1", "2024-06-05 08:00", "Talent Pool", "Candidate Databank"),
            // rejected, 40 days old
            event("r1", "2024-04-30 08:00", "Talent Pool", "Acme Wave"),
            rejected(
                event("r1", "2024-05-01 08:00", "Acme Wave", "Talent Pool"),
                "No show",
            ),
            // rejected, 1 day old
            event("r2", "2024-06-08 09:00", "Talent Pool", "Beta Wave"),
            with_cefr(
                rejected(
                    event("r2", "2024-06-09 09:00", "Beta Wave", "Talent Pool"),
                    "Failed assessment",
                ),
                "C1",
            ),
            // unlabeled
            event("u1", "2024-06-09 08:00", "Inbox", "Completed"),
        ]
    }

    #[test]
    fn test_label_by_band_counts_and_totals() {
        let events = sample();
        let table = label_by_band(&classified(&events, "2024-06-10 12:00"));

        assert_eq!(table.columns.len(), 6);
        assert_eq!(table.rows.len(), 3);
        let new = table.row(&["New (for endorsement)"]).unwrap();
        assert_eq!(new.cells, vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(new.total, 2);
        let rejected = table.row(&["Rejected (for waterfall)"]).unwrap();
        assert_eq!(rejected.cells, vec![0, 1, 0, 0, 0, 1]);
        let databank = table
            .row(&["Candidate Databank (in Cooling Period)"])
            .unwrap();
        assert_eq!(databank.cells, vec![0, 0, 1, 0, 0, 0]);

        assert_eq!(table.totals, vec![1, 2, 1, 0, 0, 1]);
        assert_eq!(table.grand_total, 5);
        for row in &table.rows {
            assert_eq!(row.cells.iter().sum::<usize>(), row.total);
        }
    }

    #[test]
    fn test_empty_categories_show_zero() {
        let events = vec![event("n1", "2024-06-10 08:00", "Passed MQ", "Talent Pool")];
        let table = label_by_band(&classified(&events, "2024-06-10 12:00"));
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.row(&["Candidate Databank (in Cooling Period)"])
                .unwrap()
                .total,
            0
        );
        assert_eq!(table.grand_total, 1);
    }

    #[test]
    fn test_day_window() {
        let window = DayWindow::resolve(
            WindowAnchor::Today,
            7,
            day("2024-06-10"),
            day("2024-06-30"),
        );
        assert_eq!(window.end, day("2024-06-09"));
        assert_eq!(window.start(), day("2024-06-03"));
        assert_eq!(window.dates().len(), 7);
        assert!(!window.contains(day("2024-06-10")));
        assert!(window.contains(day("2024-06-03")));
        assert!(!window.contains(day("2024-06-02")));
        assert_eq!(DayWindow::column(day("2024-06-03")), "Jun_03");

        let anchored = DayWindow::resolve(
            WindowAnchor::EndDate,
            8,
            day("2024-06-10"),
            day("2024-05-31"),
        );
        assert_eq!(anchored.end, day("2024-05-31"));
        assert_eq!(anchored.start(), day("2024-05-24"));
    }

    #[test]
    fn test_label_by_day_excludes_today() {
        let events = sample();
        let window = DayWindow::resolve(
            WindowAnchor::Today,
            7,
            day("2024-06-10"),
            day("2024-06-10"),
        );
        let table = label_by_day(&classified(&events, "2024-06-10 12:00"), &window);
        assert_eq!(table.columns.first().unwrap(), "Jun_03");
        assert_eq!(table.columns.last().unwrap(), "Jun_09");

        let new = table.row(&["New (for endorsement)"]).unwrap();
        assert_eq!(new.total, 1, "today's activity is outside the window");
        let jun_08 = table.column_index("Jun_08").unwrap();
        assert_eq!(new.cells[jun_08], 1);
        assert_eq!(table.grand_total, 3);
    }

    #[test]
    fn test_empty_window_table() {
        let events = sample();
        let window = DayWindow::resolve(
            WindowAnchor::EndDate,
            7,
            day("2024-06-10"),
            day("2024-01-31"),
        );
        let table = label_by_day(&classified(&events, "2024-06-10 12:00"), &window);
        assert!(table.is_empty());
    }

    #[test]
    fn test_cefr_categories() {
        let levels = CefrLevels::default();
        assert_eq!(levels.categorize(Some(" b1 ")), "B1");
        assert_eq!(levels.categorize(Some("Native")), OTHER_CEFR);
        assert_eq!(levels.categorize(Some("  ")), NO_CEFR);
        assert_eq!(levels.categorize(None), NO_CEFR);
        let categories = levels.categories();
        assert_eq!(categories.len(), 8);
        assert_eq!(categories[6], OTHER_CEFR);
        assert_eq!(categories[7], NO_CEFR);
        for (i, category) in categories.iter().enumerate() {
            assert_eq!(levels.rank(category), i);
        }
        assert_eq!(levels.rank("Z9"), usize::MAX);
    }

    #[test]
    fn test_cefr_by_day() {
        let events = sample();
        let window = DayWindow::resolve(
            WindowAnchor::Today,
            7,
            day("2024-06-10"),
            day("2024-06-10"),
        );
        let table = cefr_by_day(
            &classified(&events, "2024-06-10 12:00"),
            RowLabel::NewForEndorsement,
            &CefrLevels::default(),
            &window,
        );
        assert_eq!(table.rows.len(), 8);
        assert_eq!(table.row(&["B2"]).unwrap().total, 1);
        assert_eq!(table.row(&[NO_CEFR]).unwrap().total, 0);
        assert_eq!(table.grand_total, 1);
    }

    #[test]
    fn test_reason_cefr_by_day() {
        let events = sample();
        let window = DayWindow::resolve(
            WindowAnchor::EndDate,
            60,
            day("2024-06-10"),
            day("2024-06-10"),
        );
        let table = reason_cefr_by_day(
            &classified(&events, "2024-06-10 12:00"),
            &CefrLevels::default(),
            &window,
        );
        assert_eq!(table.row_levels, vec!["FAILED_REASON", "CEFR"]);
        let keys: Vec<Vec<String>> = table.rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                vec!["Failed assessment".to_string(), "C1".to_string()],
                vec!["No show".to_string(), NO_CEFR.to_string()],
            ]
        );
        assert_eq!(table.grand_total, 2);
        assert_eq!(table.columns.len(), 60);
    }

    #[test]
    fn test_build_drops_unlisted_keys() {
        let table = PivotTable::build(
            "t",
            &["k"],
            vec![vec!["a".to_string()]],
            vec!["x".to_string()],
            vec![
                (vec!["a".to_string()], "x".to_string(), "c1"),
                (vec!["a".to_string()], "x".to_string(), "c1"),
                (vec!["a".to_string()], "y".to_string(), "c2"),
                (vec!["b".to_string()], "x".to_string(), "c3"),
            ],
        );
        assert_eq!(table.rows[0].cells, vec![1]);
        assert_eq!(table.grand_total, 1);
    }
}
