use serde::Serialize;

use super::repository::{GroupCount, MonthlyDecisions};

/// Percentage share of confirmed students per group, ready for charting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShareBreakdown {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ShareBreakdown {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationView {
    pub title: &'static str,
    pub year_level: ShareBreakdown,
    pub degree_program: ShareBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptancePoint {
    pub date: String,
    pub confirmed: u64,
    pub rejected: u64,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptanceVisualization {
    pub title: &'static str,
    pub date_labels: Vec<String>,
    pub acceptance_rates: Vec<f64>,
}

/// Chart label for a year level; students without one are grouped as "Unassigned".
pub fn year_level_label(year_level: Option<u8>) -> String {
    match year_level {
        Some(level) => format!("{level} Year"),
        None => "Unassigned".to_string(),
    }
}

/// Chart label for a degree program; missing or blank programs are grouped as "Unassigned".
pub fn degree_program_label(program: Option<&str>) -> String {
    match program {
        Some(program) if !program.trim().is_empty() => program.to_string(),
        _ => "Unassigned".to_string(),
    }
}

fn total<K>(counts: &[GroupCount<K>]) -> u64 {
    counts.iter().map(|group| group.count).sum()
}

/// Shares are taken against `total`; a zero total yields an empty breakdown.
pub fn share_breakdown<K, F>(counts: &[GroupCount<K>], total: u64, label: F) -> ShareBreakdown
where
    F: Fn(&K) -> String,
{
    if total == 0 {
        return ShareBreakdown::default();
    }

    let (labels, values) = counts
        .iter()
        .map(|group| {
            (
                label(&group.key),
                group.count as f64 / total as f64 * 100.0,
            )
        })
        .unzip();

    ShareBreakdown { labels, values }
}

pub fn year_level_breakdown(counts: &[GroupCount<Option<u8>>]) -> ShareBreakdown {
    share_breakdown(counts, total(counts), |level| year_level_label(*level))
}

pub fn degree_program_breakdown(counts: &[GroupCount<Option<String>>]) -> ShareBreakdown {
    share_breakdown(counts, total(counts), |program| {
        degree_program_label(program.as_deref())
    })
}

/// Both charts share the year-level total as their denominator.
pub fn visualization(
    year_levels: &[GroupCount<Option<u8>>],
    degree_programs: &[GroupCount<Option<String>>],
) -> VisualizationView {
    let confirmed = total(year_levels);
    if confirmed == 0 {
        return VisualizationView {
            title: "Data Visualization",
            year_level: ShareBreakdown::default(),
            degree_program: ShareBreakdown::default(),
        };
    }

    VisualizationView {
        title: "Data Visualization (Confirmed Students)",
        year_level: share_breakdown(year_levels, confirmed, |level| year_level_label(*level)),
        degree_program: share_breakdown(degree_programs, confirmed, |program| {
            degree_program_label(program.as_deref())
        }),
    }
}

pub fn acceptance_series(months: Vec<MonthlyDecisions>) -> Vec<AcceptancePoint> {
    months
        .into_iter()
        .filter(|month| month.confirmed + month.rejected > 0)
        .map(|month| {
            let decided = (month.confirmed + month.rejected) as f64;
            AcceptancePoint {
                acceptance_rate: month.confirmed as f64 / decided * 100.0,
                date: month.date,
                confirmed: month.confirmed,
                rejected: month.rejected,
            }
        })
        .collect()
}

pub fn acceptance_visualization(series: &[AcceptancePoint]) -> AcceptanceVisualization {
    AcceptanceVisualization {
        title: "Acceptance Rate Visualization",
        date_labels: series.iter().map(|point| point.date.clone()).collect(),
        acceptance_rates: series.iter().map(|point| point.acceptance_rate).collect(),
    }
}
