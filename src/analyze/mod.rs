//! Descriptive aggregation over the validated RecordSet.
//!
//! The Analyzer is a pure consumer: the core pipeline guarantees it a
//! schema-stable dataset with no nulls in the critical fields, and it
//! emits tabular reports (a `metric,value` summary and a crosstab
//! CSV). It never feeds anything back into the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::dataset::DatasetSpec;
use crate::record::RecordSet;

/// One summary metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub metric: String,
    pub value: f64,
}

/// Share of rows (in percent) where `column` equals `positive`,
/// compared case-insensitively. None if the column is missing or empty.
pub fn rate_percentage(t: &RecordSet, column: &str, positive: &str) -> Option<f64> {
    let cells = t.column(column)?;
    let mut total = 0usize;
    let mut hits = 0usize;
    for cell in cells {
        total += 1;
        if cell
            .as_str()
            .map(|s| s.eq_ignore_ascii_case(positive))
            .unwrap_or(false)
        {
            hits += 1;
        }
    }
    if total == 0 {
        return None;
    }
    Some(hits as f64 / total as f64 * 100.0)
}

/// Mean of `value_col` grouped by `group_col`, sorted by group label.
pub fn group_mean(t: &RecordSet, group_col: &str, value_col: &str) -> Vec<(String, f64)> {
    let (Some(group_idx), Some(value_idx)) =
        (t.column_index(group_col), t.column_index(value_col))
    else {
        return Vec::new();
    };

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in t.rows() {
        let group = &row[group_idx];
        if group.is_missing() {
            continue;
        }
        let Some(value) = row[value_idx].as_f64() else {
            continue;
        };
        let entry = sums.entry(group.to_string()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

/// Occurrence counts of each value in a column, sorted by count
/// descending, then label.
pub fn value_counts(t: &RecordSet, column: &str) -> Vec<(String, usize)> {
    let Some(cells) = t.column(column) else {
        return Vec::new();
    };
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for cell in cells {
        *counts.entry(cell.to_string()).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// A two-way frequency table.
#[derive(Debug)]
pub struct Crosstab {
    pub row_column: String,
    pub col_column: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// counts[row][col]
    pub counts: Vec<Vec<usize>>,
}

impl Crosstab {
    pub fn count(&self, row_label: &str, col_label: &str) -> Option<usize> {
        let r = self.row_labels.iter().position(|l| l == row_label)?;
        let c = self.col_labels.iter().position(|l| l == col_label)?;
        Some(self.counts[r][c])
    }

    /// Write the crosstab as CSV: first column holds the row labels.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec![self.row_column.clone()];
        header.extend(self.col_labels.iter().cloned());
        writer.write_record(&header)?;
        for (label, row) in self.row_labels.iter().zip(&self.counts) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|n| n.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Cross-tabulate two categorical columns.
pub fn crosstab(t: &RecordSet, row_col: &str, col_col: &str) -> Option<Crosstab> {
    let row_idx = t.column_index(row_col)?;
    let col_idx = t.column_index(col_col)?;

    let mut table: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    let mut col_labels: BTreeMap<String, ()> = BTreeMap::new();
    for row in t.rows() {
        let r = row[row_idx].to_string();
        let c = row[col_idx].to_string();
        col_labels.insert(c.clone(), ());
        *table.entry(r).or_default().entry(c).or_default() += 1;
    }

    let col_labels: Vec<String> = col_labels.into_keys().collect();
    let row_labels: Vec<String> = table.keys().cloned().collect();
    let counts = row_labels
        .iter()
        .map(|r| {
            col_labels
                .iter()
                .map(|c| table[r].get(c).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Some(Crosstab {
        row_column: row_col.to_string(),
        col_column: col_col.to_string(),
        row_labels,
        col_labels,
        counts,
    })
}

/// Build the summary metric list for a dataset.
pub fn summarize(t: &RecordSet, spec: &DatasetSpec) -> Vec<MetricRow> {
    match spec.name.as_str() {
        "titanic" => summarize_titanic(t),
        _ => summarize_telco(t),
    }
}

/// The churn-vs-segment crosstab for a dataset, if its columns exist.
pub fn pivot(t: &RecordSet, spec: &DatasetSpec) -> Option<Crosstab> {
    match spec.name.as_str() {
        "titanic" => crosstab(t, "age_group", "survived"),
        _ => crosstab(t, "tenure_group", "churn"),
    }
}

fn summarize_telco(t: &RecordSet) -> Vec<MetricRow> {
    let mut summary = Vec::new();

    if let Some(pct) = rate_percentage(t, "churn", "yes") {
        summary.push(MetricRow {
            metric: "churn_percentage".into(),
            value: pct,
        });
    }
    for (contract, mean) in group_mean(t, "contract", "monthlycharges") {
        summary.push(MetricRow {
            metric: format!("avg_monthlycharges_{contract}"),
            value: mean,
        });
    }
    for (group, count) in value_counts(t, "tenure_group") {
        summary.push(MetricRow {
            metric: format!("tenure_group_{group}_count"),
            value: count as f64,
        });
    }
    for (service, count) in value_counts(t, "internetservice") {
        summary.push(MetricRow {
            metric: format!("internet_{service}_count"),
            value: count as f64,
        });
    }

    summary
}

fn summarize_titanic(t: &RecordSet) -> Vec<MetricRow> {
    let mut summary = Vec::new();

    if let Some(cells) = t.column("survived") {
        let values: Vec<f64> = cells.filter_map(|c| c.as_f64()).collect();
        if !values.is_empty() {
            summary.push(MetricRow {
                metric: "survival_percentage".into(),
                value: values.iter().sum::<f64>() / values.len() as f64 * 100.0,
            });
        }
    }
    for (class, mean) in group_mean(t, "pclass", "fare") {
        summary.push(MetricRow {
            metric: format!("avg_fare_class_{class}"),
            value: mean,
        });
    }
    for (group, count) in value_counts(t, "age_group") {
        summary.push(MetricRow {
            metric: format!("age_group_{group}_count"),
            value: count as f64,
        });
    }

    summary
}

/// Write the summary metric list as a `metric,value` CSV.
pub fn write_summary_csv<P: AsRef<Path>>(path: P, summary: &[MetricRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["metric", "value"])?;
    for row in summary {
        writer.write_record([row.metric.as_str(), &row.value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
