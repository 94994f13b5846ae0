//! The Transformer: type coercion, missing-value imputation, and
//! ordered feature derivation.
//!
//! `transform` is a pure function from one [`RecordSet`] to a
//! replacement RecordSet:
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌──────────┐
//! │  coerce to │───▶│   impute   │───▶│  derive    │───▶│  drop id │
//! │ declared   │    │  missing   │    │  features  │    │  columns │
//! │ types      │    │  values    │    │  in order  │    │          │
//! └────────────┘    └────────────┘    └────────────┘    └──────────┘
//! ```
//!
//! Invariants:
//! - Row count is preserved; rows are never dropped.
//! - A value that cannot be coerced becomes missing and follows the
//!   imputation policy, not a hard failure.
//! - Numeric nulls are imputed with the column median (0 if the whole
//!   column is null) *before* any rule reads the column; categorical
//!   nulls become the explicit [`UNKNOWN_CATEGORY`].
//! - Rules run in declaration order, so later rules may read
//!   earlier-derived columns.
//! - An `Encode` rule hitting an unmapped category aborts the whole
//!   transform with [`TransformError::ImputationPolicy`].

pub mod rules;

use tracing::debug;

use crate::dataset::{DatasetSpec, SemanticType};
use crate::error::{TransformError, TransformResult};
use crate::record::{Cell, RecordSet};

/// Explicit category assigned to missing categorical values.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Apply coercion, imputation, and the dataset's feature rules.
///
/// The output carries the input's extraction baseline so the Validator
/// can audit the row count.
pub fn transform(raw: &RecordSet, spec: &DatasetSpec) -> TransformResult<RecordSet> {
    let mut columns: Vec<String> = raw.columns().to_vec();
    let mut rows: Vec<Vec<Cell>> = raw.rows().map(|r| r.to_vec()).collect();

    // 1 + 2: coerce and impute each declared column that is present.
    // Columns already dropped by an earlier transform pass are skipped,
    // which is what makes a second application a no-op.
    for column in &spec.columns {
        let Some(idx) = columns.iter().position(|c| c == &column.name) else {
            continue;
        };
        for row in rows.iter_mut() {
            row[idx] = coerce(&row[idx], column.ty);
        }
        impute_column(&mut rows, idx, column.ty);
    }

    // 3: derive features in declaration order.
    for rule in &spec.rules {
        let input_idx = match columns.iter().position(|c| c == rule.input()) {
            Some(idx) => idx,
            // The input was dropped by an earlier pass. Derived columns
            // are stable once computed, so if the output is already
            // there the rule has nothing left to do.
            None if columns.iter().any(|c| c == &rule.name) => continue,
            None => {
                return Err(TransformError::UnknownColumn {
                    rule: rule.name.clone(),
                    column: rule.input().to_string(),
                })
            }
        };

        let mut derived = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            derived.push(rule.apply(&row[input_idx])?);
        }

        match columns.iter().position(|c| c == &rule.name) {
            // Re-derivation of a stable column (idempotent re-run).
            Some(existing) => {
                for (row, cell) in rows.iter_mut().zip(derived) {
                    row[existing] = cell;
                }
            }
            None => {
                columns.push(rule.name.clone());
                for (row, cell) in rows.iter_mut().zip(derived) {
                    row.push(cell);
                }
            }
        }
        debug!(rule = %rule.name, "derived feature column");
    }

    // 4: drop identifier-like columns.
    for name in &spec.drop {
        if let Some(idx) = columns.iter().position(|c| c == name) {
            columns.remove(idx);
            for row in rows.iter_mut() {
                row.remove(idx);
            }
        }
    }

    Ok(RecordSet::with_baseline(columns, rows, raw.source_rows()))
}

/// Coerce one cell to its declared semantic type.
///
/// Anything uncoercible becomes `Null` and is handled by imputation.
fn coerce(cell: &Cell, ty: SemanticType) -> Cell {
    match ty {
        SemanticType::Integer => match cell {
            Cell::Int(i) => Cell::Int(*i),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Cell::Int(*f as i64),
            Cell::Bool(b) => Cell::Int(*b as i64),
            Cell::Str(s) => match s.trim().parse::<i64>() {
                Ok(i) => Cell::Int(i),
                Err(_) => match s.trim().parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => Cell::Int(f as i64),
                    _ => Cell::Null,
                },
            },
            _ => Cell::Null,
        },
        SemanticType::Float => match cell {
            Cell::Float(f) if f.is_finite() => Cell::Float(*f),
            Cell::Int(i) => Cell::Float(*i as f64),
            Cell::Str(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Cell::Float(f),
                _ => Cell::Null,
            },
            _ => Cell::Null,
        },
        SemanticType::Category => match cell {
            Cell::Str(s) if !s.trim().is_empty() => Cell::Str(s.trim().to_string()),
            Cell::Int(i) => Cell::Str(i.to_string()),
            Cell::Float(f) if f.is_finite() => Cell::Str(f.to_string()),
            Cell::Bool(b) => Cell::Str(if *b { "Yes" } else { "No" }.to_string()),
            _ => Cell::Null,
        },
        SemanticType::Boolean => match cell {
            Cell::Bool(b) => Cell::Bool(*b),
            Cell::Int(0) => Cell::Bool(false),
            Cell::Int(1) => Cell::Bool(true),
            Cell::Str(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "true" | "1" => Cell::Bool(true),
                "no" | "false" | "0" => Cell::Bool(false),
                _ => Cell::Null,
            },
            _ => Cell::Null,
        },
    }
}

/// Fill missing values in one coerced column.
fn impute_column(rows: &mut [Vec<Cell>], idx: usize, ty: SemanticType) {
    match ty {
        SemanticType::Integer | SemanticType::Float => {
            let median = column_median(rows, idx).unwrap_or(0.0);
            let fill = match ty {
                SemanticType::Integer => Cell::Int(median.round() as i64),
                _ => Cell::Float(median),
            };
            for row in rows.iter_mut() {
                if row[idx].is_missing() {
                    row[idx] = fill.clone();
                }
            }
        }
        SemanticType::Category => {
            for row in rows.iter_mut() {
                if row[idx].is_missing() {
                    row[idx] = Cell::Str(UNKNOWN_CATEGORY.to_string());
                }
            }
        }
        SemanticType::Boolean => {
            for row in rows.iter_mut() {
                if row[idx].is_missing() {
                    row[idx] = Cell::Bool(false);
                }
            }
        }
    }
}

/// Median of the non-missing values in a column.
fn column_median(rows: &[Vec<Cell>], idx: usize) -> Option<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| r[idx].as_f64()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
