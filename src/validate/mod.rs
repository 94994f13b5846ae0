//! The Validator: a pure predicate set over a transformed RecordSet.
//!
//! All rules are always evaluated (no short-circuit), so one pass
//! surfaces every violation. The report is terminal: it is never
//! retried or mutated, and the Loader only runs if every rule passed.
//!
//! Rule families, in report order:
//! 1. `no_null_critical_fields` - the dataset's critical numeric
//!    columns contain no nulls/NaN after transformation.
//! 2. `row_count_consistency` - the row count still equals the count
//!    captured at extraction time.
//! 3. `category_membership` - every label-valued and flag-valued
//!    derived column stays inside its declared codomain.
//! 4. `code_range` - every encoded column's codes stay inside the
//!    declared mapping range.

use serde::Serialize;

use crate::dataset::DatasetSpec;
use crate::record::RecordSet;
use crate::transform::rules::{Codomain, RuleKind};

/// Outcome of a single validation rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub passed: bool,
    pub detail: String,
}

/// Exhaustive, ordered list of rule outcomes from one validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    outcomes: Vec<RuleOutcome>,
}

impl ValidationReport {
    fn push(&mut self, rule: &str, passed: bool, detail: String) {
        self.outcomes.push(RuleOutcome {
            rule: rule.to_string(),
            passed,
            detail,
        });
    }

    /// True iff every rule passed. This is the Load gate.
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// The failing outcomes only.
    pub fn failures(&self) -> Vec<&RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for outcome in &self.outcomes {
            let mark = if outcome.passed { "PASS" } else { "FAIL" };
            writeln!(f, "[{}] {}: {}", mark, outcome.rule, outcome.detail)?;
        }
        Ok(())
    }
}

/// Run every validation rule against a transformed RecordSet.
///
/// Never mutates the input.
pub fn validate(t: &RecordSet, spec: &DatasetSpec) -> ValidationReport {
    let mut report = ValidationReport {
        outcomes: Vec::new(),
    };

    check_critical_nulls(t, spec, &mut report);
    check_row_count(t, &mut report);
    check_category_membership(t, spec, &mut report);
    check_code_range(t, spec, &mut report);

    report
}

/// Rule 1: no nulls/NaN in the critical numeric columns.
fn check_critical_nulls(t: &RecordSet, spec: &DatasetSpec, report: &mut ValidationReport) {
    let mut offending = Vec::new();
    for name in &spec.critical {
        let nulls = match t.column(name) {
            Some(cells) => cells.filter(|c| c.is_missing()).count(),
            None => {
                offending.push(format!("{name} (column missing)"));
                continue;
            }
        };
        if nulls > 0 {
            offending.push(format!("{name} ({nulls} nulls)"));
        }
    }
    if offending.is_empty() {
        report.push(
            "no_null_critical_fields",
            true,
            format!("no nulls in {:?}", spec.critical),
        );
    } else {
        report.push(
            "no_null_critical_fields",
            false,
            offending.join(", "),
        );
    }
}

/// Rule 2: row count equals the extraction baseline.
fn check_row_count(t: &RecordSet, report: &mut ValidationReport) {
    let passed = t.len() == t.source_rows();
    report.push(
        "row_count_consistency",
        passed,
        format!("{} rows, baseline {}", t.len(), t.source_rows()),
    );
}

/// Rule 3: label and flag columns stay inside their codomain.
fn check_category_membership(t: &RecordSet, spec: &DatasetSpec, report: &mut ValidationReport) {
    let mut offending = Vec::new();
    for rule in &spec.rules {
        if matches!(rule.kind, RuleKind::Encode { .. }) {
            continue; // covered by code_range
        }
        count_violations(t, &rule.name, &rule.codomain(), &mut offending);
    }
    if offending.is_empty() {
        report.push(
            "category_membership",
            true,
            "all derived values inside their codomain".to_string(),
        );
    } else {
        report.push("category_membership", false, offending.join(", "));
    }
}

/// Rule 4: encoded columns stay inside the declared code set.
fn check_code_range(t: &RecordSet, spec: &DatasetSpec, report: &mut ValidationReport) {
    let mut offending = Vec::new();
    for rule in &spec.rules {
        if !matches!(rule.kind, RuleKind::Encode { .. }) {
            continue;
        }
        count_violations(t, &rule.name, &rule.codomain(), &mut offending);
    }
    if offending.is_empty() {
        report.push(
            "code_range",
            true,
            "all codes inside their declared range".to_string(),
        );
    } else {
        report.push("code_range", false, offending.join(", "));
    }
}

fn count_violations(t: &RecordSet, column: &str, codomain: &Codomain, offending: &mut Vec<String>) {
    match t.column(column) {
        Some(cells) => {
            let bad = cells.filter(|c| !codomain.contains(c)).count();
            if bad > 0 {
                offending.push(format!("{column} ({bad} values outside codomain)"));
            }
        }
        None => offending.push(format!("{column} (column missing)")),
    }
}
