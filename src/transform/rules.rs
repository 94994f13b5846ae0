//! Feature derivation rules.
//!
//! A [`FeatureRule`] is a named, deterministic derivation of one output
//! column from one input column. Every rule has a fixed, enumerable
//! codomain, which is what lets the Validator check membership after
//! the fact.

use crate::error::TransformError;
use crate::record::Cell;

/// A named derivation `(input column) -> output column`.
#[derive(Debug, Clone)]
pub struct FeatureRule {
    /// Name of the derived output column.
    pub name: String,
    pub kind: RuleKind,
}

/// The derivation applied by a rule.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Numeric thresholds to labels, e.g. tenure -> tenure_group.
    Bucket {
        input: String,
        thresholds: Vec<Threshold>,
        /// Label for values above every threshold.
        fallback: String,
    },

    /// 1 iff the categorical value is in the member set.
    MemberFlag { input: String, members: Vec<String> },

    /// 1 iff the categorical value equals the literal.
    EqualsFlag { input: String, value: String },

    /// 1 iff the categorical value is not the imputed "Unknown".
    PresentFlag { input: String },

    /// Total category -> integer code mapping. An unmapped category is
    /// a fatal error, never a silent default.
    Encode {
        input: String,
        mapping: Vec<(String, i64)>,
    },
}

/// One bucket boundary: values at or below (or strictly below) the
/// limit take the label.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub limit: f64,
    pub inclusive: bool,
    pub label: String,
}

impl Threshold {
    pub fn at_most(limit: f64, label: impl Into<String>) -> Self {
        Self {
            limit,
            inclusive: true,
            label: label.into(),
        }
    }

    pub fn below(limit: f64, label: impl Into<String>) -> Self {
        Self {
            limit,
            inclusive: false,
            label: label.into(),
        }
    }

    fn matches(&self, value: f64) -> bool {
        if self.inclusive {
            value <= self.limit
        } else {
            value < self.limit
        }
    }
}

/// The enumerable value set a derived column is allowed to take.
#[derive(Debug, Clone, PartialEq)]
pub enum Codomain {
    Labels(Vec<String>),
    Codes(Vec<i64>),
}

impl Codomain {
    /// Whether a cell value belongs to this codomain.
    pub fn contains(&self, cell: &Cell) -> bool {
        match (self, cell) {
            (Codomain::Labels(labels), Cell::Str(s)) => labels.iter().any(|l| l == s),
            (Codomain::Codes(codes), Cell::Int(i)) => codes.contains(i),
            _ => false,
        }
    }
}

impl FeatureRule {
    /// Column this rule reads.
    pub fn input(&self) -> &str {
        match &self.kind {
            RuleKind::Bucket { input, .. }
            | RuleKind::MemberFlag { input, .. }
            | RuleKind::EqualsFlag { input, .. }
            | RuleKind::PresentFlag { input }
            | RuleKind::Encode { input, .. } => input,
        }
    }

    /// The declared value set of the derived column.
    pub fn codomain(&self) -> Codomain {
        match &self.kind {
            RuleKind::Bucket {
                thresholds,
                fallback,
                ..
            } => {
                let mut labels: Vec<String> = thresholds.iter().map(|t| t.label.clone()).collect();
                labels.push(fallback.clone());
                labels.dedup();
                Codomain::Labels(labels)
            }
            RuleKind::MemberFlag { .. }
            | RuleKind::EqualsFlag { .. }
            | RuleKind::PresentFlag { .. } => Codomain::Codes(vec![0, 1]),
            RuleKind::Encode { mapping, .. } => {
                let mut codes: Vec<i64> = mapping.iter().map(|(_, c)| *c).collect();
                codes.sort_unstable();
                codes.dedup();
                Codomain::Codes(codes)
            }
        }
    }

    /// Apply the rule to one input cell.
    ///
    /// Total over coerced and imputed input. The only failure mode is
    /// an `Encode` hitting a category missing from its mapping table.
    pub fn apply(&self, cell: &Cell) -> Result<Cell, TransformError> {
        match &self.kind {
            RuleKind::Bucket {
                thresholds,
                fallback,
                ..
            } => {
                let value = cell.as_f64().unwrap_or(0.0);
                let label = thresholds
                    .iter()
                    .find(|t| t.matches(value))
                    .map(|t| t.label.as_str())
                    .unwrap_or(fallback);
                Ok(Cell::Str(label.to_string()))
            }
            RuleKind::MemberFlag { members, .. } => {
                let hit = cell
                    .as_str()
                    .map(|s| members.iter().any(|m| m == s))
                    .unwrap_or(false);
                Ok(Cell::Int(hit as i64))
            }
            RuleKind::EqualsFlag { value, .. } => {
                let hit = cell.as_str().map(|s| s == value).unwrap_or(false);
                Ok(Cell::Int(hit as i64))
            }
            RuleKind::PresentFlag { .. } => {
                let present = cell
                    .as_str()
                    .map(|s| s != crate::transform::UNKNOWN_CATEGORY)
                    .unwrap_or(false);
                Ok(Cell::Int(present as i64))
            }
            RuleKind::Encode { input, mapping } => {
                let raw = cell.as_str().unwrap_or("");
                mapping
                    .iter()
                    .find(|(cat, _)| cat == raw)
                    .map(|(_, code)| Cell::Int(*code))
                    .ok_or_else(|| TransformError::ImputationPolicy {
                        rule: self.name.clone(),
                        column: input.clone(),
                        value: raw.to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenure_group() -> FeatureRule {
        FeatureRule {
            name: "tenure_group".into(),
            kind: RuleKind::Bucket {
                input: "tenure".into(),
                thresholds: vec![
                    Threshold::at_most(12.0, "New"),
                    Threshold::at_most(36.0, "Regular"),
                    Threshold::at_most(60.0, "Loyal"),
                ],
                fallback: "Champion".into(),
            },
        }
    }

    fn contract_code() -> FeatureRule {
        FeatureRule {
            name: "contract_type_code".into(),
            kind: RuleKind::Encode {
                input: "contract".into(),
                mapping: vec![
                    ("Month-to-month".into(), 0),
                    ("One year".into(), 1),
                    ("Two year".into(), 2),
                ],
            },
        }
    }

    #[test]
    fn test_bucket_boundaries() {
        let rule = tenure_group();
        assert_eq!(rule.apply(&Cell::Int(12)).unwrap(), Cell::Str("New".into()));
        assert_eq!(
            rule.apply(&Cell::Int(13)).unwrap(),
            Cell::Str("Regular".into())
        );
        assert_eq!(
            rule.apply(&Cell::Int(61)).unwrap(),
            Cell::Str("Champion".into())
        );
    }

    #[test]
    fn test_bucket_exclusive_threshold() {
        let rule = FeatureRule {
            name: "monthly_charge_segment".into(),
            kind: RuleKind::Bucket {
                input: "monthlycharges".into(),
                thresholds: vec![
                    Threshold::below(30.0, "Low"),
                    Threshold::at_most(70.0, "Medium"),
                ],
                fallback: "High".into(),
            },
        };
        assert_eq!(
            rule.apply(&Cell::Float(29.99)).unwrap(),
            Cell::Str("Low".into())
        );
        assert_eq!(
            rule.apply(&Cell::Float(30.0)).unwrap(),
            Cell::Str("Medium".into())
        );
        assert_eq!(
            rule.apply(&Cell::Float(70.01)).unwrap(),
            Cell::Str("High".into())
        );
    }

    #[test]
    fn test_encode_total_mapping() {
        let rule = contract_code();
        assert_eq!(
            rule.apply(&Cell::Str("One year".into())).unwrap(),
            Cell::Int(1)
        );
    }

    #[test]
    fn test_encode_unmapped_is_fatal() {
        let rule = contract_code();
        let err = rule.apply(&Cell::Str("Three year".into())).unwrap_err();
        assert!(err.to_string().contains("Three year"));
    }

    #[test]
    fn test_flags() {
        let member = FeatureRule {
            name: "has_internet_service".into(),
            kind: RuleKind::MemberFlag {
                input: "internetservice".into(),
                members: vec!["DSL".into(), "Fiber optic".into()],
            },
        };
        assert_eq!(member.apply(&Cell::Str("DSL".into())).unwrap(), Cell::Int(1));
        assert_eq!(member.apply(&Cell::Str("No".into())).unwrap(), Cell::Int(0));

        let equals = FeatureRule {
            name: "is_multi_line_user".into(),
            kind: RuleKind::EqualsFlag {
                input: "multiplelines".into(),
                value: "Yes".into(),
            },
        };
        assert_eq!(equals.apply(&Cell::Str("Yes".into())).unwrap(), Cell::Int(1));
        assert_eq!(equals.apply(&Cell::Null).unwrap(), Cell::Int(0));
    }

    #[test]
    fn test_codomains() {
        assert_eq!(
            tenure_group().codomain(),
            Codomain::Labels(vec![
                "New".into(),
                "Regular".into(),
                "Loyal".into(),
                "Champion".into()
            ])
        );
        assert_eq!(contract_code().codomain(), Codomain::Codes(vec![0, 1, 2]));
        assert!(contract_code().codomain().contains(&Cell::Int(2)));
        assert!(!contract_code().codomain().contains(&Cell::Int(3)));
        assert!(!contract_code().codomain().contains(&Cell::Null));
    }
}
