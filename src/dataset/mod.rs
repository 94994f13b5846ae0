//! Built-in dataset specifications.
//!
//! A [`DatasetSpec`] declares everything the pipeline needs to know
//! about one dataset: the expected CSV columns with their semantic
//! types, the critical (never-null-after-transform) numeric columns,
//! the ordered feature rules, the columns dropped after derivation,
//! and the target table name.
//!
//! Two specs ship built in: Telco customer subscriptions and Titanic
//! passengers. Column names are canonicalized to lowercase; extraction
//! matches CSV headers case-insensitively.

use once_cell::sync::Lazy;

use crate::transform::rules::{FeatureRule, RuleKind, Threshold};

/// Declared semantic type of a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Integer,
    Float,
    Category,
    Boolean,
}

/// One expected source column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Canonical (lowercase) column name.
    pub name: String,
    pub ty: SemanticType,
}

impl ColumnSpec {
    fn new(name: &str, ty: SemanticType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Everything the pipeline knows about one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    /// Short name used on the CLI (`telco`, `titanic`).
    pub name: String,
    /// Target table in the external store.
    pub table: String,
    /// Expected source columns. A header missing any of these is a
    /// hard extraction error; extra CSV columns are dropped on read.
    pub columns: Vec<ColumnSpec>,
    /// Numeric columns that must contain no nulls after transform.
    pub critical: Vec<String>,
    /// Feature rules, applied in declaration order.
    pub rules: Vec<FeatureRule>,
    /// Identifier-like columns dropped after derivation.
    pub drop: Vec<String>,
}

impl DatasetSpec {
    /// Look up a built-in spec by CLI name.
    pub fn from_name(name: &str) -> Option<&'static DatasetSpec> {
        match name.to_lowercase().as_str() {
            "telco" => Some(&TELCO),
            "titanic" => Some(&TITANIC),
            _ => None,
        }
    }

    /// Find the column spec for a canonical name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns of the post-transform schema, in order: declared columns
    /// minus dropped ones, then derived columns.
    pub fn output_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !self.drop.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        out.extend(self.rules.iter().map(|r| r.name.clone()));
        out
    }

    /// CREATE TABLE statement for the target table, to be run once in
    /// the store's SQL console.
    pub fn create_table_sql(&self) -> String {
        let mut cols = vec!["    id BIGSERIAL PRIMARY KEY".to_string()];
        for column in self
            .columns
            .iter()
            .filter(|c| !self.drop.contains(&c.name))
        {
            let sql_ty = match column.ty {
                SemanticType::Integer => "INTEGER",
                SemanticType::Float => "DOUBLE PRECISION",
                SemanticType::Category => "TEXT",
                SemanticType::Boolean => "BOOLEAN",
            };
            cols.push(format!("    {} {}", column.name, sql_ty));
        }
        for rule in &self.rules {
            let sql_ty = match rule.codomain() {
                crate::transform::rules::Codomain::Labels(_) => "TEXT",
                crate::transform::rules::Codomain::Codes(_) => "INTEGER",
            };
            cols.push(format!("    {} {}", rule.name, sql_ty));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.table,
            cols.join(",\n")
        )
    }
}

/// Telco customer-subscription dataset.
pub static TELCO: Lazy<DatasetSpec> = Lazy::new(|| DatasetSpec {
    name: "telco".into(),
    table: "telco_customer_churn_features".into(),
    columns: vec![
        ColumnSpec::new("customerid", SemanticType::Category),
        ColumnSpec::new("gender", SemanticType::Category),
        ColumnSpec::new("tenure", SemanticType::Integer),
        ColumnSpec::new("multiplelines", SemanticType::Category),
        ColumnSpec::new("internetservice", SemanticType::Category),
        ColumnSpec::new("contract", SemanticType::Category),
        ColumnSpec::new("paymentmethod", SemanticType::Category),
        ColumnSpec::new("monthlycharges", SemanticType::Float),
        ColumnSpec::new("totalcharges", SemanticType::Float),
        ColumnSpec::new("churn", SemanticType::Category),
    ],
    critical: vec![
        "tenure".into(),
        "monthlycharges".into(),
        "totalcharges".into(),
    ],
    rules: vec![
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
        },
        FeatureRule {
            name: "monthly_charge_segment".into(),
            kind: RuleKind::Bucket {
                input: "monthlycharges".into(),
                thresholds: vec![
                    Threshold::below(30.0, "Low"),
                    Threshold::at_most(70.0, "Medium"),
                ],
                fallback: "High".into(),
            },
        },
        FeatureRule {
            name: "has_internet_service".into(),
            kind: RuleKind::MemberFlag {
                input: "internetservice".into(),
                members: vec!["DSL".into(), "Fiber optic".into()],
            },
        },
        FeatureRule {
            name: "is_multi_line_user".into(),
            kind: RuleKind::EqualsFlag {
                input: "multiplelines".into(),
                value: "Yes".into(),
            },
        },
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
        },
    ],
    drop: vec!["customerid".into(), "gender".into()],
});

/// Titanic passenger dataset.
pub static TITANIC: Lazy<DatasetSpec> = Lazy::new(|| DatasetSpec {
    name: "titanic".into(),
    table: "titanic_passenger_features".into(),
    columns: vec![
        ColumnSpec::new("passengerid", SemanticType::Integer),
        ColumnSpec::new("survived", SemanticType::Integer),
        ColumnSpec::new("pclass", SemanticType::Integer),
        ColumnSpec::new("name", SemanticType::Category),
        ColumnSpec::new("sex", SemanticType::Category),
        ColumnSpec::new("age", SemanticType::Float),
        ColumnSpec::new("sibsp", SemanticType::Integer),
        ColumnSpec::new("parch", SemanticType::Integer),
        ColumnSpec::new("ticket", SemanticType::Category),
        ColumnSpec::new("fare", SemanticType::Float),
        ColumnSpec::new("cabin", SemanticType::Category),
        ColumnSpec::new("embarked", SemanticType::Category),
    ],
    critical: vec!["age".into(), "fare".into()],
    rules: vec![
        FeatureRule {
            name: "age_group".into(),
            kind: RuleKind::Bucket {
                input: "age".into(),
                thresholds: vec![
                    Threshold::at_most(12.0, "Child"),
                    Threshold::at_most(18.0, "Teen"),
                    Threshold::at_most(60.0, "Adult"),
                ],
                fallback: "Senior".into(),
            },
        },
        FeatureRule {
            name: "fare_segment".into(),
            kind: RuleKind::Bucket {
                input: "fare".into(),
                thresholds: vec![
                    Threshold::below(10.0, "Low"),
                    Threshold::at_most(50.0, "Medium"),
                ],
                fallback: "High".into(),
            },
        },
        FeatureRule {
            name: "has_cabin".into(),
            kind: RuleKind::PresentFlag {
                input: "cabin".into(),
            },
        },
        FeatureRule {
            name: "embarked_code".into(),
            // "Unknown" is mapped explicitly: missing embarkation ports
            // exist in the real data and must not abort the run.
            kind: RuleKind::Encode {
                input: "embarked".into(),
                mapping: vec![
                    ("S".into(), 0),
                    ("C".into(), 1),
                    ("Q".into(), 2),
                    ("Unknown".into(), 0),
                ],
            },
        },
    ],
    drop: vec![
        "passengerid".into(),
        "name".into(),
        "ticket".into(),
        "cabin".into(),
    ],
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert!(DatasetSpec::from_name("telco").is_some());
        assert!(DatasetSpec::from_name("Titanic").is_some());
        assert!(DatasetSpec::from_name("housing").is_none());
    }

    #[test]
    fn test_telco_output_schema() {
        let out = TELCO.output_columns();
        assert!(!out.contains(&"customerid".to_string()));
        assert!(!out.contains(&"gender".to_string()));
        assert!(out.contains(&"tenure".to_string()));
        assert!(out.contains(&"contract_type_code".to_string()));
        // declared minus dropped, plus five derived
        assert_eq!(out.len(), 10 - 2 + 5);
    }

    #[test]
    fn test_create_table_sql() {
        let sql = TELCO.create_table_sql();
        assert!(sql.contains("telco_customer_churn_features"));
        assert!(sql.contains("monthlycharges DOUBLE PRECISION"));
        assert!(sql.contains("tenure_group TEXT"));
        assert!(sql.contains("contract_type_code INTEGER"));
        assert!(!sql.contains("customerid"));
    }

    #[test]
    fn test_rule_inputs_exist() {
        for spec in [&*TELCO, &*TITANIC] {
            for rule in &spec.rules {
                assert!(
                    spec.column(rule.input()).is_some(),
                    "rule {} reads undeclared column {}",
                    rule.name,
                    rule.input()
                );
            }
        }
    }
}
