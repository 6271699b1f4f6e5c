//! Run configuration and its up-front validation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rand_chacha::ChaCha8Rng;

use rowforge_core::{Error, Schema, TypeTag, Value};

use crate::eval::{eval_predicate, EvalContext, Row};
use crate::realistic::RealisticProvider;

/// Scope key that applies a setting to every table.
pub const GLOBAL_SCOPE: &str = "global";

/// How a column's values are produced when a mapping is configured.
#[derive(Clone)]
pub enum ColumnMapping {
    /// Named realistic-generator key resolved against the provider.
    Provider(String),
    /// User-supplied sampler closure: `(rng, row_index) -> value`.
    Custom(Arc<dyn Fn(&mut ChaCha8Rng, u64) -> Value + Send + Sync>),
}

impl fmt::Debug for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnMapping::Provider(key) => f.debug_tuple("Provider").field(key).finish(),
            ColumnMapping::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Generation options. Per-table settings win over `global` ones.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Default rows per table.
    pub num_rows: u64,
    /// Per-table row count overrides.
    pub num_rows_per_table: HashMap<String, u64>,
    /// scope -> column -> allowed values; constrains the column's sampler.
    pub predefined_values: HashMap<String, HashMap<String, Vec<Value>>>,
    /// scope -> column -> mapping.
    pub column_type_mappings: HashMap<String, HashMap<String, ColumnMapping>>,
    /// Enable fuzzy-matching column names to realistic generators.
    pub guess_column_type_mappings: bool,
    /// Similarity threshold (0-100) for fuzzy matching.
    pub threshold_for_guessing: u8,
    /// Deterministic seed; a random one is drawn when absent.
    pub seed: Option<u64>,
    /// K1: per-column resamples before domain narrowing.
    pub max_attempts_per_row: u32,
    /// K2: narrowed-domain resamples before widening.
    pub max_attempts_per_value: u32,
    /// K3: total candidate budget multiplier per table.
    pub max_total_attempt_multiplier: u32,
    /// Frozen CURRENT_DATE; defaults to the process-start date.
    pub run_date: Option<NaiveDate>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            num_rows: 10,
            num_rows_per_table: HashMap::new(),
            predefined_values: HashMap::new(),
            column_type_mappings: HashMap::new(),
            guess_column_type_mappings: false,
            threshold_for_guessing: 80,
            seed: None,
            max_attempts_per_row: 20,
            max_attempts_per_value: 10,
            max_total_attempt_multiplier: 3,
            run_date: None,
        }
    }
}

impl GenerateConfig {
    pub fn rows_for(&self, table: &str) -> u64 {
        self.num_rows_per_table
            .get(table)
            .copied()
            .unwrap_or(self.num_rows)
    }

    /// Two-level lookup: the table scope wins over `global`.
    pub fn predefined_for(&self, table: &str, column: &str) -> Option<&Vec<Value>> {
        self.predefined_values
            .get(table)
            .and_then(|columns| columns.get(column))
            .or_else(|| {
                self.predefined_values
                    .get(GLOBAL_SCOPE)
                    .and_then(|columns| columns.get(column))
            })
    }

    /// Two-level lookup: the table scope wins over `global`.
    pub fn mapping_for(&self, table: &str, column: &str) -> Option<&ColumnMapping> {
        self.column_type_mappings
            .get(table)
            .and_then(|columns| columns.get(column))
            .or_else(|| {
                self.column_type_mappings
                    .get(GLOBAL_SCOPE)
                    .and_then(|columns| columns.get(column))
            })
    }

    /// Validate the configuration against the schema before any
    /// generation starts. Reports the offending column on failure.
    pub fn validate(
        &self,
        schema: &Schema,
        provider: &dyn RealisticProvider,
    ) -> Result<(), Error> {
        if self.threshold_for_guessing > 100 {
            return Err(Error::Config(format!(
                "threshold_for_guessing must be 0-100, got {}",
                self.threshold_for_guessing
            )));
        }
        if self.max_attempts_per_row == 0
            || self.max_attempts_per_value == 0
            || self.max_total_attempt_multiplier == 0
        {
            return Err(Error::Config(
                "attempt budgets must be at least 1".to_string(),
            ));
        }

        for table in self.num_rows_per_table.keys() {
            if schema.table(table).is_none() {
                return Err(Error::Config(format!(
                    "num_rows_per_table references unknown table {table}"
                )));
            }
        }

        for (scope, columns) in &self.predefined_values {
            self.validate_scope(schema, scope, columns.keys())?;
            for (column, values) in columns {
                if values.is_empty() {
                    return Err(Error::Config(format!(
                        "predefined_values for {scope}.{column} is empty"
                    )));
                }
                self.validate_predefined(schema, scope, column, values)?;
            }
        }

        for (scope, columns) in &self.column_type_mappings {
            self.validate_scope(schema, scope, columns.keys())?;
            for (column, mapping) in columns {
                if let ColumnMapping::Provider(key) = mapping {
                    if !provider.keys().contains(&key.as_str()) {
                        return Err(Error::Config(format!(
                            "column_type_mappings for {scope}.{column} names unknown generator '{key}'"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_scope<'a>(
        &self,
        schema: &Schema,
        scope: &str,
        columns: impl Iterator<Item = &'a String>,
    ) -> Result<(), Error> {
        if scope == GLOBAL_SCOPE {
            for column in columns {
                let known = schema
                    .tables
                    .values()
                    .any(|table| table.has_column(column));
                if !known {
                    return Err(Error::Config(format!(
                        "global setting references column {column} that no table declares"
                    )));
                }
            }
            return Ok(());
        }
        let table = schema
            .table(scope)
            .ok_or_else(|| Error::Config(format!("unknown table scope {scope}")))?;
        for column in columns {
            if !table.has_column(column) {
                return Err(Error::Config(format!(
                    "setting references unknown column {scope}.{column}"
                )));
            }
        }
        Ok(())
    }

    /// Predefined values must fit the column type and not violate any
    /// single-column CHECK on it.
    fn validate_predefined(
        &self,
        schema: &Schema,
        scope: &str,
        column: &str,
        values: &[Value],
    ) -> Result<(), Error> {
        let tables: Vec<&str> = if scope == GLOBAL_SCOPE {
            schema
                .tables
                .values()
                .filter(|table| table.has_column(column))
                .map(|table| table.name.as_str())
                .collect()
        } else {
            vec![scope]
        };

        for table_name in tables {
            let table = schema.table(table_name).expect("scope validated");
            let Some(column_def) = table.column(column) else {
                continue;
            };
            for value in values {
                if !value_fits_type(value, &column_def.type_tag) {
                    return Err(Error::Config(format!(
                        "predefined value {value:?} does not fit type of {table_name}.{column}"
                    )));
                }
                let mut row = Row::new();
                row.insert(column.to_string(), value.clone());
                let run_date = self.run_date.unwrap_or_else(today);
                let ctx = EvalContext::new(&row, run_date);
                for check in table.checks() {
                    let mentioned = check.expr.columns();
                    if mentioned.len() != 1 || !mentioned.contains(column) {
                        continue;
                    }
                    if !eval_predicate(&check.expr, &ctx).passes() {
                        return Err(Error::Config(format!(
                            "predefined value {value:?} for {table_name}.{column} violates CHECK ({})",
                            check.expr
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn value_fits_type(value: &Value, type_tag: &TypeTag) -> bool {
    match (value, type_tag) {
        (Value::Null, _) => true,
        (Value::Int(_), TypeTag::Integer | TypeTag::Serial | TypeTag::Decimal { .. }) => true,
        (Value::Decimal(_), TypeTag::Decimal { .. }) => true,
        (Value::Text(text), TypeTag::Enum(labels)) => labels.iter().any(|label| label == text),
        (
            Value::Text(_),
            TypeTag::Varchar(_) | TypeTag::Char(_) | TypeTag::Text | TypeTag::Opaque(_),
        ) => true,
        (Value::Bool(_), TypeTag::Boolean) => true,
        (Value::Date(_), TypeTag::Date) => true,
        (Value::Time(_), TypeTag::Time) => true,
        (Value::Timestamp(_), TypeTag::Timestamp) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realistic::BuiltinProvider;
    use rowforge_parse::parse_ddl;

    fn schema() -> Schema {
        parse_ddl(
            "CREATE TABLE t (age INT CHECK (age >= 18), name VARCHAR(30), \
             country VARCHAR(10) CHECK (country IN ('A', 'B')));",
        )
        .expect("parses")
        .schema
    }

    #[test]
    fn per_table_predefined_wins_over_global() {
        let mut config = GenerateConfig::default();
        config
            .predefined_values
            .entry(GLOBAL_SCOPE.to_string())
            .or_default()
            .insert("name".to_string(), vec![Value::Text("global".into())]);
        config
            .predefined_values
            .entry("t".to_string())
            .or_default()
            .insert("name".to_string(), vec![Value::Text("scoped".into())]);

        let resolved = config.predefined_for("t", "name").expect("resolved");
        assert_eq!(resolved, &vec![Value::Text("scoped".into())]);
    }

    #[test]
    fn predefined_value_violating_check_is_config_error() {
        let mut config = GenerateConfig::default();
        config
            .predefined_values
            .entry("t".to_string())
            .or_default()
            .insert("age".to_string(), vec![Value::Int(12)]);

        let err = config
            .validate(&schema(), &BuiltinProvider)
            .expect_err("underage predefined value fails");
        assert!(matches!(err, Error::Config(message) if message.contains("age")));
    }

    #[test]
    fn predefined_subset_of_enum_is_allowed() {
        let mut config = GenerateConfig::default();
        config
            .predefined_values
            .entry("t".to_string())
            .or_default()
            .insert("country".to_string(), vec![Value::Text("A".into())]);

        config
            .validate(&schema(), &BuiltinProvider)
            .expect("legal subset validates");
    }

    #[test]
    fn unknown_scope_and_generator_are_rejected() {
        let mut config = GenerateConfig::default();
        config
            .predefined_values
            .entry("missing".to_string())
            .or_default()
            .insert("age".to_string(), vec![Value::Int(20)]);
        assert!(config.validate(&schema(), &BuiltinProvider).is_err());

        let mut config = GenerateConfig::default();
        config
            .column_type_mappings
            .entry("t".to_string())
            .or_default()
            .insert(
                "name".to_string(),
                ColumnMapping::Provider("no_such_generator".to_string()),
            );
        assert!(config.validate(&schema(), &BuiltinProvider).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut config = GenerateConfig::default();
        config
            .predefined_values
            .entry("t".to_string())
            .or_default()
            .insert("age".to_string(), vec![Value::Text("twenty".into())]);
        assert!(config.validate(&schema(), &BuiltinProvider).is_err());
    }
}
