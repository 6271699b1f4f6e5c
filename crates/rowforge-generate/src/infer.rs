//! Column-to-sampler resolution.
//!
//! Precedence: user predefined values (validated up front), then the
//! CHECK/ENUM-derived value set, then an explicit user mapping, then a
//! fuzzy match against the realistic-generator registry, then the typed
//! fallback sampler.

use std::sync::Arc;

use chrono::NaiveDate;

use rowforge_core::{ColumnDef, TableDef, TypeTag};

use crate::config::{ColumnMapping, GenerateConfig};
use crate::domain::ValueDomain;
use crate::realistic::RealisticProvider;
use crate::sampler::{
    sampler_for_domain, EnumSampler, FnSampler, RealisticSampler, Sampler, TypeFit,
};

/// Resolve the sampler for one column.
pub fn resolve_sampler(
    table: &TableDef,
    column: &ColumnDef,
    domain: &ValueDomain,
    config: &GenerateConfig,
    provider: &Arc<dyn RealisticProvider>,
    run_date: NaiveDate,
) -> Arc<dyn Sampler> {
    if let Some(values) = config.predefined_for(&table.name, &column.name) {
        return Arc::new(EnumSampler::new(values.clone()));
    }

    if let Some(values) = &domain.enum_values {
        return Arc::new(EnumSampler::new(values.clone()));
    }

    if let Some(mapping) = config.mapping_for(&table.name, &column.name) {
        match mapping {
            ColumnMapping::Provider(key) => {
                return Arc::new(RealisticSampler::new(
                    Arc::clone(provider),
                    key.clone(),
                    type_fit(column, domain, run_date),
                ));
            }
            ColumnMapping::Custom(func) => {
                return Arc::new(FnSampler::new(Arc::clone(func)));
            }
        }
    }

    if config.guess_column_type_mappings && fit_supports_realistic(column) {
        if let Some(key) = fuzzy_match(&column.name, provider, config.threshold_for_guessing) {
            return Arc::new(RealisticSampler::new(
                Arc::clone(provider),
                key,
                type_fit(column, domain, run_date),
            ));
        }
    }

    sampler_for_domain(column, domain, run_date)
}

/// Best provider key for a column name, scored 0-100; `None` below the
/// threshold.
pub fn fuzzy_match(
    column: &str,
    provider: &Arc<dyn RealisticProvider>,
    threshold: u8,
) -> Option<String> {
    let normalized = column.to_lowercase();
    let mut best: Option<(&'static str, u8)> = None;
    for key in provider.keys() {
        let score = similarity_score(&normalized, key);
        let better = match best {
            None => true,
            Some((_, best_score)) => score > best_score,
        };
        if better {
            best = Some((key, score));
        }
    }
    best.filter(|(_, score)| *score >= threshold)
        .map(|(key, _)| key.to_string())
}

/// Symmetric similarity scaled to 0-100.
pub fn similarity_score(a: &str, b: &str) -> u8 {
    (strsim::jaro_winkler(a, b) * 100.0).round() as u8
}

fn fit_supports_realistic(column: &ColumnDef) -> bool {
    matches!(
        column.type_tag,
        TypeTag::Integer
            | TypeTag::Decimal { .. }
            | TypeTag::Date
            | TypeTag::Varchar(_)
            | TypeTag::Char(_)
            | TypeTag::Text
            | TypeTag::Opaque(_)
    )
}

fn type_fit(column: &ColumnDef, domain: &ValueDomain, run_date: NaiveDate) -> TypeFit {
    match &column.type_tag {
        TypeTag::Integer => {
            let min = domain
                .min
                .as_ref()
                .and_then(rowforge_core::Value::as_i64)
                .unwrap_or(0);
            let max = domain
                .max
                .as_ref()
                .and_then(rowforge_core::Value::as_i64)
                .unwrap_or(i32::MAX as i64);
            TypeFit::Int { min, max }
        }
        TypeTag::Decimal { scale, .. } => TypeFit::Decimal { scale: *scale },
        TypeTag::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
            let min = domain
                .min
                .as_ref()
                .and_then(rowforge_core::Value::as_date)
                .unwrap_or(epoch);
            let max = domain
                .max
                .as_ref()
                .and_then(rowforge_core::Value::as_date)
                .unwrap_or(run_date);
            TypeFit::Date { min, max }
        }
        _ => TypeFit::Text {
            max_length: domain.max_length,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extract_domain;
    use crate::realistic::BuiltinProvider;
    use crate::sampler::SampleContext;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rowforge_core::Value;
    use rowforge_parse::parse_ddl;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn provider() -> Arc<dyn RealisticProvider> {
        Arc::new(BuiltinProvider)
    }

    fn sample_once(sampler: &Arc<dyn Sampler>) -> Value {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = SampleContext {
            rng: &mut rng,
            row_index: 0,
        };
        sampler.sample(&mut ctx)
    }

    #[test]
    fn exact_name_scores_full_marks() {
        assert_eq!(similarity_score("email", "email"), 100);
        assert!(similarity_score("email_address", "email") >= 80);
        assert!(similarity_score("quantity", "email") < 60);
    }

    #[test]
    fn fuzzy_match_respects_threshold() {
        let provider = provider();
        assert_eq!(
            fuzzy_match("user_email", &provider, 80),
            Some("email".to_string())
        );
        assert_eq!(fuzzy_match("zzzz", &provider, 80), None);
    }

    #[test]
    fn enum_domain_wins_over_guessing() {
        let outcome = parse_ddl(
            "CREATE TABLE t (country VARCHAR(20) CHECK (country IN ('A', 'B')));",
        )
        .expect("parses");
        let table = outcome.schema.table("t").expect("table");
        let column = table.column("country").expect("column");
        let domain = extract_domain(table, column, run_date());
        let mut config = GenerateConfig::default();
        config.guess_column_type_mappings = true;

        let sampler = resolve_sampler(table, column, &domain, &config, &provider(), run_date());
        for _ in 0..10 {
            let value = sample_once(&sampler);
            let text = value.as_str().expect("text").to_string();
            assert!(["A", "B"].contains(&text.as_str()));
        }
    }

    #[test]
    fn guessed_generator_respects_varchar_bound() {
        let outcome = parse_ddl("CREATE TABLE t (city VARCHAR(6));").expect("parses");
        let table = outcome.schema.table("t").expect("table");
        let column = table.column("city").expect("column");
        let domain = extract_domain(table, column, run_date());
        let mut config = GenerateConfig::default();
        config.guess_column_type_mappings = true;

        let sampler = resolve_sampler(table, column, &domain, &config, &provider(), run_date());
        for _ in 0..10 {
            let value = sample_once(&sampler);
            assert!(value.as_str().expect("text").chars().count() <= 6);
        }
    }

    #[test]
    fn custom_mapping_is_used() {
        let outcome = parse_ddl("CREATE TABLE t (tag VARCHAR(10));").expect("parses");
        let table = outcome.schema.table("t").expect("table");
        let column = table.column("tag").expect("column");
        let domain = extract_domain(table, column, run_date());
        let mut config = GenerateConfig::default();
        config
            .column_type_mappings
            .entry("t".to_string())
            .or_default()
            .insert(
                "tag".to_string(),
                ColumnMapping::Custom(Arc::new(|_, row_index| {
                    Value::Text(format!("tag-{row_index}"))
                })),
            );

        let sampler = resolve_sampler(table, column, &domain, &config, &provider(), run_date());
        assert_eq!(sample_once(&sampler), Value::Text("tag-0".to_string()));
    }
}
