use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use rowforge_core::Value;
use rowforge_generate::output::{write_csv_dir, write_json_dir, write_sql_file};
use rowforge_generate::{
    generate_from_ddl, ColumnMapping, Filler, GenerateConfig, GenerationError, GLOBAL_SCOPE,
};

const SHOP_DDL: &str = r#"
CREATE TABLE customers (
    customer_id SERIAL PRIMARY KEY,
    email VARCHAR(60) NOT NULL UNIQUE,
    city VARCHAR(40)
);

CREATE TABLE orders (
    order_id SERIAL PRIMARY KEY,
    customer_id INT NOT NULL REFERENCES customers(customer_id),
    total DECIMAL(8, 2) CHECK (total >= 0),
    note VARCHAR(80)
);
"#;

fn base_config() -> GenerateConfig {
    GenerateConfig {
        num_rows: 12,
        seed: Some(42),
        run_date: NaiveDate::from_ymd_opt(2024, 6, 15),
        ..GenerateConfig::default()
    }
}

#[test]
fn all_three_export_modes_write_files() {
    let result = generate_from_ddl(SHOP_DDL, &base_config()).expect("generates");
    let dir = tempfile::tempdir().expect("tempdir");

    let sql_path = dir.path().join("dump.sql");
    write_sql_file(&sql_path, &result.data).expect("sql export");
    let script = std::fs::read_to_string(&sql_path).expect("readable");
    assert!(script.contains("INSERT INTO customers"));
    assert!(script.contains("INSERT INTO orders"));
    assert!(script.ends_with('\n'));
    // Parents before children in the script.
    assert!(
        script.find("INSERT INTO customers").unwrap()
            < script.find("INSERT INTO orders").unwrap()
    );

    let csv_dir = dir.path().join("csv");
    write_csv_dir(&csv_dir, &result.data).expect("csv export");
    let customers_csv =
        std::fs::read_to_string(csv_dir.join("customers.csv")).expect("customers csv");
    assert!(customers_csv.starts_with("customer_id,email,city\n"));
    assert_eq!(customers_csv.lines().count(), 13, "header plus twelve rows");

    let json_dir = dir.path().join("json");
    write_json_dir(&json_dir, &result.data).expect("json export");
    let orders_json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(json_dir.join("orders.json")).expect("orders json"),
    )
    .expect("valid json");
    let rows = orders_json.as_array().expect("array of objects");
    assert_eq!(rows.len(), 12);
    for row in rows {
        let total = &row["total"];
        assert!(
            total.is_string() || total.is_null(),
            "decimals must export as strings, got {total}"
        );
    }
}

#[test]
fn cancelled_run_yields_no_output() {
    let outcome = rowforge_parse::parse_ddl(SHOP_DDL).expect("parses");
    let config = base_config();
    let flag = Arc::new(AtomicBool::new(true));
    let filler = Filler::new(&outcome.schema, &config).with_cancel_flag(Arc::clone(&flag));
    match filler.run() {
        Err(GenerationError::Core(rowforge_core::Error::Cancelled)) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[test]
fn predefined_values_constrain_the_sampler() {
    let mut config = base_config();
    config
        .predefined_values
        .entry("customers".to_string())
        .or_default()
        .insert(
            "city".to_string(),
            vec![
                Value::Text("Lisbon".to_string()),
                Value::Text("Porto".to_string()),
            ],
        );

    let result = generate_from_ddl(SHOP_DDL, &config).expect("generates");
    let customers = result.data.table("customers").expect("generated");
    for row in &customers.rows {
        let city = row.get("city").and_then(Value::as_str).expect("city set");
        assert!(["Lisbon", "Porto"].contains(&city));
    }
}

#[test]
fn global_mapping_applies_to_matching_columns() {
    let mut config = base_config();
    config
        .column_type_mappings
        .entry(GLOBAL_SCOPE.to_string())
        .or_default()
        .insert(
            "note".to_string(),
            ColumnMapping::Custom(Arc::new(|_, row_index| {
                Value::Text(format!("note-{row_index}"))
            })),
        );

    let result = generate_from_ddl(SHOP_DDL, &config).expect("generates");
    let orders = result.data.table("orders").expect("generated");
    assert!(orders
        .rows
        .iter()
        .any(|row| matches!(row.get("note"), Some(Value::Text(text)) if text.starts_with("note-"))));
}

#[test]
fn fuzzy_guessing_produces_realistic_emails() {
    let mut config = base_config();
    config.guess_column_type_mappings = true;
    config.threshold_for_guessing = 80;

    let result = generate_from_ddl(SHOP_DDL, &config).expect("generates");
    let customers = result.data.table("customers").expect("generated");
    for row in &customers.rows {
        let email = row.get("email").and_then(Value::as_str).expect("email set");
        assert!(email.contains('@'), "guessed email '{email}' looks wrong");
        assert!(email.len() <= 60);
    }
}

#[test]
fn injected_provider_replaces_the_builtin() {
    struct FixedProvider;

    impl rowforge_generate::RealisticProvider for FixedProvider {
        fn keys(&self) -> Vec<&'static str> {
            vec!["email", "city"]
        }

        fn generate(
            &self,
            key: &str,
            _rng: &mut rand_chacha::ChaCha8Rng,
        ) -> Option<String> {
            match key {
                "email" => Some("fixed@provider.test".to_string()),
                "city" => Some("Fixedville".to_string()),
                _ => None,
            }
        }
    }

    let outcome = rowforge_parse::parse_ddl("CREATE TABLE t (city VARCHAR(20));")
        .expect("parses");
    let mut config = base_config();
    config.guess_column_type_mappings = true;
    let filler = Filler::new(&outcome.schema, &config).with_provider(Arc::new(FixedProvider));
    let result = filler.run().expect("generates");

    let table = result.data.table("t").expect("generated");
    assert!(table
        .rows
        .iter()
        .any(|row| matches!(row.get("city"), Some(Value::Text(text)) if text == "Fixedville")));
}

#[test]
fn named_provider_mapping_is_used() {
    let mut config = base_config();
    config
        .column_type_mappings
        .entry("customers".to_string())
        .or_default()
        .insert(
            "city".to_string(),
            ColumnMapping::Provider("country".to_string()),
        );

    let result = generate_from_ddl(SHOP_DDL, &config).expect("generates");
    let customers = result.data.table("customers").expect("generated");
    for row in &customers.rows {
        let city = row.get("city").expect("column present");
        if let Value::Text(text) = city {
            assert!(!text.is_empty());
            assert!(text.len() <= 40);
        }
    }
}
