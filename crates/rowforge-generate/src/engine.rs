//! The filler: dependency-aware row generation.
//!
//! Levels run in sequence; groups inside a level run on the rayon pool.
//! Each table draws from its own ChaCha8 stream sub-seeded from the run
//! seed and the table name, so output is reproducible for a fixed seed
//! regardless of worker count.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use rowforge_core::{
    resolve_levels, validate_schema, CheckConstraint, Error, ForeignKey, Schema, TableDef, Value,
};

use crate::config::{today, GenerateConfig};
use crate::domain::{extract_domains, narrowed_domain, ValueDomain};
use crate::errors::GenerationError;
use crate::eval::{eval_predicate, EvalContext, Row};
use crate::infer::resolve_sampler;
use crate::realistic::{BuiltinProvider, RealisticProvider};
use crate::report::{GenerationReport, GenerationWarning, TableReport};
use crate::sampler::{sampler_for_domain, SampleContext, Sampler};

/// Rows committed for one table, in commit order.
#[derive(Debug, Clone, Default)]
pub struct GeneratedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// All committed tables, in generation (topological) order.
#[derive(Debug, Clone, Default)]
pub struct GeneratedData {
    pub tables: IndexMap<String, GeneratedTable>,
}

impl GeneratedData {
    pub fn table(&self, name: &str) -> Option<&GeneratedTable> {
        self.tables.get(name)
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.table(name).map(|table| table.rows.len()).unwrap_or(0)
    }
}

/// Output of a run: the data plus the non-fatal report.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub data: GeneratedData,
    pub report: GenerationReport,
}

/// Dependency-aware row generator.
pub struct Filler<'a> {
    schema: &'a Schema,
    config: &'a GenerateConfig,
    provider: Arc<dyn RealisticProvider>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Filler<'a> {
    pub fn new(schema: &'a Schema, config: &'a GenerateConfig) -> Self {
        Self {
            schema,
            config,
            provider: Arc::new(BuiltinProvider),
            cancel: None,
        }
    }

    /// Swap in a different realistic-string source.
    pub fn with_provider(mut self, provider: Arc<dyn RealisticProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Cooperative cancellation, observed at level boundaries. A
    /// cancelled run yields no output.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(&self) -> Result<RunResult, GenerationError> {
        validate_schema(self.schema)?;
        self.config.validate(self.schema, self.provider.as_ref())?;
        let levels = resolve_levels(self.schema)?;

        let run_date = self.config.run_date.unwrap_or_else(today);
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let domains = extract_domains(self.schema, run_date);

        let mut samplers: HashMap<String, HashMap<String, Arc<dyn Sampler>>> = HashMap::new();
        for (table_name, table) in &self.schema.tables {
            let table_domains = domains.get(table_name).expect("domains cover every table");
            let mut by_column = HashMap::new();
            for column in &table.columns {
                let domain = table_domains
                    .get(&column.name)
                    .expect("domains cover every column");
                by_column.insert(
                    column.name.clone(),
                    resolve_sampler(table, column, domain, self.config, &self.provider, run_date),
                );
            }
            samplers.insert(table_name.clone(), by_column);
        }

        let mut data = GeneratedData::default();
        let mut report = GenerationReport::default();

        for (level_idx, level) in levels.iter().enumerate() {
            if let Some(flag) = &self.cancel {
                if flag.load(AtomicOrdering::Relaxed) {
                    return Err(Error::Cancelled.into());
                }
            }
            info!(level = level_idx, groups = level.groups.len(), "generating level");

            let outputs: Vec<GroupOutput> = level
                .groups
                .par_iter()
                .map(|group| self.generate_group(group, &data, &domains, &samplers, seed, run_date))
                .collect();

            for output in outputs {
                for (name, table) in output.tables {
                    data.tables.insert(name, table);
                }
                report.tables.extend(output.reports);
                report.warnings.extend(output.warnings);
            }
        }

        Ok(RunResult { data, report })
    }

    fn generate_group(
        &self,
        group: &[String],
        committed: &GeneratedData,
        domains: &HashMap<String, HashMap<String, ValueDomain>>,
        samplers: &HashMap<String, HashMap<String, Arc<dyn Sampler>>>,
        seed: u64,
        run_date: NaiveDate,
    ) -> GroupOutput {
        let in_group: HashSet<&str> = if group.len() > 1 {
            group.iter().map(|name| name.as_str()).collect()
        } else {
            HashSet::new()
        };

        let mut local: IndexMap<String, GeneratedTable> = IndexMap::new();
        let mut reports = Vec::new();
        let mut warnings = Vec::new();

        for table_name in group {
            let table = self.schema.table(table_name).expect("scheduled table exists");
            let mut generator = TableGenerator::new(
                table,
                self.config,
                domains.get(table_name).expect("table domains"),
                samplers.get(table_name).expect("table samplers"),
                &in_group,
                committed,
                &local,
                seed,
                run_date,
            );
            let (generated, table_report, table_warnings) = generator.generate();
            local.insert(table_name.clone(), generated);
            reports.push(table_report);
            warnings.extend(table_warnings);
        }

        if group.len() > 1 {
            self.back_patch(group, &mut local, seed, run_date);
        }

        GroupOutput {
            tables: local.into_iter().collect(),
            reports,
            warnings,
        }
    }

    /// Second phase for cyclic groups: fill the in-group FK columns that
    /// were left NULL, drawing from the now-populated siblings. A patch
    /// that would break a CHECK or a unique tuple reverts to NULL.
    fn back_patch(
        &self,
        group: &[String],
        local: &mut IndexMap<String, GeneratedTable>,
        seed: u64,
        run_date: NaiveDate,
    ) {
        // Only edges that were deferred in the first phase need patching:
        // those pointing at a sibling generated later in the group.
        let position: HashMap<&str, usize> = group
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();

        // Snapshot parent key pools before mutating anything.
        let mut pools: HashMap<(String, usize), Vec<Vec<Value>>> = HashMap::new();
        for table_name in group {
            let table = self.schema.table(table_name).expect("group table");
            let child_pos = position[table_name.as_str()];
            for (fk_idx, fk) in table.foreign_keys().enumerate() {
                let deferred = position
                    .get(fk.ref_table.as_str())
                    .map(|&parent_pos| parent_pos > child_pos)
                    .unwrap_or(false);
                if !deferred {
                    continue;
                }
                let parent = local.get(&fk.ref_table).expect("sibling generated");
                pools.insert((table_name.clone(), fk_idx), key_pool(parent, &fk.ref_columns));
            }
        }

        for table_name in group {
            let table = self.schema.table(table_name).expect("group table");
            let checks: Vec<&CheckConstraint> = table.checks().collect();
            let unique_tuples: Vec<Vec<String>> = table
                .unique_tuples()
                .into_iter()
                .map(|tuple| tuple.to_vec())
                .collect();
            let mut rng =
                ChaCha8Rng::seed_from_u64(hash_seed(seed, &format!("{table_name}::patch")));

            for (fk_idx, fk) in table.foreign_keys().enumerate() {
                let Some(pool) = pools.get(&(table_name.clone(), fk_idx)) else {
                    continue;
                };
                if pool.is_empty() {
                    continue;
                }
                let affected_tuples: Vec<&Vec<String>> = unique_tuples
                    .iter()
                    .filter(|tuple| tuple.iter().any(|col| fk.columns.contains(col)))
                    .collect();

                let generated = local.get_mut(table_name).expect("group table generated");
                let mut seen: Vec<HashSet<Vec<Value>>> =
                    affected_tuples.iter().map(|_| HashSet::new()).collect();

                for row in &mut generated.rows {
                    let draw = pool[rng.gen_range(0..pool.len())].clone();
                    let previous: Vec<Value> = fk
                        .columns
                        .iter()
                        .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                        .collect();
                    for (column, value) in fk.columns.iter().zip(draw.iter()) {
                        row.insert(column.clone(), value.clone());
                    }

                    let ctx = EvalContext::new(row, run_date);
                    let mut ok = checks.iter().all(|check| {
                        eval_predicate(&check.expr, &ctx).passes()
                    });
                    if ok {
                        for (tuple, keys) in affected_tuples.iter().zip(seen.iter()) {
                            if let Some(key) = tuple_key(row, tuple) {
                                if keys.contains(&key) {
                                    ok = false;
                                    break;
                                }
                            }
                        }
                    }
                    if !ok {
                        for (column, value) in fk.columns.iter().zip(previous.into_iter()) {
                            row.insert(column.clone(), value);
                        }
                    }
                    for (tuple, keys) in affected_tuples.iter().zip(seen.iter_mut()) {
                        if let Some(key) = tuple_key(row, tuple) {
                            keys.insert(key);
                        }
                    }
                }
            }
        }
    }
}

struct GroupOutput {
    tables: Vec<(String, GeneratedTable)>,
    reports: Vec<TableReport>,
    warnings: Vec<GenerationWarning>,
}

enum FkPool {
    /// Parent committed in an earlier level (or earlier in this group's
    /// first phase): draw uniformly from its keys.
    Fixed(Vec<Vec<Value>>),
    /// Self-referential: draw from this table's own committed rows.
    SelfRef,
    /// In-group cyclic edge: leave NULL now, back-patch later.
    Deferred,
}

struct FkAssignment<'a> {
    fk: &'a ForeignKey,
    pool: FkPool,
}

struct UniqueIndex {
    columns: Vec<String>,
    seen: HashSet<Vec<Value>>,
}

impl UniqueIndex {
    /// Tuple key, or `None` when any member is NULL — NULLs never
    /// collide, per SQL.
    fn key(&self, row: &Row) -> Option<Vec<Value>> {
        tuple_key(row, &self.columns)
    }
}

fn tuple_key(row: &Row, columns: &[String]) -> Option<Vec<Value>> {
    let mut key = Vec::with_capacity(columns.len());
    for column in columns {
        let value = row.get(column)?;
        if value.is_null() {
            return None;
        }
        key.push(value.clone());
    }
    Some(key)
}

struct TableGenerator<'a> {
    table: &'a TableDef,
    config: &'a GenerateConfig,
    domains: &'a HashMap<String, ValueDomain>,
    samplers: &'a HashMap<String, Arc<dyn Sampler>>,
    checks: Vec<&'a CheckConstraint>,
    fk_plan: Vec<FkAssignment<'a>>,
    fk_columns: HashSet<String>,
    serial_columns: HashSet<String>,
    injectable_nulls: HashSet<String>,
    unique_indices: Vec<UniqueIndex>,
    rows: Vec<Row>,
    rng: ChaCha8Rng,
    run_date: NaiveDate,
    recent_failures: VecDeque<String>,
    candidates: u64,
    dropped: u64,
}

impl<'a> TableGenerator<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        table: &'a TableDef,
        config: &'a GenerateConfig,
        domains: &'a HashMap<String, ValueDomain>,
        samplers: &'a HashMap<String, Arc<dyn Sampler>>,
        in_group: &HashSet<&str>,
        committed: &GeneratedData,
        local: &IndexMap<String, GeneratedTable>,
        seed: u64,
        run_date: NaiveDate,
    ) -> Self {
        let mut fk_plan = Vec::new();
        let mut fk_columns = HashSet::new();
        for fk in table.foreign_keys() {
            for column in &fk.columns {
                fk_columns.insert(column.clone());
            }
            let pool = if fk.ref_table == table.name {
                FkPool::SelfRef
            } else if in_group.contains(fk.ref_table.as_str())
                && !local.contains_key(&fk.ref_table)
            {
                // Cyclic sibling not generated yet; the resolver
                // guarantees this edge is nullable.
                FkPool::Deferred
            } else {
                let parent = local
                    .get(&fk.ref_table)
                    .or_else(|| committed.table(&fk.ref_table));
                let keys = parent
                    .map(|table| key_pool(table, &fk.ref_columns))
                    .unwrap_or_default();
                FkPool::Fixed(keys)
            };
            fk_plan.push(FkAssignment { fk, pool });
        }

        let serial_columns: HashSet<String> = table
            .columns
            .iter()
            .filter(|column| column.type_tag.is_serial())
            .map(|column| column.name.clone())
            .collect();

        // Occasional NULLs only where nothing constrains the column:
        // nullable, outside every unique tuple, mentioned by no CHECK,
        // and not under an explicit user mapping.
        let injectable_nulls: HashSet<String> = table
            .columns
            .iter()
            .filter(|column| {
                column.nullable
                    && !table.is_unique_member(&column.name)
                    && table.checks_for(&column.name).next().is_none()
                    && !fk_columns.contains(&column.name)
                    && config.predefined_for(&table.name, &column.name).is_none()
                    && config.mapping_for(&table.name, &column.name).is_none()
            })
            .map(|column| column.name.clone())
            .collect();

        let unique_indices = table
            .unique_tuples()
            .into_iter()
            .map(|tuple| UniqueIndex {
                columns: tuple.to_vec(),
                seen: HashSet::new(),
            })
            .collect();

        Self {
            table,
            config,
            domains,
            samplers,
            checks: table.checks().collect(),
            fk_plan,
            fk_columns,
            serial_columns,
            injectable_nulls,
            unique_indices,
            rows: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(hash_seed(seed, &table.name)),
            run_date,
            recent_failures: VecDeque::new(),
            candidates: 0,
            dropped: 0,
        }
    }

    fn generate(&mut self) -> (GeneratedTable, TableReport, Vec<GenerationWarning>) {
        let requested = self.config.rows_for(&self.table.name);
        let budget =
            requested.saturating_mul(u64::from(self.config.max_total_attempt_multiplier));

        while (self.rows.len() as u64) < requested && self.candidates < budget {
            self.candidates += 1;
            let candidate = self.build_candidate();
            let mut row = match candidate {
                Ok(row) => row,
                Err(reason) => {
                    self.record_drop(reason);
                    continue;
                }
            };
            match self.validate_and_repair(&mut row) {
                Ok(()) => self.commit(row),
                Err(reason) => self.record_drop(reason),
            }
        }

        let produced = self.rows.len() as u64;
        let mut warnings = Vec::new();
        if produced < requested {
            warn!(
                table = %self.table.name,
                produced,
                requested,
                "table underfilled within attempt budget"
            );
            warnings.push(GenerationWarning::UnderfilledTable {
                table: self.table.name.clone(),
                produced,
                requested,
                last_failures: self.recent_failures.iter().cloned().collect(),
            });
        } else {
            debug!(table = %self.table.name, produced, "table complete");
        }

        let generated = GeneratedTable {
            columns: self
                .table
                .columns
                .iter()
                .map(|column| column.name.clone())
                .collect(),
            rows: std::mem::take(&mut self.rows),
        };
        let report = TableReport {
            table: self.table.name.clone(),
            rows_requested: requested,
            rows_generated: produced,
            candidates: self.candidates,
            dropped: self.dropped,
        };
        (generated, report, warnings)
    }

    fn record_drop(&mut self, reason: String) {
        self.dropped += 1;
        if self.recent_failures.len() == 10 {
            self.recent_failures.pop_front();
        }
        self.recent_failures.push_back(reason);
    }

    fn build_candidate(&mut self) -> Result<Row, String> {
        let mut row = Row::new();
        let mut pending_self_fk: Vec<usize> = Vec::new();

        for (idx, assignment) in self.fk_plan.iter().enumerate() {
            let fk = assignment.fk;
            match &assignment.pool {
                FkPool::Deferred => {
                    for column in &fk.columns {
                        row.insert(column.clone(), Value::Null);
                    }
                }
                FkPool::Fixed(pool) => {
                    if pool.is_empty() {
                        return Err(format!(
                            "no parent keys in {} for foreign key ({})",
                            fk.ref_table,
                            fk.columns.join(", ")
                        ));
                    }
                    let tuple = &pool[self.rng.gen_range(0..pool.len())];
                    for (column, value) in fk.columns.iter().zip(tuple.iter()) {
                        row.insert(column.clone(), value.clone());
                    }
                }
                FkPool::SelfRef => {
                    let pool: Vec<Vec<Value>> = self
                        .rows
                        .iter()
                        .filter_map(|committed| tuple_key(committed, &fk.ref_columns))
                        .collect();
                    if pool.is_empty() {
                        let nullable = fk.columns.iter().all(|column| {
                            self.table
                                .column(column)
                                .map(|def| def.nullable)
                                .unwrap_or(true)
                        });
                        if nullable {
                            for column in &fk.columns {
                                row.insert(column.clone(), Value::Null);
                            }
                        } else {
                            // First row points at itself once its own key
                            // values exist.
                            pending_self_fk.push(idx);
                        }
                    } else {
                        let tuple = &pool[self.rng.gen_range(0..pool.len())];
                        for (column, value) in fk.columns.iter().zip(tuple.iter()) {
                            row.insert(column.clone(), value.clone());
                        }
                    }
                }
            }
        }

        let row_index = self.rows.len() as u64;
        for column in &self.table.columns {
            if row.contains_key(&column.name) {
                continue;
            }
            if self.serial_columns.contains(&column.name) {
                row.insert(column.name.clone(), Value::Int(row_index as i64 + 1));
                continue;
            }
            if self.injectable_nulls.contains(&column.name) && self.rng.gen_bool(0.1) {
                row.insert(column.name.clone(), Value::Null);
                continue;
            }
            let value = self.sample_column(&column.name, row_index);
            row.insert(column.name.clone(), value);
        }

        for idx in pending_self_fk {
            let fk = self.fk_plan[idx].fk;
            for (column, ref_column) in fk.columns.iter().zip(fk.ref_columns.iter()) {
                let value = row.get(ref_column).cloned().ok_or_else(|| {
                    format!("self-referential key target {ref_column} missing")
                })?;
                row.insert(column.clone(), value);
            }
        }

        Ok(row)
    }

    fn sample_column(&mut self, column: &str, row_index: u64) -> Value {
        let sampler = self
            .samplers
            .get(column)
            .expect("sampler resolved for every column");
        let mut ctx = SampleContext {
            rng: &mut self.rng,
            row_index,
        };
        sampler.sample(&mut ctx)
    }

    fn validate_and_repair(&mut self, row: &mut Row) -> Result<(), String> {
        // NOT NULL, checks, and uniqueness interact: repairing one can
        // violate another, so alternate a bounded number of times.
        for pass in 0..3 {
            self.enforce_not_null(row)?;
            self.enforce_checks(row)?;
            let resampled = self.enforce_unique(row)?;
            if !resampled && self.not_null_satisfied(row) {
                return Ok(());
            }
            if pass == 2 {
                return Err(
                    "repair oscillated between NOT NULL, checks, and uniqueness".to_string(),
                );
            }
        }
        Ok(())
    }

    fn not_null_satisfied(&self, row: &Row) -> bool {
        self.table.columns.iter().all(|column| {
            column.nullable
                || row
                    .get(&column.name)
                    .map(|value| !value.is_null())
                    .unwrap_or(false)
        })
    }

    /// NOT NULL violations repair like any other violation: resample the
    /// offending column, then retry against a narrowed domain, then give
    /// the row up.
    fn enforce_not_null(&mut self, row: &mut Row) -> Result<(), String> {
        let row_index = self.rows.len() as u64;
        for column in &self.table.columns {
            if column.nullable {
                continue;
            }
            if row
                .get(&column.name)
                .map(|value| !value.is_null())
                .unwrap_or(false)
            {
                continue;
            }
            // Serial values are assigned at candidate construction and
            // cannot be resampled.
            if self.serial_columns.contains(&column.name) {
                return Err(format!("{} is NULL", column.name));
            }
            if self.fk_columns.contains(&column.name) {
                let redrawn = self.redraw_fk_for(row, &column.name);
                if redrawn
                    && row
                        .get(&column.name)
                        .map(|value| !value.is_null())
                        .unwrap_or(false)
                {
                    continue;
                }
                return Err(format!("{} is NULL", column.name));
            }

            let mut repaired = false;
            for _ in 0..self.config.max_attempts_per_row {
                let value = self.sample_column(&column.name, row_index);
                if !value.is_null() {
                    row.insert(column.name.clone(), value);
                    repaired = true;
                    break;
                }
            }
            if !repaired {
                if let Some(base) = self.domains.get(&column.name) {
                    // The failing predicate is nullability itself; narrow
                    // to the non-nullable domain, and clear a degenerate
                    // empty enum set so the typed sampler can produce
                    // values at all.
                    let mut narrowed = base.clone();
                    narrowed.nullable = false;
                    if narrowed
                        .enum_values
                        .as_ref()
                        .map(|values| values.is_empty())
                        .unwrap_or(false)
                    {
                        narrowed.enum_values = None;
                    }
                    let sampler = sampler_for_domain(column, &narrowed, self.run_date);
                    for _ in 0..self.config.max_attempts_per_value {
                        let value = {
                            let mut ctx = SampleContext {
                                rng: &mut self.rng,
                                row_index,
                            };
                            sampler.sample(&mut ctx)
                        };
                        if !value.is_null() {
                            row.insert(column.name.clone(), value);
                            repaired = true;
                            break;
                        }
                    }
                }
            }
            if !repaired {
                return Err(format!("{} is NULL", column.name));
            }
        }
        Ok(())
    }

    fn enforce_checks(&mut self, row: &mut Row) -> Result<(), String> {
        let mut restarts = 0u32;
        'outer: loop {
            for check_idx in 0..self.checks.len() {
                let check = self.checks[check_idx];
                let passes = {
                    let ctx = EvalContext::new(row, self.run_date);
                    eval_predicate(&check.expr, &ctx).passes()
                };
                if passes {
                    continue;
                }
                if !self.repair_check(row, check) {
                    return Err(format!("CHECK ({}) failed", check.expr));
                }
                restarts += 1;
                if restarts > self.config.max_attempts_per_row {
                    return Err(format!("CHECK ({}) kept failing after repair", check.expr));
                }
                continue 'outer;
            }
            return Ok(());
        }
    }

    /// Repair one failing predicate. Targets the lexicographically-last
    /// referenced column first, then widens to the others.
    fn repair_check(&mut self, row: &mut Row, check: &CheckConstraint) -> bool {
        let mut columns: Vec<String> = check
            .expr
            .columns()
            .into_iter()
            .filter(|name| self.table.has_column(name))
            .map(|name| name.to_string())
            .collect();
        columns.reverse();

        let row_index = self.rows.len() as u64;
        for column in &columns {
            if self.serial_columns.contains(column) {
                continue;
            }

            if self.fk_columns.contains(column) {
                if self.redraw_fk_for(row, column) && self.check_passes(row, check) {
                    return true;
                }
                continue;
            }

            for _ in 0..self.config.max_attempts_per_row {
                let value = self.sample_column(column, row_index);
                row.insert(column.clone(), value);
                if self.check_passes(row, check) {
                    return true;
                }
            }

            // Domain-narrowing retry driven by the failing predicate.
            if let (Some(base), Some(column_def)) =
                (self.domains.get(column), self.table.column(column))
            {
                let narrowed = narrowed_domain(base, &check.expr, column, self.run_date);
                let sampler = sampler_for_domain(column_def, &narrowed, self.run_date);
                for _ in 0..self.config.max_attempts_per_value {
                    let value = {
                        let mut ctx = SampleContext {
                            rng: &mut self.rng,
                            row_index,
                        };
                        sampler.sample(&mut ctx)
                    };
                    row.insert(column.clone(), value);
                    if self.check_passes(row, check) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn check_passes(&self, row: &Row, check: &CheckConstraint) -> bool {
        let ctx = EvalContext::new(row, self.run_date);
        eval_predicate(&check.expr, &ctx).passes()
    }

    /// Redraw the whole tuple of the FK covering `column`. Returns false
    /// when the pool cannot be redrawn (deferred or empty).
    fn redraw_fk_for(&mut self, row: &mut Row, column: &str) -> bool {
        for assignment in &self.fk_plan {
            if !assignment.fk.columns.iter().any(|name| name == column) {
                continue;
            }
            let FkPool::Fixed(pool) = &assignment.pool else {
                return false;
            };
            if pool.is_empty() {
                return false;
            }
            let tuple = &pool[self.rng.gen_range(0..pool.len())];
            for (name, value) in assignment.fk.columns.iter().zip(tuple.iter()) {
                row.insert(name.clone(), value.clone());
            }
            return true;
        }
        false
    }

    /// Resolve unique collisions by resampling the tuple's free columns.
    /// Returns whether any resampling happened.
    fn enforce_unique(&mut self, row: &mut Row) -> Result<bool, String> {
        let mut resampled = false;
        for index_idx in 0..self.unique_indices.len() {
            let Some(key) = self.unique_indices[index_idx].key(row) else {
                continue;
            };
            if !self.unique_indices[index_idx].seen.contains(&key) {
                continue;
            }

            let columns = self.unique_indices[index_idx].columns.clone();
            let free: Vec<String> = columns
                .iter()
                .filter(|name| {
                    !self.serial_columns.contains(*name) && !self.fk_columns.contains(*name)
                })
                .cloned()
                .collect();
            let fk_members: Vec<String> = columns
                .iter()
                .filter(|name| self.fk_columns.contains(*name))
                .cloned()
                .collect();

            let row_index = self.rows.len() as u64;
            let mut resolved = false;
            for _ in 0..self.config.max_attempts_per_row {
                if free.is_empty() {
                    // Key made of FK (and serial) columns only: redraw the
                    // foreign tuples instead.
                    let mut redrew = false;
                    for column in &fk_members {
                        redrew |= self.redraw_fk_for(row, column);
                    }
                    if !redrew {
                        break;
                    }
                } else {
                    for column in &free {
                        let value = self.sample_column(column, row_index);
                        row.insert(column.clone(), value);
                    }
                }
                resampled = true;
                match self.unique_indices[index_idx].key(row) {
                    None => {
                        resolved = true;
                        break;
                    }
                    Some(new_key) => {
                        if !self.unique_indices[index_idx].seen.contains(&new_key) {
                            resolved = true;
                            break;
                        }
                    }
                }
            }
            if !resolved {
                return Err(format!(
                    "UNIQUE ({}) collision could not be repaired",
                    columns.join(", ")
                ));
            }
        }
        Ok(resampled)
    }

    fn commit(&mut self, row: Row) {
        for index in &mut self.unique_indices {
            if let Some(key) = tuple_key(&row, &index.columns) {
                index.seen.insert(key);
            }
        }
        self.rows.push(row);
    }
}

/// Non-NULL key tuples of a generated parent table.
fn key_pool(table: &GeneratedTable, ref_columns: &[String]) -> Vec<Vec<Value>> {
    table
        .rows
        .iter()
        .filter_map(|row| tuple_key(row, ref_columns))
        .collect()
}

/// FNV-style sub-seed so each table gets its own deterministic stream.
fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
