//! Column value samplers.
//!
//! Every column resolves to one boxed [`Sampler`] before generation
//! starts; the repair loop builds additional narrowed samplers on the
//! fly from tightened domains. Samplers never fail — an unsatisfiable
//! domain just produces out-of-domain values that validation drops.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use rowforge_core::{ColumnDef, TypeTag, Value};

use crate::domain::ValueDomain;
use crate::realistic::RealisticProvider;

/// Per-sample state handed to a sampler.
pub struct SampleContext<'a> {
    pub rng: &'a mut ChaCha8Rng,
    pub row_index: u64,
}

pub trait Sampler: Send + Sync {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value;
}

/// Uniform draw over a fixed value set (ENUM types, IN-derived enums,
/// and user-predefined values).
pub struct EnumSampler {
    values: Vec<Value>,
}

impl EnumSampler {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl Sampler for EnumSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        if self.values.is_empty() {
            return Value::Null;
        }
        let idx = ctx.rng.gen_range(0..self.values.len());
        self.values[idx].clone()
    }
}

pub struct IntSampler {
    min: i64,
    max: i64,
}

impl IntSampler {
    pub fn from_domain(domain: &ValueDomain) -> Self {
        let min = domain
            .min
            .as_ref()
            .and_then(Value::as_decimal)
            .map(|bound| int_lower(bound, domain.inclusive_min))
            .unwrap_or(-(i32::MAX as i64));
        let max = domain
            .max
            .as_ref()
            .and_then(Value::as_decimal)
            .map(|bound| int_upper(bound, domain.inclusive_max))
            .unwrap_or(i32::MAX as i64);
        Self { min, max }
    }
}

impl Sampler for IntSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        if self.min > self.max {
            // Contradictory domain; emit something and let validation drop it.
            return Value::Int(self.min);
        }
        Value::Int(ctx.rng.gen_range(self.min..=self.max))
    }
}

pub struct DecimalSampler {
    min_mantissa: i64,
    max_mantissa: i64,
    scale: u32,
}

impl DecimalSampler {
    pub fn from_domain(domain: &ValueDomain, scale: u32) -> Self {
        let scale = scale.min(9);
        let factor = Decimal::from(10_i64.pow(scale));
        let min = domain
            .min
            .as_ref()
            .and_then(Value::as_decimal)
            .unwrap_or(Decimal::ZERO);
        let max = domain
            .max
            .as_ref()
            .and_then(Value::as_decimal)
            .unwrap_or_else(|| Decimal::from(1_000_000));
        let min_mantissa = int_lower(min * factor, domain.inclusive_min);
        let max_mantissa = int_upper(max * factor, domain.inclusive_max);
        Self {
            min_mantissa,
            max_mantissa,
            scale,
        }
    }
}

impl Sampler for DecimalSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let mantissa = if self.min_mantissa > self.max_mantissa {
            self.min_mantissa
        } else {
            ctx.rng.gen_range(self.min_mantissa..=self.max_mantissa)
        };
        Value::Decimal(Decimal::new(mantissa, self.scale))
    }
}

pub struct DateSampler {
    min: NaiveDate,
    max: NaiveDate,
}

impl DateSampler {
    pub fn from_domain(domain: &ValueDomain, run_date: NaiveDate) -> Self {
        let (min, max) = date_bounds(domain, run_date);
        Self { min, max }
    }
}

impl Sampler for DateSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        Value::Date(random_date(self.min, self.max, ctx.rng))
    }
}

pub struct TimestampSampler {
    min: NaiveDate,
    max: NaiveDate,
}

impl TimestampSampler {
    pub fn from_domain(domain: &ValueDomain, run_date: NaiveDate) -> Self {
        let (min, max) = date_bounds(domain, run_date);
        Self { min, max }
    }
}

impl Sampler for TimestampSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let date = random_date(self.min, self.max, ctx.rng);
        let seconds = ctx.rng.gen_range(0..86_400);
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
            .unwrap_or(NaiveTime::MIN);
        Value::Timestamp(NaiveDateTime::new(date, time))
    }
}

pub struct TimeSampler;

impl Sampler for TimeSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let seconds = ctx.rng.gen_range(0..86_400);
        Value::Time(
            NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(NaiveTime::MIN),
        )
    }
}

pub struct BoolSampler;

impl Sampler for BoolSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        Value::Bool(ctx.rng.gen_bool(0.5))
    }
}

/// Random ASCII string with length in `[min_len, max_len]`.
pub struct AsciiSampler {
    min_len: u32,
    max_len: u32,
}

impl AsciiSampler {
    pub fn from_domain(domain: &ValueDomain) -> Self {
        let max_len = domain.max_length.unwrap_or(20).min(20).max(1);
        let min_len = domain.min_length.unwrap_or(1).clamp(1, max_len);
        Self { min_len, max_len }
    }
}

impl Sampler for AsciiSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let len = ctx.rng.gen_range(self.min_len..=self.max_len);
        let text: String = (0..len)
            .map(|_| char::from(b'a' + ctx.rng.gen_range(0..26u8)))
            .collect();
        Value::Text(text)
    }
}

/// Strings matching a CHECK regex, generated via `rand_regex`.
pub struct RegexSampler {
    dist: rand_regex::Regex,
    max_length: Option<u32>,
}

impl RegexSampler {
    /// Compile a sampler from a POSIX-ish pattern. Anchors are stripped
    /// (`rand_regex` rejects look-arounds); `None` when the pattern is
    /// outside what the generator supports.
    pub fn compile(pattern: &str, max_length: Option<u32>) -> Option<Self> {
        let stripped = pattern.trim_start_matches('^').trim_end_matches('$');
        let dist = rand_regex::Regex::compile(stripped, 10).ok()?;
        Some(Self { dist, max_length })
    }
}

impl Sampler for RegexSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let text: String = ctx.rng.sample(&self.dist);
        let text = match self.max_length {
            Some(limit) => text.chars().take(limit as usize).collect(),
            None => text,
        };
        Value::Text(text)
    }
}

/// How realistic-provider output is fitted to the column type.
pub enum TypeFit {
    Text { max_length: Option<u32> },
    Int { min: i64, max: i64 },
    Decimal { scale: u32 },
    Date { min: NaiveDate, max: NaiveDate },
}

/// Provider-backed sampler wrapped to respect type bounds: strings are
/// truncated, numerics clamped, dates parsed or redrawn.
pub struct RealisticSampler {
    provider: Arc<dyn RealisticProvider>,
    key: String,
    fit: TypeFit,
}

impl RealisticSampler {
    pub fn new(provider: Arc<dyn RealisticProvider>, key: impl Into<String>, fit: TypeFit) -> Self {
        Self {
            provider,
            key: key.into(),
            fit,
        }
    }
}

impl Sampler for RealisticSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        let raw = self
            .provider
            .generate(&self.key, ctx.rng)
            .unwrap_or_else(|| format!("{}_{}", self.key, ctx.row_index + 1));
        match &self.fit {
            TypeFit::Text { max_length } => {
                let text = match max_length {
                    Some(limit) => raw.chars().take(*limit as usize).collect(),
                    None => raw,
                };
                Value::Text(text)
            }
            TypeFit::Int { min, max } => {
                let parsed = raw.parse::<i64>().ok();
                let value = match parsed {
                    Some(value) => value.clamp(*min, (*max).max(*min)),
                    None => {
                        if min > max {
                            *min
                        } else {
                            ctx.rng.gen_range(*min..=*max)
                        }
                    }
                };
                Value::Int(value)
            }
            TypeFit::Decimal { scale } => {
                let parsed = raw.parse::<Decimal>().ok();
                let value = parsed.unwrap_or_else(|| {
                    Decimal::new(ctx.rng.gen_range(0..1_000_000), (*scale).min(9))
                });
                Value::Decimal(value.round_dp(*scale))
            }
            TypeFit::Date { min, max } => {
                let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok();
                let date = parsed
                    .filter(|date| date >= min && date <= max)
                    .unwrap_or_else(|| random_date(*min, *max, ctx.rng));
                Value::Date(date)
            }
        }
    }
}

/// User-supplied sampler closure from `column_type_mappings`.
pub struct FnSampler {
    func: Arc<dyn Fn(&mut ChaCha8Rng, u64) -> Value + Send + Sync>,
}

impl FnSampler {
    pub fn new(func: Arc<dyn Fn(&mut ChaCha8Rng, u64) -> Value + Send + Sync>) -> Self {
        Self { func }
    }
}

impl Sampler for FnSampler {
    fn sample(&self, ctx: &mut SampleContext<'_>) -> Value {
        (self.func)(ctx.rng, ctx.row_index)
    }
}

/// Typed fallback sampler for a column, guided by its domain.
pub fn sampler_for_domain(
    column: &ColumnDef,
    domain: &ValueDomain,
    run_date: NaiveDate,
) -> Arc<dyn Sampler> {
    if let Some(values) = &domain.enum_values {
        return Arc::new(EnumSampler::new(values.clone()));
    }
    match &column.type_tag {
        TypeTag::Integer | TypeTag::Serial => Arc::new(IntSampler::from_domain(domain)),
        TypeTag::Decimal { scale, .. } => Arc::new(DecimalSampler::from_domain(domain, *scale)),
        TypeTag::Date => Arc::new(DateSampler::from_domain(domain, run_date)),
        TypeTag::Timestamp => Arc::new(TimestampSampler::from_domain(domain, run_date)),
        TypeTag::Time => Arc::new(TimeSampler),
        TypeTag::Boolean => Arc::new(BoolSampler),
        TypeTag::Varchar(_) | TypeTag::Char(_) | TypeTag::Text | TypeTag::Enum(_)
        | TypeTag::Opaque(_) => {
            if let Some(pattern) = &domain.pattern {
                if let Some(sampler) = RegexSampler::compile(pattern, domain.max_length) {
                    return Arc::new(sampler);
                }
            }
            Arc::new(AsciiSampler::from_domain(domain))
        }
    }
}

fn date_bounds(domain: &ValueDomain, run_date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    let mut min = domain
        .min
        .as_ref()
        .and_then(Value::as_date)
        .unwrap_or(epoch);
    let mut max = domain
        .max
        .as_ref()
        .and_then(Value::as_date)
        .unwrap_or(run_date);
    if !domain.inclusive_min {
        min = min.succ_opt().unwrap_or(min);
    }
    if !domain.inclusive_max {
        max = max.pred_opt().unwrap_or(max);
    }
    (min, max)
}

fn random_date(min: NaiveDate, max: NaiveDate, rng: &mut ChaCha8Rng) -> NaiveDate {
    if min > max {
        return min;
    }
    let span = (max - min).num_days();
    min + Duration::days(rng.gen_range(0..=span))
}

/// Smallest integer admitted by a lower bound.
fn int_lower(bound: Decimal, inclusive: bool) -> i64 {
    let value = if inclusive {
        bound.ceil()
    } else {
        bound.floor() + Decimal::ONE
    };
    value.to_i64().unwrap_or(i64::MIN / 4)
}

/// Largest integer admitted by an upper bound.
fn int_upper(bound: Decimal, inclusive: bool) -> i64 {
    let value = if inclusive {
        bound.floor()
    } else {
        bound.ceil() - Decimal::ONE
    };
    value.to_i64().unwrap_or(i64::MAX / 4)
}
