//! Injected source of human-plausible strings.
//!
//! The engine only depends on the [`RealisticProvider`] trait; the
//! built-in provider draws from embedded word lists so runs stay
//! deterministic under a fixed seed.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Named generator registry for realistic strings.
pub trait RealisticProvider: Send + Sync {
    /// Keys the provider can generate for; also the fuzzy-match corpus.
    fn keys(&self) -> Vec<&'static str>;

    /// Generate a value for `key`, or `None` for an unknown key.
    fn generate(&self, key: &str, rng: &mut ChaCha8Rng) -> Option<String>;
}

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Carmen", "Daniel", "Elena", "Felix", "Grace", "Hugo", "Irene", "Jonas",
    "Karla", "Liam", "Marta", "Nolan", "Olivia", "Pedro", "Quinn", "Rosa", "Simon", "Tessa",
];

const LAST_NAMES: &[&str] = &[
    "Anders", "Baker", "Castro", "Dietrich", "Evans", "Fischer", "Garcia", "Hansen", "Ibarra",
    "Jensen", "Keller", "Lopez", "Martin", "Novak", "Olsen", "Price", "Quintero", "Ramos",
    "Silva", "Torres",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Oakdale", "Fairview", "Lakeside", "Milltown", "Ashford",
    "Brookfield", "Clayton", "Draymoor", "Eastgate", "Foxborough",
];

const COUNTRIES: &[&str] = &[
    "Argentina", "Brazil", "Canada", "Denmark", "Estonia", "France", "Germany", "Hungary",
    "Ireland", "Japan", "Kenya", "Norway", "Portugal", "Spain",
];

const STREETS: &[&str] = &[
    "Maple Street", "Oak Avenue", "Cedar Lane", "Elm Drive", "Pine Road", "Birch Boulevard",
    "Willow Way", "Chestnut Court",
];

const COMPANIES: &[&str] = &[
    "Northwind", "Acme Works", "Blue Harbor", "Ironleaf", "Sunrise Labs", "Quarry & Sons",
    "Hollow Oak", "Vertex Supply",
];

const JOB_TITLES: &[&str] = &[
    "Accountant", "Analyst", "Architect", "Consultant", "Coordinator", "Designer", "Developer",
    "Engineer", "Manager", "Technician",
];

const EMAIL_DOMAINS: &[&str] = &[
    "example.com", "example.org", "mail.test", "inbox.test", "post.test",
];

const WORDS: &[&str] = &[
    "amber", "basin", "cedar", "delta", "ember", "frost", "grove", "harbor", "island", "juniper",
    "kestrel", "lumen", "meadow", "north", "opal", "prairie", "quartz", "ridge", "summit",
    "timber",
];

/// Default provider backed by the embedded word lists above.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    fn pick(list: &[&str], rng: &mut ChaCha8Rng) -> String {
        list.choose(rng).copied().unwrap_or_default().to_string()
    }
}

impl RealisticProvider for BuiltinProvider {
    fn keys(&self) -> Vec<&'static str> {
        vec![
            "first_name",
            "last_name",
            "full_name",
            "name",
            "email",
            "phone",
            "phone_number",
            "address",
            "street",
            "city",
            "country",
            "company",
            "job_title",
            "isbn",
            "username",
            "word",
        ]
    }

    fn generate(&self, key: &str, rng: &mut ChaCha8Rng) -> Option<String> {
        let value = match key {
            "first_name" => Self::pick(FIRST_NAMES, rng),
            "last_name" => Self::pick(LAST_NAMES, rng),
            "full_name" | "name" => format!(
                "{} {}",
                Self::pick(FIRST_NAMES, rng),
                Self::pick(LAST_NAMES, rng)
            ),
            "email" => format!(
                "{}.{}@{}",
                Self::pick(FIRST_NAMES, rng).to_lowercase(),
                Self::pick(LAST_NAMES, rng).to_lowercase(),
                Self::pick(EMAIL_DOMAINS, rng)
            ),
            "phone" | "phone_number" => format!(
                "+{} {:03} {:03} {:04}",
                rng.gen_range(1..100),
                rng.gen_range(100..1000),
                rng.gen_range(100..1000),
                rng.gen_range(0..10000)
            ),
            "address" => format!(
                "{} {}, {}",
                rng.gen_range(1..300),
                Self::pick(STREETS, rng),
                Self::pick(CITIES, rng)
            ),
            "street" => Self::pick(STREETS, rng),
            "city" => Self::pick(CITIES, rng),
            "country" => Self::pick(COUNTRIES, rng),
            "company" => Self::pick(COMPANIES, rng),
            "job_title" => Self::pick(JOB_TITLES, rng),
            "isbn" => {
                let mut digits = String::with_capacity(13);
                for _ in 0..13 {
                    digits.push(char::from(b'0' + rng.gen_range(0..10u8)));
                }
                digits
            }
            "username" => format!(
                "{}{}",
                Self::pick(WORDS, rng),
                rng.gen_range(10..10000)
            ),
            "word" => Self::pick(WORDS, rng),
            _ => return None,
        };
        Some(value)
    }
}
