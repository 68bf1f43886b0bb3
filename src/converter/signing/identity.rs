//! Random signer identities for generated keystores.

use rand::{Rng, distributions::Alphanumeric, seq::SliceRandom};

const FIRST_NAMES: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Joseph", "Thomas",
    "Charles", "Christopher", "Daniel", "Matthew", "Anthony", "Mark", "Emma", "Olivia", "Ava",
    "Isabella", "Sophia", "Mia", "Charlotte", "Amelia",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Thompson", "White",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "Inc", "LLC", "Corp", "Ltd", "Co", "Technologies", "Software", "Apps", "Mobile", "Digital",
];

const DEPARTMENTS: &[&str] = &[
    "Development", "Engineering", "Mobile", "Android", "Software", "Technology", "Digital", "Apps",
];

const CITIES: &[&str] = &[
    "San Francisco", "New York", "Los Angeles", "Seattle", "Austin", "Boston", "Chicago",
    "Denver", "Portland", "San Diego", "Atlanta", "Miami", "London", "Berlin", "Tokyo",
    "Singapore", "Sydney", "Toronto",
];

const STATES: &[&str] = &[
    "California", "New York", "Texas", "Washington", "Massachusetts", "Colorado", "Oregon",
    "Florida", "Georgia", "Illinois", "Virginia", "Arizona",
];

const COUNTRIES: &[&str] = &["US", "GB", "DE", "JP", "SG", "AU", "CA", "FR", "NL", "SE"];

fn pick(items: &[&'static str]) -> &'static str {
    items.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

/// Alphanumeric password; shell-safe so it survives every tool's argument parsing.
pub fn password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Alias of the form `key_NNNNN`.
pub fn alias() -> String {
    format!("key_{}", rand::thread_rng().gen_range(10_000..100_000))
}

/// Distinguished name with every RDN keytool expects.
pub fn distinguished_name() -> String {
    let first = pick(FIRST_NAMES);
    let last = pick(LAST_NAMES);
    format!(
        "CN={first} {last}, OU={}, O={last} {}, L={}, ST={}, C={}",
        pick(DEPARTMENTS),
        pick(COMPANY_SUFFIXES),
        pick(CITIES),
        pick(STATES),
        pick(COUNTRIES),
    )
}
