use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

lazy_static! {
    /// Matches an optional http(s) scheme at the start of a url
    pub static ref URL_SCHEME_REGEX: Regex = Regex::new(r"^(https?://)?").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Normalizes a free text query so equivalent searches share a cache entry
pub fn normalize_query(query: &str) -> String {
    WHITESPACE_REGEX
        .replace_all(query.trim(), " ")
        .to_lowercase()
}
