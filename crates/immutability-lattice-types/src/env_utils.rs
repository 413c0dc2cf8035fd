//! Environment variable parsing utilities.
//!
//! Used by the solver configuration to pick up overrides such as
//! `IMMUTABILITY_MAX_ITERATIONS` without repeating the parse-or-default dance.
//!
//! # Example
//!
//! ```
//! use immutability_lattice_types::env_utils::{env_bool_or, env_var};
//!
//! let rounds: Option<usize> = env_var("IMMUTABILITY_MAX_ITERATIONS");
//! let parallel = env_bool_or("IMMUTABILITY_PARALLEL", true);
//! # let _ = (rounds, parallel);
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Check if an environment variable is set to a truthy value, with a default.
///
/// "1", "true", "yes" and "on" (any case) are truthy; any other value is falsy.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key).ok() {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Parse a comma-separated environment variable into a vector.
///
/// Returns an empty vector if the variable is not set. Empty items are dropped.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
