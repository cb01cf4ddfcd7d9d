//! Child process environment
//!
//! Children start from an empty environment. They receive the baseline
//! variables, then any allow-listed parent variables, then the caller's
//! explicit map (which wins on conflict).

use crate::constants::BASELINE_ENV;
use std::collections::{BTreeMap, HashMap};

/// Build the environment for a child process.
#[must_use]
pub fn build_child_env(
    allowlist: Option<&[String]>,
    explicit: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    build_from(|key| std::env::var(key).ok(), allowlist, explicit)
}

fn build_from(
    lookup: impl Fn(&str) -> Option<String>,
    allowlist: Option<&[String]>,
    explicit: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let forwarded = BASELINE_ENV
        .iter()
        .copied()
        .chain(allowlist.unwrap_or_default().iter().map(String::as_str));

    let mut env: BTreeMap<String, String> = forwarded
        .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
        .collect();

    env.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}
