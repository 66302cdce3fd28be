//! Title normalization: turns free-text conference names into comparable keys.
//!
//! Every transform here is a pure string rewrite and the composition is idempotent,
//! because names are re-normalized at several points of a run (dedupe, matching,
//! mapping lookups).

pub mod countries;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::KnownMappings;
use countries::country_for_code;

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}\b").expect("year pattern compiles"));

// Runs on noise-collapsed text, so a single space is the only separator left
static TRAILING_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^| )([A-Z]{2,3})$").expect("country code pattern compiles"));

static CONF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bConf\b").expect("conf pattern compiles"));

static NOISE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s+]+").expect("noise pattern compiles"));

/// Upper bound on confirmed-mapping hops followed during one normalization
const MAX_MAPPING_HOPS: usize = 32;

/// Canonicalize a conference name.
///
/// Steps, in order: strip 4-digit years, expand a trailing country code, expand
/// "Conf", collapse `+`/whitespace noise, then apply confirmed name mappings.
/// Blank input, or input that would collapse to nothing, is returned unchanged.
pub fn normalize(name: &str, known: &KnownMappings) -> String {
    if name.trim().is_empty() {
        return name.to_string();
    }

    let cleaned = clean_title(name);
    if cleaned.is_empty() {
        return name.to_string();
    }

    let resolved = apply_known_mappings(cleaned, known);
    if resolved != name {
        debug!("Normalized title '{}' -> '{}'", name, resolved);
    }
    resolved
}

/// Steps 1–4 of [`normalize`], without consulting any mappings.
///
/// Noise is collapsed before the country step as well as after it, so a code followed
/// by `+` or a stripped year is already trailing on the first pass.
pub fn clean_title(name: &str) -> String {
    let without_years = YEAR_PATTERN.replace_all(name, " ");
    let expanded = expand_trailing_country(&collapse_noise(&without_years));
    let conference = CONF_PATTERN.replace_all(&expanded, "Conference");
    collapse_noise(&conference)
}

/// Normalize a place string to "City, Country" shape
pub fn normalize_place(place: &str) -> String {
    let parts: Vec<String> = place
        .split(',')
        .map(collapse_noise)
        .filter(|p| !p.is_empty())
        .collect();

    let Some((last, rest)) = parts.split_last() else {
        return String::new();
    };

    let country = country_for_code(last).map(str::to_string).unwrap_or_else(|| last.clone());
    let mut out: Vec<&str> = rest.iter().map(String::as_str).collect();
    out.push(&country);
    out.join(", ")
}

fn expand_trailing_country(name: &str) -> String {
    let Some(caps) = TRAILING_CODE_PATTERN.captures(name) else {
        return name.to_string();
    };
    let (Some(whole), Some(code)) = (caps.get(0), caps.get(2)) else {
        return name.to_string();
    };
    match country_for_code(code.as_str()) {
        Some(country) => {
            let separator = caps.get(1).map_or("", |m| m.as_str());
            format!("{}{}{}", &name[..whole.start()], separator, country)
        }
        None => name.to_string(),
    }
}

fn collapse_noise(text: &str) -> String {
    NOISE_PATTERN.replace_all(text, " ").trim().to_string()
}

fn apply_known_mappings(cleaned: String, known: &KnownMappings) -> String {
    let mut visited = vec![cleaned];

    for _ in 0..MAX_MAPPING_HOPS {
        let current = visited.last().map(String::as_str).unwrap_or_default();
        let Some(canonical) = known.canonical_for(current) else {
            break;
        };
        let next = clean_title(canonical);
        if next.is_empty() || next == current {
            break;
        }
        if let Some(pos) = visited.iter().position(|v| *v == next) {
            // A mapping cycle; settle on its smallest member so every entry point agrees
            let cycle_min = visited[pos..].iter().min().cloned().unwrap_or(next);
            return cycle_min;
        }
        visited.push(next);
    }

    visited.pop().unwrap_or_default()
}
