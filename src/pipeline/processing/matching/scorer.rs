//! Similarity scoring for conference names.
//!
//! Both names are lowercased and every non-alphanumeric character becomes a token
//! separator. Two token-aware ratios are computed on top of the Sørensen–Dice bigram
//! coefficient:
//!
//! - token-sort: tokens sorted and re-joined, so word order does not matter;
//! - token-set: shared tokens compared against each side's shared+remaining tokens,
//!   so "PyCon US" still resembles "PyCon United States".
//!
//! The score is `max(token_sort, 0.95 * token_set)` scaled to 0–100 and floored. The
//! token-set term is damped so that a name which is merely a subset of another never
//! reaches the exact tier; only names whose sorted tokens are identical (ignoring
//! whitespace) score 100.

use strsim::sorensen_dice;

const TOKEN_SET_WEIGHT: f64 = 0.95;

/// Order-insensitive, case-insensitive similarity of two conference names (0–100)
pub fn conference_scorer(a: &str, b: &str) -> u8 {
    let left = tokens(a);
    let right = tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let sort = token_sort_ratio(&left, &right);
    let set = token_set_ratio(&left, &right) * TOKEN_SET_WEIGHT;
    sort.max(set).floor().clamp(0.0, 100.0) as u8
}

/// True when both names start with the same token and end with the same token
pub fn shares_anchor_tokens(a: &str, b: &str) -> bool {
    let left = tokens(a);
    let right = tokens(b);
    match (left.first(), left.last(), right.first(), right.last()) {
        (Some(lf), Some(ll), Some(rf), Some(rl)) => lf == rf && ll == rl,
        _ => false,
    }
}

fn tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn ratio(a: &str, b: &str) -> f64 {
    sorensen_dice(a, b) * 100.0
}

fn token_sort_ratio(left: &[String], right: &[String]) -> f64 {
    let mut l = left.to_vec();
    let mut r = right.to_vec();
    l.sort();
    r.sort();
    ratio(&l.join(" "), &r.join(" "))
}

fn token_set_ratio(left: &[String], right: &[String]) -> f64 {
    let mut l: Vec<&str> = left.iter().map(String::as_str).collect();
    let mut r: Vec<&str> = right.iter().map(String::as_str).collect();
    l.sort_unstable();
    l.dedup();
    r.sort_unstable();
    r.dedup();

    let shared: Vec<&str> = l.iter().copied().filter(|t| r.contains(t)).collect();
    let only_left: Vec<&str> = l.iter().copied().filter(|t| !shared.contains(t)).collect();
    let only_right: Vec<&str> = r.iter().copied().filter(|t| !shared.contains(t)).collect();

    let base = shared.join(" ");
    let with_left = join_nonempty(&base, &only_left.join(" "));
    let with_right = join_nonempty(&base, &only_right.join(" "));

    ratio(&base, &with_left)
        .max(ratio(&base, &with_right))
        .max(ratio(&with_left, &with_right))
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}
