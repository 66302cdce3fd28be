use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Previously decided name equivalences.
///
/// `confirmed` maps a canonical name to the variants a human accepted as the same
/// conference; `rejected` maps a catalog name to feed names a human declined. Both maps
/// only ever grow. Either key may be absent in the persisted form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownMappings {
    #[serde(default)]
    pub confirmed: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rejected: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    changed: bool,
}

impl KnownMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form for `name` if it was confirmed as a variant of something else
    pub fn canonical_for(&self, name: &str) -> Option<&str> {
        self.confirmed
            .iter()
            .find(|(canonical, variants)| {
                canonical.as_str() != name && variants.iter().any(|v| v == name)
            })
            .map(|(canonical, _)| canonical.as_str())
    }

    /// Whether a human already accepted these two names as the same conference
    pub fn is_confirmed(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let resolve = |n: &'_ str| self.canonical_for(n).unwrap_or(n).to_string();
        resolve(a) == resolve(b)
    }

    /// Whether a human already declined this pair, in either direction
    pub fn is_rejected(&self, a: &str, b: &str) -> bool {
        let listed = |key: &str, other: &str| {
            self.rejected
                .get(key)
                .is_some_and(|names| names.iter().any(|n| n == other))
        };
        listed(a, b) || listed(b, a)
    }

    /// Record `variant` as another spelling of `canonical`. Returns false if already known.
    pub fn confirm(&mut self, canonical: &str, variant: &str) -> bool {
        if canonical == variant {
            return false;
        }
        let variants = self.confirmed.entry(canonical.to_string()).or_default();
        if variants.iter().any(|v| v == variant) {
            return false;
        }
        variants.push(variant.to_string());
        self.changed = true;
        true
    }

    /// Record that `other` is not the same conference as `name`. Returns false if already known.
    pub fn reject(&mut self, name: &str, other: &str) -> bool {
        let names = self.rejected.entry(name.to_string()).or_default();
        if names.iter().any(|n| n == other) {
            return false;
        }
        names.push(other.to_string());
        self.changed = true;
        true
    }

    /// True when a decision was recorded since load
    pub fn has_changes(&self) -> bool {
        self.changed
    }

    pub fn mark_saved(&mut self) {
        self.changed = false;
    }
}
