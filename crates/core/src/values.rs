#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// Keyed numeric ledger with explicit merge and delta semantics.
///
/// Every aggregate in the tree is derived through these operations, so
/// the semantics are spelled out here instead of being delegated to the
/// storage layer: missing keys read as zero, deltas cover the union of
/// keys on both sides, and applying a delta drops keys that land on
/// exactly zero to keep the maps sparse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueMap {
    amounts: BTreeMap<String, f64>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(amounts: BTreeMap<String, f64>) -> Self {
        Self { amounts }
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.amounts
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.amounts
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(key, amount)| (key.as_str(), *amount))
    }

    /// A key that is not present reads as zero.
    pub fn get(&self, key: &str) -> f64 {
        self.amounts.get(key).copied().unwrap_or(0.0)
    }

    /// Overwrites the amount for `key`. Not additive.
    pub fn set(&mut self, key: impl Into<String>, amount: f64) {
        self.amounts.insert(key.into(), amount);
    }

    pub fn add(&mut self, key: impl Into<String>, amount: f64) {
        let key = key.into();
        let next = self.get(&key) + amount;
        self.amounts.insert(key, next);
    }

    /// Key-wise sum of `other` into `self`. Keys landing on exactly
    /// zero are dropped, so derived aggregates stay sparse.
    pub fn merge_add(&mut self, other: &ValueMap) {
        for (key, amount) in &other.amounts {
            let next = self.get(key) + amount;
            if next == 0.0 {
                self.amounts.remove(key);
            } else {
                self.amounts.insert(key.clone(), next);
            }
        }
    }

    /// Net change from `previous` to `self` over the union of keys.
    /// Keys present only in `previous` yield their full value negated,
    /// so applying the result removes them from an aggregate. Keys whose
    /// amount did not move are omitted.
    pub fn delta_from(&self, previous: &ValueMap) -> ValueMap {
        let mut delta = ValueMap::new();
        for (key, amount) in &self.amounts {
            let change = amount - previous.get(key);
            if change != 0.0 {
                delta.amounts.insert(key.clone(), change);
            }
        }
        for (key, amount) in &previous.amounts {
            if !self.amounts.contains_key(key) && *amount != 0.0 {
                delta.amounts.insert(key.clone(), -amount);
            }
        }
        delta
    }

    /// Key-wise add of `delta`; same zero-removal as `merge_add`.
    pub fn apply_delta(&mut self, delta: &ValueMap) {
        self.merge_add(delta);
    }

    /// Same keys, every amount reset to zero. This is the shape a fresh
    /// prestige version starts from: the banked keys stay visible.
    pub fn zeroed(&self) -> ValueMap {
        let amounts = self.amounts.keys().map(|key| (key.clone(), 0.0)).collect();
        Self { amounts }
    }

    /// Every amount negated; used to back a subtree's totals out of its
    /// former ancestors when the subtree is deleted.
    pub fn negated(&self) -> ValueMap {
        let amounts = self
            .amounts
            .iter()
            .map(|(key, amount)| (key.clone(), -amount))
            .collect();
        Self { amounts }
    }
}

impl FromIterator<(String, f64)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().collect(),
        }
    }
}

/// Amounts entering the engine must be plain finite numbers.
pub fn is_finite_amount(amount: f64) -> bool {
    amount.is_finite()
}
