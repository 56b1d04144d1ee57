//! Byproduct ledger and recycle registry

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::rates::SNAP_EPSILON;

/// Separator between items in a recycle path
pub const PATH_SEPARATOR: &str = ">";

/// Surplus byproducts per item (items/min), owned by a single pass.
///
/// A ledger seeded with [`ByproductLedger::forecast`] treats the seed as
/// production expected later in the same pass: credits realize the forecast
/// first, so an item is never counted twice, and [`ByproductLedger::settle`]
/// drops whatever the pass never produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByproductLedger {
    available: BTreeMap<String, f64>,
    forecast: BTreeMap<String, f64>,
}

impl ByproductLedger {
    /// Ledger holding `snapshot` as surplus already produced
    pub fn from_snapshot(snapshot: &BTreeMap<String, f64>) -> Self {
        Self {
            available: snapshot.clone(),
            forecast: BTreeMap::new(),
        }
    }

    /// Ledger holding `snapshot` as surplus this pass will produce
    pub fn forecast(snapshot: &BTreeMap<String, f64>) -> Self {
        Self {
            available: snapshot.clone(),
            forecast: snapshot.clone(),
        }
    }

    pub fn available(&self, item: &str) -> f64 {
        self.available.get(item).copied().unwrap_or(0.0)
    }

    /// Add freshly produced surplus
    pub fn credit(&mut self, item: &str, qty: f64) {
        let realized = match self.forecast.get_mut(item) {
            Some(pending) => {
                let realized = qty.min(*pending);
                *pending -= realized;
                realized
            }
            None => 0.0,
        };
        *self.available.entry(item.to_string()).or_default() += qty - realized;
    }

    /// Add every entry of `other` as produced surplus
    pub fn absorb(&mut self, other: &BTreeMap<String, f64>) {
        for (item, qty) in other {
            self.credit(item, *qty);
        }
    }

    /// Withdraw up to `wanted`, returning the amount taken
    pub fn take(&mut self, item: &str, wanted: f64) -> f64 {
        let Some(pool) = self.available.get_mut(item) else {
            return 0.0;
        };
        let taken = wanted.min(*pool).max(0.0);
        *pool -= taken;
        taken
    }

    /// Items where more forecast surplus was taken than the pass produced
    pub fn overdrawn(&self) -> Vec<String> {
        self.forecast
            .iter()
            .filter(|(item, pending)| **pending > self.available(item) + SNAP_EPSILON)
            .map(|(item, _)| item.clone())
            .collect()
    }

    /// Drop forecast surplus that was never produced
    pub fn settle(&mut self) {
        for (item, pending) in std::mem::take(&mut self.forecast) {
            if let Some(pool) = self.available.get_mut(&item) {
                *pool = (*pool - pending).max(0.0);
            }
        }
    }

    pub fn into_snapshot(self) -> BTreeMap<String, f64> {
        self.available
    }
}

/// Tree paths whose node draws on surplus instead of producing fresh supply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleRegistry {
    paths: BTreeSet<String>,
}

impl RecycleRegistry {
    /// Key for `item` under `ancestors`, e.g. "Widget>Scrap"
    pub fn path_key(ancestors: &[String], item: &str) -> String {
        let mut key = ancestors.join(PATH_SEPARATOR);
        if !key.is_empty() {
            key.push_str(PATH_SEPARATOR);
        }
        key.push_str(item);
        key
    }

    pub fn enable(&mut self, path: &str) {
        self.paths.insert(path.to_string());
    }

    /// Flip a path on or off, returning the new state
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.paths.remove(path) {
            false
        } else {
            self.paths.insert(path.to_string());
            true
        }
    }

    pub fn is_active(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl FromIterator<String> for RecycleRegistry {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn take_is_bounded_by_pool() {
        let mut ledger = ByproductLedger::default();
        ledger.credit("Scrap", 10.0);

        assert_eq!(ledger.take("Scrap", 4.0), 4.0);
        assert_eq!(ledger.available("Scrap"), 6.0);
        assert_eq!(ledger.take("Scrap", 20.0), 6.0);
        assert_eq!(ledger.available("Scrap"), 0.0);
        assert_eq!(ledger.take("Nothing", 5.0), 0.0);
    }

    #[test]
    fn plain_seed_adds_to_credits() {
        let mut ledger = ByproductLedger::from_snapshot(&snapshot(&[("Scrap", 10.0)]));
        ledger.credit("Scrap", 5.0);
        assert_eq!(ledger.available("Scrap"), 15.0);
    }

    #[test]
    fn forecast_is_realized_not_doubled() {
        let mut ledger = ByproductLedger::forecast(&snapshot(&[("Scrap", 10.0)]));
        assert_eq!(ledger.available("Scrap"), 10.0);

        ledger.credit("Scrap", 10.0);
        assert_eq!(ledger.available("Scrap"), 10.0);

        ledger.credit("Scrap", 2.0);
        ledger.settle();
        assert_eq!(ledger.available("Scrap"), 12.0);
    }

    #[test]
    fn forecast_can_be_spent_before_production() {
        let mut ledger = ByproductLedger::forecast(&snapshot(&[("Scrap", 10.0)]));
        assert_eq!(ledger.take("Scrap", 8.0), 8.0);

        ledger.credit("Scrap", 10.0);
        ledger.settle();
        assert_eq!(ledger.available("Scrap"), 2.0);
    }

    #[test]
    fn settle_drops_unrealized_forecast() {
        let mut ledger = ByproductLedger::forecast(&snapshot(&[("Scrap", 10.0), ("Ash", 3.0)]));
        ledger.credit("Scrap", 4.0);
        ledger.settle();

        assert_eq!(ledger.available("Scrap"), 4.0);
        assert_eq!(ledger.available("Ash"), 0.0);
    }

    #[test]
    fn spending_unproduced_forecast_is_overdrawn() {
        let mut ledger = ByproductLedger::forecast(&snapshot(&[("Scrap", 10.0), ("Ore", 5.0)]));
        assert_eq!(ledger.take("Scrap", 10.0), 10.0);
        assert_eq!(ledger.take("Ore", 5.0), 5.0);
        ledger.credit("Ore", 5.0);
        ledger.credit("Scrap", 4.0);

        assert_eq!(ledger.overdrawn(), vec!["Scrap".to_string()]);
    }

    #[test]
    fn unspent_forecast_is_not_overdrawn() {
        let mut ledger = ByproductLedger::forecast(&snapshot(&[("Scrap", 10.0)]));
        assert_eq!(ledger.take("Scrap", 3.0), 3.0);
        ledger.credit("Scrap", 4.0);
        assert!(ledger.overdrawn().is_empty());

        ledger.settle();
        assert_eq!(ledger.available("Scrap"), 1.0);
    }

    #[test]
    fn path_keys() {
        assert_eq!(RecycleRegistry::path_key(&[], "Plank"), "Plank");
        let ancestors = vec!["Widget".to_string(), "Ore".to_string()];
        assert_eq!(RecycleRegistry::path_key(&ancestors, "Scrap"), "Widget>Ore>Scrap");
    }

    #[test]
    fn toggle_flips_state() {
        let mut registry = RecycleRegistry::default();
        assert!(registry.toggle("Widget>Scrap"));
        assert!(registry.is_active("Widget>Scrap"));
        assert!(!registry.toggle("Widget>Scrap"));
        assert!(!registry.is_active("Widget>Scrap"));
    }
}
