use std::collections::{BTreeMap, HashMap};
use serde::{Deserialize, Serialize};

/// Wraps enterprise API GETs in the bounded exponential backoff.
pub const BACKOFF_FOR_API_CALLS_SWITCH: &str = "BACKOFF_FOR_API_CALLS_SWITCH";
/// Logs per-scope offer counts while gathering offers.
pub const DEBUG_SELECTIVE_OFFERS: &str = "debug_selective_offers";
/// Enables enterprise-conditioned offers at runtime.
pub const ENABLE_ENTERPRISE_ON_RUNTIME_SWITCH: &str = "ENABLE_ENTERPRISE_ON_RUNTIME_SWITCH";

/// Named boolean toggles resolved once per request.
///
/// Unknown switch names are inactive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSwitches {
    #[serde(flatten)]
    switches: BTreeMap<String, bool>,
}

impl FeatureSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defaults(defaults: &HashMap<String, bool>) -> Self {
        Self {
            switches: defaults.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    pub fn with(mut self, name: &str, active: bool) -> Self {
        self.set(name, active);
        self
    }

    pub fn set(&mut self, name: &str, active: bool) {
        self.switches.insert(name.to_string(), active);
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.switches.get(name).copied().unwrap_or(false)
    }

    /// Overlays `other` on top of `self`; values from `other` win.
    pub fn merged(mut self, other: &FeatureSwitches) -> Self {
        for (name, active) in &other.switches {
            self.switches.insert(name.clone(), *active);
        }
        self
    }

    pub fn active_names(&self) -> Vec<&str> {
        self.switches
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_switch_is_inactive() {
        let switches = FeatureSwitches::new();
        assert!(!switches.is_active(BACKOFF_FOR_API_CALLS_SWITCH));
    }

    #[test]
    fn test_overlay_wins() {
        let mut defaults = HashMap::new();
        defaults.insert(DEBUG_SELECTIVE_OFFERS.to_string(), true);
        defaults.insert(BACKOFF_FOR_API_CALLS_SWITCH.to_string(), false);

        let stored = FeatureSwitches::new()
            .with(BACKOFF_FOR_API_CALLS_SWITCH, true)
            .with(DEBUG_SELECTIVE_OFFERS, false);

        let resolved = FeatureSwitches::from_defaults(&defaults).merged(&stored);
        assert!(resolved.is_active(BACKOFF_FOR_API_CALLS_SWITCH));
        assert!(!resolved.is_active(DEBUG_SELECTIVE_OFFERS));
        assert_eq!(resolved.active_names(), vec![BACKOFF_FOR_API_CALLS_SWITCH]);
    }
}
