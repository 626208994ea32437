//! Per-connection subscription manager.
//!
//! Tracks which parachains a WebSocket client follows and whether it wants
//! system alerts, and filters events server-side.

use std::collections::BTreeSet;

use crate::domain::ParachainId;

/// Manages the subscriptions of a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Followed parachains. Ignored while `subscribe_all` is set.
    parachain_ids: BTreeSet<ParachainId>,
    /// Wildcard `"*"`: every parachain and system alerts.
    subscribe_all: bool,
    /// System alerts without the wildcard.
    system: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds parachains; `wildcard` enables `"*"`, `system` enables system
    /// alerts.
    pub fn subscribe(&mut self, ids: &[ParachainId], wildcard: bool, system: bool) {
        self.subscribe_all |= wildcard;
        self.system |= system;
        self.parachain_ids.extend(ids.iter().copied());
    }

    /// Removes parachains; `wildcard` clears `"*"`, `system` clears system
    /// alerts.
    pub fn unsubscribe(&mut self, ids: &[ParachainId], wildcard: bool, system: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        if system {
            self.system = false;
        }
        for id in ids {
            self.parachain_ids.remove(id);
        }
    }

    /// Returns `true` if an event scoped to `parachain_id` should be
    /// forwarded. `None` marks a system alert.
    #[must_use]
    pub fn matches(&self, parachain_id: Option<ParachainId>) -> bool {
        match parachain_id {
            Some(id) => self.subscribe_all || self.parachain_ids.contains(&id),
            None => self.subscribe_all || self.system,
        }
    }

    /// Explicitly followed parachains, ascending.
    #[must_use]
    pub fn parachain_ids(&self) -> Vec<ParachainId> {
        self.parachain_ids.iter().copied().collect()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }

    /// Returns `true` if system alerts are forwarded.
    #[must_use]
    pub fn receives_system(&self) -> bool {
        self.subscribe_all || self.system
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOONBEAM: ParachainId = ParachainId::new(2004);
    const ASTAR: ParachainId = ParachainId::new(2006);

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(Some(MOONBEAM)));
        assert!(!mgr.matches(None));
    }

    #[test]
    fn specific_parachain_excludes_system_alerts() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[MOONBEAM], false, false);
        assert!(mgr.matches(Some(MOONBEAM)));
        assert!(!mgr.matches(Some(ASTAR)));
        assert!(!mgr.matches(None));
    }

    #[test]
    fn system_flag_adds_system_alerts_only() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], false, true);
        assert!(mgr.matches(None));
        assert!(!mgr.matches(Some(ASTAR)));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true, false);
        assert!(mgr.matches(Some(MOONBEAM)));
        assert!(mgr.matches(None));
        mgr.unsubscribe(&[], true, false);
        assert!(!mgr.matches(None));
    }

    #[test]
    fn unsubscribe_removes_parachain() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[MOONBEAM, ASTAR], false, false);
        mgr.unsubscribe(&[MOONBEAM], false, false);
        assert!(!mgr.matches(Some(MOONBEAM)));
        assert_eq!(mgr.parachain_ids(), vec![ASTAR]);
    }
}
