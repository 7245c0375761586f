//! Subscription bookkeeping for the price stream.
//!
//! Tracks three things per client: the symbols the caller wants (bounded by
//! the subscription limit), the symbols the gateway has confirmed, and the
//! subscribe/unsubscribe requests waiting for the next connection open.

use crate::shared::Symbol;

/// Wire messages to send right after a connection opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFlush {
    pub subscribe: Vec<Symbol>,
    pub unsubscribe: Vec<Symbol>,
}

impl PendingFlush {
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

/// Manages tracked, confirmed and pending subscriptions.
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    max_subscriptions: usize,
    /// Symbols carried in the connection URL
    initial: Vec<Symbol>,
    /// Caller intent, in request order
    tracked: Vec<Symbol>,
    /// Acknowledged by the gateway on the current connection
    confirmed: Vec<Symbol>,
    pending_subscribe: Vec<Symbol>,
    pending_unsubscribe: Vec<Symbol>,
}

fn push_unique(list: &mut Vec<Symbol>, symbol: &Symbol) {
    if !list.contains(symbol) {
        list.push(symbol.clone());
    }
}

fn dedup_in_order(list: Vec<Symbol>) -> Vec<Symbol> {
    let mut out = Vec::with_capacity(list.len());
    for symbol in &list {
        push_unique(&mut out, symbol);
    }
    out
}

impl SubscriptionManager {
    /// Create a manager whose connection URL carries `initial`.
    /// The initial set is truncated to `max_subscriptions`.
    pub fn new(initial: Vec<Symbol>, max_subscriptions: usize) -> Self {
        let max_subscriptions = max_subscriptions.max(1);
        let mut initial = dedup_in_order(initial);
        initial.truncate(max_subscriptions);
        Self {
            max_subscriptions,
            tracked: initial.clone(),
            initial,
            confirmed: Vec::new(),
            pending_subscribe: Vec::new(),
            pending_unsubscribe: Vec::new(),
        }
    }

    /// Re-track the initial symbols after a reset. They ride on the URL, so
    /// the gateway subscribes them on every open.
    pub fn seed_initial(&mut self) {
        for symbol in self.initial.clone() {
            if self.tracked.len() >= self.max_subscriptions {
                break;
            }
            push_unique(&mut self.tracked, &symbol);
        }
    }

    /// Track new symbols, keeping the tracked set within the bound.
    ///
    /// Already-tracked symbols are skipped. When the request would exceed the
    /// bound it is truncated: earlier symbols in `symbols` win. Returns the
    /// symbols that were admitted, in request order.
    pub fn admit_subscribe(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut admitted = Vec::new();
        for symbol in symbols {
            if self.tracked.contains(symbol) || admitted.contains(symbol) {
                continue;
            }
            if self.tracked.len() >= self.max_subscriptions {
                tracing::debug!(
                    "Subscription limit {} reached, dropping {}",
                    self.max_subscriptions,
                    symbol
                );
                continue;
            }
            self.tracked.push(symbol.clone());
            admitted.push(symbol.clone());
        }
        admitted
    }

    /// Stop tracking symbols. Returns the deduplicated request.
    pub fn admit_unsubscribe(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        let symbols = dedup_in_order(symbols.to_vec());
        self.tracked.retain(|s| !symbols.contains(s));
        symbols
    }

    /// Queue symbols to subscribe on the next open. Cancels a queued
    /// unsubscribe for the same symbol.
    pub fn queue_subscribe(&mut self, symbols: Vec<Symbol>) {
        self.pending_unsubscribe.retain(|s| !symbols.contains(s));
        self.pending_subscribe.extend(symbols);
    }

    /// Queue symbols to unsubscribe on the next open. Cancels a queued
    /// subscribe for the same symbol.
    pub fn queue_unsubscribe(&mut self, symbols: Vec<Symbol>) {
        self.pending_subscribe.retain(|s| !symbols.contains(s));
        self.pending_unsubscribe.extend(symbols);
    }

    /// Drain both pending queues, deduplicated.
    pub fn take_pending(&mut self) -> PendingFlush {
        PendingFlush {
            subscribe: dedup_in_order(std::mem::take(&mut self.pending_subscribe)),
            unsubscribe: dedup_in_order(std::mem::take(&mut self.pending_unsubscribe)),
        }
    }

    /// Work out what to send when a connection opens.
    ///
    /// The pending queues are drained. The gateway subscribes the URL symbols
    /// on every open, so any initial symbol no longer tracked is unsubscribed
    /// again; this keeps the live set within the bound. On a reconnect with
    /// `resync` set, tracked symbols outside the initial set are subscribed
    /// again too, skipping anything the pending queues already cover. The
    /// confirmed set is reset because the gateway confirms afresh on every
    /// connection.
    pub fn plan_open(&mut self, is_reconnect: bool, resync: bool) -> PendingFlush {
        self.confirmed.clear();
        let mut flush = self.take_pending();

        for symbol in &self.initial {
            if !self.tracked.contains(symbol) {
                push_unique(&mut flush.unsubscribe, symbol);
            }
        }

        if is_reconnect && resync {
            for symbol in &self.tracked {
                if !self.initial.contains(symbol) {
                    push_unique(&mut flush.subscribe, symbol);
                }
            }
        }
        flush
    }

    /// Union gateway-confirmed symbols into the confirmed set.
    pub fn apply_subscribed(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        for symbol in symbols {
            push_unique(&mut self.confirmed, symbol);
        }
        self.confirmed.clone()
    }

    /// Remove gateway-confirmed unsubscriptions from the confirmed set.
    pub fn apply_unsubscribed(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        self.confirmed.retain(|s| !symbols.contains(s));
        self.confirmed.clone()
    }

    /// Reset to empty: nothing tracked, confirmed or pending.
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.confirmed.clear();
        self.pending_subscribe.clear();
        self.pending_unsubscribe.clear();
    }

    pub fn initial(&self) -> &[Symbol] {
        &self.initial
    }

    pub fn tracked(&self) -> &[Symbol] {
        &self.tracked
    }

    pub fn confirmed(&self) -> &[Symbol] {
        &self.confirmed
    }

    pub fn pending_subscribe(&self) -> &[Symbol] {
        &self.pending_subscribe
    }

    pub fn pending_unsubscribe(&self) -> &[Symbol] {
        &self.pending_unsubscribe
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_subscribe.is_empty() || !self.pending_unsubscribe.is_empty()
    }

    pub fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syms(raw: &[&str]) -> Vec<Symbol> {
        raw.iter().map(|s| Symbol::new(*s)).collect()
    }

    #[test]
    fn test_initial_truncated_and_tracked() {
        let manager = SubscriptionManager::new(syms(&["A", "B", "C"]), 2);
        assert_eq!(manager.initial(), syms(&["A", "B"]).as_slice());
        assert_eq!(manager.tracked(), syms(&["A", "B"]).as_slice());
    }

    #[test]
    fn test_admit_subscribe_truncates_earliest_win() {
        let mut manager = SubscriptionManager::new(syms(&["A"]), 3);
        let admitted = manager.admit_subscribe(&syms(&["A", "B", "C", "D"]));
        assert_eq!(admitted, syms(&["B", "C"]));
        assert_eq!(manager.tracked().len(), 3);

        assert!(manager.admit_subscribe(&syms(&["E"])).is_empty());
    }

    #[test]
    fn test_admit_unsubscribe_frees_capacity() {
        let mut manager = SubscriptionManager::new(syms(&["A", "B"]), 2);
        manager.admit_unsubscribe(&syms(&["A", "A"]));
        assert_eq!(manager.tracked(), syms(&["B"]).as_slice());
        assert_eq!(manager.admit_subscribe(&syms(&["C"])), syms(&["C"]));
    }

    #[test]
    fn test_take_pending_dedupes_and_clears() {
        let mut manager = SubscriptionManager::new(vec![], 10);
        manager.queue_subscribe(syms(&["A", "B"]));
        manager.queue_subscribe(syms(&["B", "C"]));
        manager.queue_unsubscribe(syms(&["D", "D"]));

        let flush = manager.take_pending();
        assert_eq!(flush.subscribe, syms(&["A", "B", "C"]));
        assert_eq!(flush.unsubscribe, syms(&["D"]));

        assert!(!manager.has_pending());
        assert!(manager.take_pending().is_empty());
    }

    #[test]
    fn test_queue_last_intent_wins() {
        let mut manager = SubscriptionManager::new(vec![], 10);
        manager.queue_subscribe(syms(&["A"]));
        manager.queue_unsubscribe(syms(&["A"]));
        let flush = manager.take_pending();
        assert!(flush.subscribe.is_empty());
        assert_eq!(flush.unsubscribe, syms(&["A"]));
    }

    #[test]
    fn test_plan_open_first_connect_only_flushes_pending() {
        let mut manager = SubscriptionManager::new(syms(&["A"]), 10);
        let admitted = manager.admit_subscribe(&syms(&["B"]));
        manager.queue_subscribe(admitted);

        let flush = manager.plan_open(false, true);
        assert_eq!(flush.subscribe, syms(&["B"]));
        assert!(flush.unsubscribe.is_empty());
    }

    #[test]
    fn test_plan_open_reconnect_resyncs_without_duplicates() {
        let mut manager = SubscriptionManager::new(syms(&["A", "B"]), 10);
        manager.admit_subscribe(&syms(&["C"]));
        manager.admit_unsubscribe(&syms(&["B"]));

        // C was already sent on an earlier connection; D is still pending
        let admitted = manager.admit_subscribe(&syms(&["D"]));
        manager.queue_subscribe(admitted);

        let flush = manager.plan_open(true, true);
        assert_eq!(flush.subscribe, syms(&["D", "C"]));
        assert_eq!(flush.unsubscribe, syms(&["B"]));

        // A second reconnect never replays the pending queue, but B rides on
        // the URL again and has to be dropped again
        let flush = manager.plan_open(true, false);
        assert!(flush.subscribe.is_empty());
        assert_eq!(flush.unsubscribe, syms(&["B"]));
    }

    #[test]
    fn test_plan_open_drops_untracked_url_symbols_on_first_open() {
        let mut manager = SubscriptionManager::new(syms(&["A"]), 2);
        manager.clear();
        let admitted = manager.admit_subscribe(&syms(&["B", "C"]));
        manager.queue_subscribe(admitted);
        manager.seed_initial();
        assert_eq!(manager.tracked(), syms(&["B", "C"]).as_slice());

        let flush = manager.plan_open(false, true);
        assert_eq!(flush.unsubscribe, syms(&["A"]));
        assert_eq!(flush.subscribe, syms(&["B", "C"]));
    }

    #[test]
    fn test_confirmed_union_and_difference() {
        let mut manager = SubscriptionManager::new(vec![], 10);
        manager.apply_subscribed(&syms(&["A", "B"]));
        let confirmed = manager.apply_subscribed(&syms(&["B", "C"]));
        assert_eq!(confirmed, syms(&["A", "B", "C"]));

        let confirmed = manager.apply_unsubscribed(&syms(&["B"]));
        assert_eq!(confirmed, syms(&["A", "C"]));
    }

    #[test]
    fn test_clear_then_seed_initial() {
        let mut manager = SubscriptionManager::new(syms(&["A"]), 10);
        manager.admit_subscribe(&syms(&["B"]));
        manager.queue_subscribe(syms(&["B"]));
        manager.apply_subscribed(&syms(&["A"]));

        manager.clear();
        assert!(manager.tracked().is_empty());
        assert!(manager.confirmed().is_empty());
        assert!(!manager.has_pending());

        manager.seed_initial();
        assert_eq!(manager.tracked(), syms(&["A"]).as_slice());
    }
}
