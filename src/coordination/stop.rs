//! Cooperative stop signalling
//!
//! Workers poll the flag between units of work and acknowledge it with their
//! own code when they exit. A watch channel mirrors the flag so a worker parked
//! on an empty or full queue observes the stop without polling.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;

/// Stop flag plus per-worker acknowledgement ledger
#[derive(Debug)]
pub struct StopCoordinator {
    state: RwLock<StopState>,
    notifier: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct StopState {
    signed: bool,
    deals: HashMap<String, u32>,
}

impl Default for StopCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl StopCoordinator {
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(false);
        Self {
            state: RwLock::new(StopState::default()),
            notifier,
        }
    }

    /// Raises the stop flag
    ///
    /// Returns true only to the caller that performed the transition.
    pub fn sign(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.signed {
            return false;
        }
        state.signed = true;
        self.notifier.send_replace(true);
        true
    }

    pub fn signed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .signed
    }

    /// Records that the worker identified by `code` observed the stop
    ///
    /// Calls made before the flag is raised are ignored.
    pub fn deal(&self, code: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.signed {
            return;
        }
        *state.deals.entry(code.to_string()).or_insert(0) += 1;
    }

    pub fn deal_count(&self, code: &str) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .deals
            .get(code)
            .copied()
            .unwrap_or(0)
    }

    pub fn deal_total(&self) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .deals
            .values()
            .sum()
    }

    /// Clears the flag and every counter for reuse in another run
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.signed = false;
        state.deals.clear();
        self.notifier.send_replace(false);
    }

    /// Returns a listener that resolves once the flag is raised
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            receiver: self.notifier.subscribe(),
        }
    }

    pub fn summary(&self) -> String {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<_> = state.deals.iter().collect();
        codes.sort();
        let deals = codes
            .iter()
            .map(|(code, count)| format!("{}={}", code, count))
            .collect::<Vec<_>>()
            .join(", ");
        format!("signed: {}, deals: [{}]", state.signed, deals)
    }
}

/// Async view of the stop flag held by one worker
#[derive(Debug, Clone)]
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once the stop flag is raised
    pub async fn raised(&mut self) {
        loop {
            let signed = *self.receiver.borrow_and_update();
            if signed {
                return;
            }
            if self.receiver.changed().await.is_err() {
                // Coordinator dropped; nothing will ever resume this run
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_sign_once() {
        let stop = StopCoordinator::new();
        assert!(!stop.signed());
        assert!(stop.sign());
        assert!(stop.signed());
        assert!(!stop.sign());
    }

    #[test]
    fn test_concurrent_sign_single_winner() {
        let stop = Arc::new(StopCoordinator::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let stop = Arc::clone(&stop);
                thread::spawn(move || stop.sign())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_deal_ignored_before_sign() {
        let stop = StopCoordinator::new();
        stop.deal("downloader-0");
        assert_eq!(stop.deal_count("downloader-0"), 0);
        assert_eq!(stop.deal_total(), 0);

        stop.sign();
        stop.deal("downloader-0");
        stop.deal("downloader-0");
        stop.deal("analyzer-1");
        assert_eq!(stop.deal_count("downloader-0"), 2);
        assert_eq!(stop.deal_count("analyzer-1"), 1);
        assert_eq!(stop.deal_count("unknown"), 0);
        assert_eq!(stop.deal_total(), 3);
    }

    #[test]
    fn test_reset() {
        let stop = StopCoordinator::new();
        stop.sign();
        stop.deal("item-pipeline");
        stop.reset();

        assert!(!stop.signed());
        assert_eq!(stop.deal_total(), 0);
        assert!(stop.sign());
    }

    #[test]
    fn test_summary() {
        let stop = StopCoordinator::new();
        stop.sign();
        stop.deal("b");
        stop.deal("a");
        assert_eq!(stop.summary(), "signed: true, deals: [a=1, b=1]");
    }

    #[tokio::test]
    async fn test_signal_wakes_listener() {
        let stop = Arc::new(StopCoordinator::new());
        let mut signal = stop.subscribe();

        let pending = tokio::time::timeout(Duration::from_millis(20), signal.raised()).await;
        assert!(pending.is_err());

        let stop_clone = Arc::clone(&stop);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            stop_clone.sign();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.raised())
            .await
            .expect("listener should observe the stop");
    }

    #[tokio::test]
    async fn test_signal_after_sign_resolves_immediately() {
        let stop = StopCoordinator::new();
        stop.sign();
        let mut signal = stop.subscribe();
        tokio::time::timeout(Duration::from_millis(100), signal.raised())
            .await
            .expect("already-raised flag should resolve at once");
    }
}
