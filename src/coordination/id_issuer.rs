use std::sync::{Mutex, PoisonError};

/// Thread-safe monotonic id source
///
/// Ids start at 1. Once `u32::MAX` has been issued, the following call yields
/// `0` and the sequence then restarts from 1. Zero is a legal id that appears
/// exactly once per wraparound; it is never used as a sentinel. Ids are only
/// unique within one unbroken sequence.
#[derive(Debug, Default)]
pub struct IdIssuer {
    state: Mutex<IssuerState>,
}

#[derive(Debug, Default)]
struct IssuerState {
    last: u32,
    exhausted: bool,
}

impl IdIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an issuer whose next id is `last + 1`
    pub fn starting_after(last: u32) -> Self {
        Self {
            state: Mutex::new(IssuerState {
                last,
                exhausted: last == u32::MAX,
            }),
        }
    }

    /// Returns the next id in the sequence
    pub fn next_id(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.exhausted {
            state.exhausted = false;
            state.last = 0;
            return 0;
        }

        state.last += 1;
        if state.last == u32::MAX {
            state.exhausted = true;
        }
        state.last
    }
}
