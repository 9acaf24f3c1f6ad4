//! Last-issued-wins gating of asynchronous responses.
//!
//! Every logical request stream (sensors, alerts, map, trends) has a
//! monotonically increasing token. A request captures the token when it is
//! issued; when its response arrives it may only touch shared state if no
//! newer request has been issued on that stream since. A fast response to an
//! old request therefore never overwrites a slow response to a newer one.
//!
//! Cancellation is logical: superseded requests still run to completion on
//! the network, their results are just refused at commit time.

use std::collections::HashMap;
use std::hash::Hash;

/// A captured position in one stream's request sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Per-stream token counters.
///
/// Intended for a single-threaded event loop: `begin_request` and
/// `try_commit` run between awaits, so the compare-then-apply in
/// `try_commit` cannot interleave with another commit.
#[derive(Debug)]
pub struct RequestFence<K> {
    latest: HashMap<K, u64>,
}

impl<K: Eq + Hash + Copy> Default for RequestFence<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Copy> RequestFence<K> {
    pub fn new() -> Self {
        Self {
            latest: HashMap::new(),
        }
    }

    /// Issues the next token for `stream`, invalidating every earlier one.
    ///
    /// Also call this on its own (discarding the token) when a user action
    /// makes in-flight results for the stream meaningless, before any new
    /// fetch is fired.
    pub fn begin_request(&mut self, stream: K) -> RequestToken {
        let counter = self.latest.entry(stream).or_insert(0);
        *counter += 1;
        RequestToken(*counter)
    }

    /// `true` if `token` is the most recently issued token for `stream`.
    pub fn is_current(&self, stream: K, token: RequestToken) -> bool {
        self.latest.get(&stream).copied() == Some(token.0)
    }

    /// Runs `apply` only if `token` is still current; returns whether it ran.
    pub fn try_commit<F: FnOnce()>(&self, stream: K, token: RequestToken, apply: F) -> bool {
        if self.is_current(stream, token) {
            apply();
            true
        } else {
            false
        }
    }

    /// The most recently issued token for `stream`, if any.
    pub fn current(&self, stream: K) -> Option<RequestToken> {
        self.latest.get(&stream).copied().map(RequestToken)
    }
}
