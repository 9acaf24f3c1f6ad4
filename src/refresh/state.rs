//! Per-kind refresh state machine.
//!
//! ```text
//!   Idle ──begin──▶ Fetching ──commit (current token)──▶ Idle
//!                      │
//!                      └──commit (superseded token)──▶ unchanged
//! ```
//!
//! A superseded response leaves the phase alone: either a newer request is
//! still in flight (phase stays `Fetching`) or the kind was invalidated and
//! is already `Idle`.

use std::collections::HashMap;

use serde::Serialize;

use crate::fence::{RequestFence, RequestToken};
use crate::model::DataKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    #[default]
    Idle,
    Fetching,
}

/// How one refresh of one kind ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Data applied to the view model.
    Committed,
    /// An explicit empty state applied to the view model.
    CommittedEmpty,
    /// Superseded by a newer request; view model untouched.
    StaleDiscarded,
    /// Every fetch failed; the kind is shown as unavailable.
    Failed,
    /// A tick arrived while the kind was already fetching.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct KindState {
    pub phase: RefreshPhase,
    pub in_flight: Option<RequestToken>,
    pub last_outcome: Option<RefreshOutcome>,
}

/// Fence tokens plus phase bookkeeping for every data kind.
#[derive(Debug, Default)]
pub struct RefreshBook {
    fence: RequestFence<DataKind>,
    kinds: HashMap<DataKind, KindState>,
}

impl RefreshBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: DataKind) -> KindState {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    pub fn phase(&self, kind: DataKind) -> RefreshPhase {
        self.state(kind).phase
    }

    /// Starts a fetch unconditionally, superseding any in flight.
    pub fn begin(&mut self, kind: DataKind) -> RequestToken {
        let token = self.fence.begin_request(kind);
        let state = self.kinds.entry(kind).or_default();
        state.phase = RefreshPhase::Fetching;
        state.in_flight = Some(token);
        token
    }

    /// Starts a fetch only when the kind is idle.
    pub fn try_begin(&mut self, kind: DataKind) -> Option<RequestToken> {
        match self.phase(kind) {
            RefreshPhase::Fetching => None,
            RefreshPhase::Idle => Some(self.begin(kind)),
        }
    }

    /// Bumps the token without starting a fetch, so every in-flight result
    /// for `kind` is refused at commit.
    pub fn invalidate(&mut self, kind: DataKind) {
        self.fence.begin_request(kind);
        let state = self.kinds.entry(kind).or_default();
        state.phase = RefreshPhase::Idle;
        state.in_flight = None;
    }

    /// Applies a finished fetch if `token` is still current.
    ///
    /// Returns `outcome` when applied, `StaleDiscarded` otherwise.
    pub fn commit<F: FnOnce()>(
        &mut self,
        kind: DataKind,
        token: RequestToken,
        outcome: RefreshOutcome,
        apply: F,
    ) -> RefreshOutcome {
        let applied = self.fence.try_commit(kind, token, apply);
        let state = self.kinds.entry(kind).or_default();
        if applied {
            state.phase = RefreshPhase::Idle;
            state.in_flight = None;
            state.last_outcome = Some(outcome);
            outcome
        } else {
            state.last_outcome = Some(RefreshOutcome::StaleDiscarded);
            RefreshOutcome::StaleDiscarded
        }
    }

    /// Records a tick refused by the re-entrancy guard.
    pub fn skip(&mut self, kind: DataKind) {
        self.kinds.entry(kind).or_default().last_outcome = Some(RefreshOutcome::Skipped);
    }
}
