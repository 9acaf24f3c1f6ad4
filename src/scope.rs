//! Widening-scope retries for sparse data.
//!
//! A barangay often has no sensor of its own. Rather than show nothing, the
//! dashboard retries the same read at the municipality and then globally,
//! and annotates the view when a broader scope was used. The policy is the
//! ordered scope list returned by `fallback_chain`; `resolve` walks it.

use std::future::Future;

use crate::model::{FetchError, Scope};

// ---------------------------------------------------------------------------
// Fallback chain
// ---------------------------------------------------------------------------

/// Scopes to try for `requested`, narrowest first, without duplicates.
///
/// - barangay + municipality → [requested, municipality, global]
/// - barangay only           → [requested, global]
/// - municipality only       → [requested, global]
/// - global                  → [global]
pub fn fallback_chain(requested: Scope) -> Vec<Scope> {
    let mut chain = vec![requested];
    if let (Some(m), Some(_)) = (requested.municipality_id, requested.barangay_id) {
        chain.push(Scope::municipality(m));
    }
    if !requested.is_global() {
        chain.push(Scope::global());
    }
    chain
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What happened when one scope was tried.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted,
    Empty,
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeAttempt {
    pub scope: Scope,
    pub outcome: AttemptOutcome,
}

/// The first non-empty result and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub result: T,
    pub scope_used: Scope,
    /// `true` when `scope_used` is not the first scope in the chain.
    pub was_fallback: bool,
    pub attempts: Vec<ScopeAttempt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Found(Resolved<T>),
    /// Every scope came back empty or failed. Distinct from a single empty
    /// scope so the caller can render "no data across all scopes".
    Exhausted { attempts: Vec<ScopeAttempt> },
}

impl<T> Resolution<T> {
    pub fn attempts(&self) -> &[ScopeAttempt] {
        match self {
            Resolution::Found(found) => &found.attempts,
            Resolution::Exhausted { attempts } => attempts,
        }
    }

    /// Exhausted without a single scope answering: the data is unknown,
    /// not absent.
    pub fn all_failed(&self) -> bool {
        match self {
            Resolution::Found(_) => false,
            Resolution::Exhausted { attempts } => {
                !attempts.is_empty()
                    && attempts
                        .iter()
                        .all(|a| matches!(a.outcome, AttemptOutcome::Failed(_)))
            }
        }
    }

    pub fn was_fallback(&self) -> bool {
        matches!(self, Resolution::Found(found) if found.was_fallback)
    }
}

/// Tries `scopes` strictly in order, awaiting each fetch before the next.
///
/// A result is accepted when `is_empty` is false for it. Fetch errors count
/// as empty for that scope and the walk continues; they are kept in
/// `attempts` so callers can tell "failed everywhere" from "empty everywhere".
pub async fn resolve<T, F, Fut, P>(scopes: &[Scope], mut fetch: F, is_empty: P) -> Resolution<T>
where
    F: FnMut(Scope) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    P: Fn(&T) -> bool,
{
    let mut attempts = Vec::with_capacity(scopes.len());

    for (index, scope) in scopes.iter().copied().enumerate() {
        match fetch(scope).await {
            Ok(result) if !is_empty(&result) => {
                attempts.push(ScopeAttempt {
                    scope,
                    outcome: AttemptOutcome::Accepted,
                });
                return Resolution::Found(Resolved {
                    result,
                    scope_used: scope,
                    was_fallback: index > 0,
                    attempts,
                });
            }
            Ok(_) => attempts.push(ScopeAttempt {
                scope,
                outcome: AttemptOutcome::Empty,
            }),
            Err(err) => attempts.push(ScopeAttempt {
                scope,
                outcome: AttemptOutcome::Failed(err),
            }),
        }
    }

    Resolution::Exhausted { attempts }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
