//! # Evidence Lifecycle Typestate
//!
//! ```text
//! UPLOADING ─complete()──▶ ACTIVE ─delete()──▶ DELETED
//!                           │  ▲
//!                           └──┘ reassociate()
//! ```
//!
//! Each state is a distinct type, so `Evidence<Deleted>` has no
//! `reassociate()` and `Evidence<Uploading>` has no `delete()`. Every
//! transition that changes the association set returns a
//! [`CounterAdjustment`]: the exact requirement counters to increment and
//! decrement so that each requirement's `evidence_count` equals the number
//! of active evidence items referencing it.
//!
//! Records arrive from storage with a runtime [`EvidenceStatus`]; the
//! `resume` constructors re-enter the typestate and refuse records that
//! are in the wrong state.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ── State Types ──────────────────────────────────────────────────────

/// An upload URL has been issued; the file may not exist yet.
#[derive(Debug, Clone, Copy)]
pub struct Uploading;

/// Upload completed; the evidence counts toward its requirements.
#[derive(Debug, Clone, Copy)]
pub struct Active;

/// Soft-deleted. Terminal.
#[derive(Debug, Clone, Copy)]
pub struct Deleted;

/// Marker trait for evidence states. Sealed.
pub trait EvidenceState: private::Sealed + std::fmt::Debug {
    /// Runtime status corresponding to this state.
    fn status() -> EvidenceStatus;
    /// Whether no further transitions exist.
    fn is_terminal() -> bool {
        false
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Uploading {}
    impl Sealed for super::Active {}
    impl Sealed for super::Deleted {}
}

impl EvidenceState for Uploading {
    fn status() -> EvidenceStatus {
        EvidenceStatus::Uploading
    }
}
impl EvidenceState for Active {
    fn status() -> EvidenceStatus {
        EvidenceStatus::Active
    }
}
impl EvidenceState for Deleted {
    fn status() -> EvidenceStatus {
        EvidenceStatus::Deleted
    }
    fn is_terminal() -> bool {
        true
    }
}

// ── Runtime Status ───────────────────────────────────────────────────

/// Stored form of the evidence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// Upload URL issued.
    Uploading,
    /// Completed and live.
    Active,
    /// Soft-deleted.
    Deleted,
}

impl EvidenceStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uploading" => Some(Self::Uploading),
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Lifecycle violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    /// The stored record is not in the state the operation requires.
    #[error("evidence is {actual}, expected {expected}")]
    InvalidTransition {
        /// State the operation needs.
        expected: EvidenceStatus,
        /// State the record is in.
        actual: EvidenceStatus,
    },
}

// ── Counter Adjustment ───────────────────────────────────────────────

/// Requirement counters to move as the result of one transition.
///
/// The two sets are disjoint. A requirement present in both the old and the
/// new association set appears in neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterAdjustment {
    /// Requirements whose `evidence_count` goes up by one.
    pub increments: BTreeSet<Uuid>,
    /// Requirements whose `evidence_count` goes down by one.
    pub decrements: BTreeSet<Uuid>,
}

impl CounterAdjustment {
    /// Whether applying the adjustment is a no-op.
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.decrements.is_empty()
    }

    /// `(requirement_id, delta)` pairs in a stable order.
    pub fn deltas(&self) -> Vec<(Uuid, i64)> {
        self.increments
            .iter()
            .map(|id| (*id, 1))
            .chain(self.decrements.iter().map(|id| (*id, -1)))
            .collect()
    }

    fn between(before: &BTreeSet<Uuid>, after: &BTreeSet<Uuid>) -> Self {
        Self {
            increments: after.difference(before).copied().collect(),
            decrements: before.difference(after).copied().collect(),
        }
    }
}

// ── The Evidence ─────────────────────────────────────────────────────

/// An evidence item's lifecycle view: its identity and the set of
/// requirements it counts toward, parameterized by state.
#[derive(Debug, Clone)]
pub struct Evidence<S: EvidenceState> {
    /// Evidence identifier.
    pub id: Uuid,
    requirement_ids: BTreeSet<Uuid>,
    _state: PhantomData<S>,
}

impl<S: EvidenceState> Evidence<S> {
    /// Runtime status of the current state.
    pub fn status(&self) -> EvidenceStatus {
        S::status()
    }

    /// Whether the evidence is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        S::is_terminal()
    }

    /// Associated requirement ids, deduplicated and ordered.
    pub fn requirement_ids(&self) -> &BTreeSet<Uuid> {
        &self.requirement_ids
    }

    fn transmute_to<T: EvidenceState>(self, requirement_ids: BTreeSet<Uuid>) -> Evidence<T> {
        Evidence {
            id: self.id,
            requirement_ids,
            _state: PhantomData,
        }
    }
}

impl Evidence<Uploading> {
    /// A freshly issued upload with no associations.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            requirement_ids: BTreeSet::new(),
            _state: PhantomData,
        }
    }

    /// Re-enter the typestate from a stored record.
    pub fn resume(id: Uuid, status: EvidenceStatus) -> Result<Self, EvidenceError> {
        expect_status(EvidenceStatus::Uploading, status)?;
        Ok(Self::new(id))
    }

    /// Complete the upload and attach it to requirements.
    ///
    /// Duplicate ids collapse. Every attached requirement is incremented.
    pub fn complete<I>(self, requirement_ids: I) -> (Evidence<Active>, CounterAdjustment)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let ids: BTreeSet<Uuid> = requirement_ids.into_iter().collect();
        let adjustment = CounterAdjustment {
            increments: ids.clone(),
            decrements: BTreeSet::new(),
        };
        (self.transmute_to(ids), adjustment)
    }
}

impl Evidence<Active> {
    /// Re-enter the typestate from a stored active record.
    pub fn resume<I>(id: Uuid, status: EvidenceStatus, requirement_ids: I) -> Result<Self, EvidenceError>
    where
        I: IntoIterator<Item = Uuid>,
    {
        expect_status(EvidenceStatus::Active, status)?;
        Ok(Self {
            id,
            requirement_ids: requirement_ids.into_iter().collect(),
            _state: PhantomData,
        })
    }

    /// Replace the association set. Only requirements entering or leaving
    /// the set are adjusted.
    pub fn reassociate<I>(self, requirement_ids: I) -> (Evidence<Active>, CounterAdjustment)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let next: BTreeSet<Uuid> = requirement_ids.into_iter().collect();
        let adjustment = CounterAdjustment::between(&self.requirement_ids, &next);
        (self.transmute_to(next), adjustment)
    }

    /// Soft-delete. Every associated requirement is decremented.
    pub fn delete(self) -> (Evidence<Deleted>, CounterAdjustment) {
        let adjustment = CounterAdjustment {
            increments: BTreeSet::new(),
            decrements: self.requirement_ids.clone(),
        };
        let ids = self.requirement_ids.clone();
        (self.transmute_to(ids), adjustment)
    }
}

fn expect_status(expected: EvidenceStatus, actual: EvidenceStatus) -> Result<(), EvidenceError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvidenceError::InvalidTransition { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn complete_increments_each_requirement_once() {
        let reqs = ids(2);
        let (active, adj) = Evidence::new(Uuid::new_v4())
            .complete(vec![reqs[0], reqs[1], reqs[0]]);
        assert_eq!(active.status(), EvidenceStatus::Active);
        assert_eq!(active.requirement_ids().len(), 2);
        assert_eq!(adj.increments.len(), 2);
        assert!(adj.decrements.is_empty());
    }

    #[test]
    fn reassociate_moves_only_the_difference() {
        let reqs = ids(3);
        let (active, _) = Evidence::new(Uuid::new_v4()).complete(vec![reqs[0], reqs[1]]);
        let (active, adj) = active.reassociate(vec![reqs[1], reqs[2]]);
        assert_eq!(adj.increments, BTreeSet::from([reqs[2]]));
        assert_eq!(adj.decrements, BTreeSet::from([reqs[0]]));
        assert_eq!(active.requirement_ids(), &BTreeSet::from([reqs[1], reqs[2]]));
    }

    #[test]
    fn reassociate_to_same_set_is_noop() {
        let reqs = ids(2);
        let (active, _) = Evidence::new(Uuid::new_v4()).complete(reqs.clone());
        let (_, adj) = active.reassociate(reqs);
        assert!(adj.is_empty());
    }

    #[test]
    fn delete_decrements_everything_and_is_terminal() {
        let reqs = ids(2);
        let (active, _) = Evidence::new(Uuid::new_v4()).complete(reqs.clone());
        let (deleted, adj) = active.delete();
        assert!(deleted.is_terminal());
        assert_eq!(deleted.status(), EvidenceStatus::Deleted);
        assert_eq!(adj.decrements, reqs.into_iter().collect::<BTreeSet<_>>());
        assert!(adj.increments.is_empty());
    }

    #[test]
    fn resume_rejects_wrong_state() {
        let err = Evidence::<Uploading>::resume(Uuid::new_v4(), EvidenceStatus::Active).unwrap_err();
        assert_eq!(
            err,
            EvidenceError::InvalidTransition {
                expected: EvidenceStatus::Uploading,
                actual: EvidenceStatus::Active,
            }
        );
        assert!(Evidence::<Active>::resume(Uuid::new_v4(), EvidenceStatus::Deleted, vec![]).is_err());
    }

    #[test]
    fn deltas_order_increments_first() {
        let reqs = ids(2);
        let adj = CounterAdjustment {
            increments: BTreeSet::from([reqs[0]]),
            decrements: BTreeSet::from([reqs[1]]),
        };
        assert_eq!(adj.deltas(), vec![(reqs[0], 1), (reqs[1], -1)]);
    }

    #[test]
    fn status_names_round_trip() {
        for s in [EvidenceStatus::Uploading, EvidenceStatus::Active, EvidenceStatus::Deleted] {
            assert_eq!(EvidenceStatus::from_name(s.as_str()), Some(s));
        }
        assert_eq!(EvidenceStatus::from_name("pending"), None);
    }

    proptest! {
        /// After any sequence of re-associations and a final delete, the
        /// summed deltas for every requirement are zero.
        #[test]
        fn counters_balance_over_full_lifecycle(
            picks in proptest::collection::vec(proptest::collection::vec(0usize..6, 0..6), 1..8)
        ) {
            let pool = ids(6);
            let mut totals: HashMap<Uuid, i64> = HashMap::new();
            fn apply(totals: &mut HashMap<Uuid, i64>, adj: &CounterAdjustment) {
                for (id, d) in adj.deltas() {
                    *totals.entry(id).or_default() += d;
                }
            }

            let first = picks[0].iter().map(|i| pool[*i]);
            let (mut active, adj) = Evidence::new(Uuid::new_v4()).complete(first);
            apply(&mut totals, &adj);

            for step in &picks[1..] {
                let (next, adj) = active.reassociate(step.iter().map(|i| pool[*i]));
                apply(&mut totals, &adj);
                // Live count equals membership after every step.
                for id in &pool {
                    let expected = i64::from(next.requirement_ids().contains(id));
                    prop_assert_eq!(totals.get(id).copied().unwrap_or(0), expected);
                }
                active = next;
            }

            let (_, adj) = active.delete();
            apply(&mut totals, &adj);
            prop_assert!(totals.values().all(|v| *v == 0));
        }
    }
}
