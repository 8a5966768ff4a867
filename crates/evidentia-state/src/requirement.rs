//! # Requirement Compliance Status
//!
//! Status is derived on every read from the maintained evidence counter and
//! the next due date. It is never stored as the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Days before the due date at which a requirement becomes at risk.
pub const AT_RISK_WINDOW_DAYS: i64 = 7;

/// Derived compliance status of an activated requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    /// No evidence attached.
    NotStarted,
    /// Work has begun but the requirement is not yet satisfied.
    InProgress,
    /// Evidence attached and not close to due.
    Compliant,
    /// Due within the at-risk window.
    AtRisk,
    /// Past due.
    NonCompliant,
}

impl RequirementStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Compliant => "compliant",
            Self::AtRisk => "at_risk",
            Self::NonCompliant => "non_compliant",
        }
    }
}

impl std::fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole 24-hour periods from `now` until `due`, truncated toward zero.
pub fn days_until_due(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due - now).num_days()
}

/// Derive the status from the evidence count, the optional due date, and
/// the current instant.
pub fn derive_status(
    evidence_count: i64,
    next_due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> RequirementStatus {
    if evidence_count <= 0 {
        return RequirementStatus::NotStarted;
    }
    let Some(due) = next_due_date else {
        return RequirementStatus::Compliant;
    };

    let days = days_until_due(due, now);
    if days < 0 {
        RequirementStatus::NonCompliant
    } else if days <= AT_RISK_WINDOW_DAYS {
        RequirementStatus::AtRisk
    } else {
        RequirementStatus::Compliant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn zero_evidence_is_not_started_regardless_of_due() {
        assert_eq!(derive_status(0, None, now()), RequirementStatus::NotStarted);
        assert_eq!(
            derive_status(0, Some(now() - Duration::days(10)), now()),
            RequirementStatus::NotStarted
        );
    }

    #[test]
    fn evidence_without_due_date_is_compliant() {
        assert_eq!(derive_status(1, None, now()), RequirementStatus::Compliant);
    }

    #[test]
    fn due_yesterday_is_non_compliant() {
        assert_eq!(
            derive_status(2, Some(now() - Duration::days(1)), now()),
            RequirementStatus::NonCompliant
        );
    }

    #[test]
    fn due_in_three_days_is_at_risk() {
        assert_eq!(
            derive_status(1, Some(now() + Duration::days(3)), now()),
            RequirementStatus::AtRisk
        );
    }

    #[test]
    fn due_in_thirty_days_is_compliant() {
        assert_eq!(
            derive_status(1, Some(now() + Duration::days(30)), now()),
            RequirementStatus::Compliant
        );
    }

    #[test]
    fn window_boundaries() {
        // Seven full days out is still at risk; eight is not.
        assert_eq!(
            derive_status(1, Some(now() + Duration::days(7)), now()),
            RequirementStatus::AtRisk
        );
        assert_eq!(
            derive_status(1, Some(now() + Duration::days(8)), now()),
            RequirementStatus::Compliant
        );
        // Less than one full day overdue truncates to zero.
        assert_eq!(
            derive_status(1, Some(now() - Duration::hours(23)), now()),
            RequirementStatus::AtRisk
        );
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&RequirementStatus::NonCompliant).unwrap(),
            "\"non_compliant\""
        );
        assert_eq!(RequirementStatus::AtRisk.to_string(), "at_risk");
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic(count in 0i64..50, offset_hours in -2000i64..2000) {
            let due = Some(now() + Duration::hours(offset_hours));
            prop_assert_eq!(derive_status(count, due, now()), derive_status(count, due, now()));
        }

        #[test]
        fn in_progress_is_never_derived(count in 0i64..50, offset_hours in proptest::option::of(-2000i64..2000)) {
            let due = offset_hours.map(|h| now() + Duration::hours(h));
            prop_assert_ne!(derive_status(count, due, now()), RequirementStatus::InProgress);
        }
    }
}
