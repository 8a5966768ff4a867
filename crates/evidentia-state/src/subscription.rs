//! # Subscription and Seat Limits
//!
//! A tenant's subscription caps how many users may be active at once. Only
//! active users occupy seats; pending invitations do not.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use evidentia_core::SubscriptionTier;

/// Length of the trial period granted at registration.
pub const TRIAL_DAYS: i64 = 30;

/// Billing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial after registration.
    Trial,
    /// Paid and current.
    Active,
    /// Payment failed.
    PastDue,
    /// Ended.
    Canceled,
}

impl SubscriptionStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "trial" => Some(Self::Trial),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

/// Seat capacity exceeded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeatLimitError {
    /// Adding a user would exceed the tier's limit.
    #[error("user limit reached. Please upgrade to add more users (current limit: {limit})")]
    LimitReached {
        /// The tier's `max_users`.
        limit: u32,
    },

    /// The target tier holds fewer seats than are currently in use.
    #[error("cannot change to {tier} plan: {active_users} active users exceed its limit of {limit}")]
    DowngradeBelowUsage {
        /// Requested tier.
        tier: SubscriptionTier,
        /// Active users right now.
        active_users: u32,
        /// Seat limit of the requested tier.
        limit: u32,
    },
}

/// Fail when another active user would not fit.
pub fn ensure_seat_available(active_users: u32, max_users: u32) -> Result<(), SeatLimitError> {
    if active_users >= max_users {
        Err(SeatLimitError::LimitReached { limit: max_users })
    } else {
        Ok(())
    }
}

/// A tenant's subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Billing tier.
    pub tier: SubscriptionTier,
    /// Billing status.
    pub status: SubscriptionStatus,
    /// Seat limit, copied from the tier.
    pub max_users: u32,
    /// Monthly price in US dollars, copied from the tier.
    pub monthly_price: f64,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
    /// Whether the subscription ends when the current period does.
    pub cancel_at_period_end: bool,
}

impl Subscription {
    /// The lowest tier on a trial starting `now`.
    pub fn starter_trial(now: DateTime<Utc>) -> Self {
        let tier = SubscriptionTier::lowest();
        Self {
            tier,
            status: SubscriptionStatus::Trial,
            max_users: tier.max_users(),
            monthly_price: tier.monthly_price(),
            current_period_start: now,
            current_period_end: now + Duration::days(TRIAL_DAYS),
            cancel_at_period_end: false,
        }
    }

    /// Move to another tier, recomputing seats and price. Returns the
    /// previous tier.
    pub fn change_tier(
        &mut self,
        tier: SubscriptionTier,
        active_users: u32,
    ) -> Result<SubscriptionTier, SeatLimitError> {
        if tier.max_users() < active_users {
            return Err(SeatLimitError::DowngradeBelowUsage {
                tier,
                active_users,
                limit: tier.max_users(),
            });
        }
        let previous = self.tier;
        self.tier = tier;
        self.max_users = tier.max_users();
        self.monthly_price = tier.monthly_price();
        Ok(previous)
    }

    /// Schedule the end of the subscription at the close of the current
    /// period.
    pub fn schedule_cancellation(&mut self) {
        self.cancel_at_period_end = true;
    }

    /// Whether one more active user fits.
    pub fn ensure_seat_available(&self, active_users: u32) -> Result<(), SeatLimitError> {
        ensure_seat_available(active_users, self.max_users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_trial_is_starter_for_thirty_days() {
        let now = Utc::now();
        let sub = Subscription::starter_trial(now);
        assert_eq!(sub.tier, SubscriptionTier::Starter);
        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert_eq!(sub.max_users, 10);
        assert_eq!(sub.current_period_end - sub.current_period_start, Duration::days(30));
        assert!(!sub.cancel_at_period_end);
    }

    #[test]
    fn seat_limit_message_names_limit() {
        let err = ensure_seat_available(10, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "user limit reached. Please upgrade to add more users (current limit: 10)"
        );
        assert!(ensure_seat_available(9, 10).is_ok());
    }

    #[test]
    fn upgrade_recomputes_limits() {
        let mut sub = Subscription::starter_trial(Utc::now());
        let prev = sub.change_tier(SubscriptionTier::Professional, 4).unwrap();
        assert_eq!(prev, SubscriptionTier::Starter);
        assert_eq!(sub.max_users, 25);
        assert_eq!(sub.monthly_price, 349.00);
    }

    #[test]
    fn downgrade_below_active_users_is_refused() {
        let mut sub = Subscription::starter_trial(Utc::now());
        sub.change_tier(SubscriptionTier::Business, 1).unwrap();
        let err = sub.change_tier(SubscriptionTier::Starter, 12).unwrap_err();
        assert!(matches!(err, SeatLimitError::DowngradeBelowUsage { limit: 10, .. }));
        assert_eq!(sub.tier, SubscriptionTier::Business);
    }

    #[test]
    fn cancel_keeps_tier() {
        let mut sub = Subscription::starter_trial(Utc::now());
        sub.schedule_cancellation();
        assert!(sub.cancel_at_period_end);
        assert_eq!(sub.tier, SubscriptionTier::Starter);
    }
}
