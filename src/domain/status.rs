//! Withdrawal lifecycle and the transition tables that govern it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    UnderReview,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Rejected,
}

/// Who is asking for a status change. Admins drive the review flow, creators
/// may only withdraw their own request before anyone has looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Creator,
}

/// How a withdrawal in a given status counts against the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceBucket {
    /// Funds are held for an in-flight payout.
    Reserved,
    /// Funds have left the platform.
    Withdrawn,
    /// Funds never left; the amount is available again.
    Refunded,
}

use WithdrawalStatus::*;

/// Admin review flow. PENDING may also move to UNDER_REVIEW, which is
/// otherwise unreachable, and straight to REJECTED so a request can be
/// turned down without a review step.
const ADMIN_TRANSITIONS: &[(WithdrawalStatus, &[WithdrawalStatus])] = &[
    (Pending, &[UnderReview, Completed, Failed, Rejected]),
    (UnderReview, &[Processing, Rejected]),
    (Processing, &[Completed, Failed]),
    (Failed, &[Processing, Cancelled]),
    (Completed, &[]),
    (Cancelled, &[]),
    (Rejected, &[]),
];

const CREATOR_TRANSITIONS: &[(WithdrawalStatus, &[WithdrawalStatus])] =
    &[(Pending, &[Cancelled])];

impl WithdrawalStatus {
    pub const ALL: [WithdrawalStatus; 7] = [
        Pending,
        UnderReview,
        Processing,
        Completed,
        Failed,
        Cancelled,
        Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pending => "PENDING",
            UnderReview => "UNDER_REVIEW",
            Processing => "PROCESSING",
            Completed => "COMPLETED",
            Failed => "FAILED",
            Cancelled => "CANCELLED",
            Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Completed | Cancelled | Rejected)
    }

    pub fn bucket(self) -> BalanceBucket {
        match self {
            Pending | UnderReview | Processing => BalanceBucket::Reserved,
            Completed => BalanceBucket::Withdrawn,
            Failed | Cancelled | Rejected => BalanceBucket::Refunded,
        }
    }

    pub fn allowed_transitions(self, actor: Actor) -> &'static [WithdrawalStatus] {
        let table = match actor {
            Actor::Admin => ADMIN_TRANSITIONS,
            Actor::Creator => CREATOR_TRANSITIONS,
        };

        table
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(self, next: WithdrawalStatus, actor: Actor) -> bool {
        self.allowed_transitions(actor).contains(&next)
    }

    /// Moving from a refunded status back into a reserving one takes funds
    /// out of the wallet again, so the balance has to be re-checked.
    pub fn reserves_funds_from(self, previous: WithdrawalStatus) -> bool {
        previous.bucket() == BalanceBucket::Refunded && self.bucket() != BalanceBucket::Refunded
    }
}

impl BalanceBucket {
    /// Status codes as stored in the `withdrawals.status` column.
    pub fn status_codes(self) -> Vec<String> {
        WithdrawalStatus::ALL
            .iter()
            .filter(|status| status.bucket() == self)
            .map(|status| status.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        WithdrawalStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown withdrawal status '{}', expected one of: {}",
                    s,
                    WithdrawalStatus::ALL
                        .iter()
                        .map(|status| status.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_table() -> Vec<(WithdrawalStatus, WithdrawalStatus)> {
        vec![
            (Pending, UnderReview),
            (Pending, Completed),
            (Pending, Failed),
            (Pending, Rejected),
            (UnderReview, Processing),
            (UnderReview, Rejected),
            (Processing, Completed),
            (Processing, Failed),
            (Failed, Processing),
            (Failed, Cancelled),
        ]
    }

    #[test]
    fn admin_transitions_are_exactly_the_table() {
        let allowed = admin_table();
        for from in WithdrawalStatus::ALL {
            for to in WithdrawalStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to, Actor::Admin),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn every_status_is_reachable_from_pending() {
        let mut seen = vec![Pending];
        let mut frontier = vec![Pending];
        while let Some(status) = frontier.pop() {
            for next in status.allowed_transitions(Actor::Admin) {
                if !seen.contains(next) {
                    seen.push(*next);
                    frontier.push(*next);
                }
            }
        }

        for status in WithdrawalStatus::ALL {
            assert!(seen.contains(&status), "{} unreachable", status);
        }
    }

    #[test]
    fn creators_can_only_cancel_pending() {
        for from in WithdrawalStatus::ALL {
            for to in WithdrawalStatus::ALL {
                let expected = from == Pending && to == Cancelled;
                assert_eq!(from.can_transition_to(to, Actor::Creator), expected);
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_exit() {
        for status in WithdrawalStatus::ALL {
            if status.is_terminal() {
                assert!(status.allowed_transitions(Actor::Admin).is_empty());
                assert!(status.allowed_transitions(Actor::Creator).is_empty());
            }
        }
        assert!(!Failed.is_terminal());
        assert!(Completed.is_terminal());
    }

    #[test]
    fn buckets_partition_all_statuses() {
        let reserved = BalanceBucket::Reserved.status_codes();
        let withdrawn = BalanceBucket::Withdrawn.status_codes();
        let refunded = BalanceBucket::Refunded.status_codes();

        assert_eq!(reserved, vec!["PENDING", "UNDER_REVIEW", "PROCESSING"]);
        assert_eq!(withdrawn, vec!["COMPLETED"]);
        assert_eq!(refunded, vec!["FAILED", "CANCELLED", "REJECTED"]);
        assert_eq!(reserved.len() + withdrawn.len() + refunded.len(), 7);
    }

    #[test]
    fn retry_after_failure_reserves_funds() {
        assert!(Processing.reserves_funds_from(Failed));
        assert!(!Cancelled.reserves_funds_from(Failed));
        assert!(!Completed.reserves_funds_from(Processing));
        assert!(!Rejected.reserves_funds_from(Pending));
    }

    #[test]
    fn parses_status_codes() {
        assert_eq!("PENDING".parse::<WithdrawalStatus>().unwrap(), Pending);
        assert_eq!("under_review".parse::<WithdrawalStatus>().unwrap(), UnderReview);
        assert_eq!("under-review".parse::<WithdrawalStatus>().unwrap(), UnderReview);
        assert!("SETTLED".parse::<WithdrawalStatus>().is_err());
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        assert_eq!(serde_json::to_value(UnderReview).unwrap(), "UNDER_REVIEW");
        let parsed: WithdrawalStatus = serde_json::from_str("\"REJECTED\"").unwrap();
        assert_eq!(parsed, Rejected);
    }
}
