use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::payments;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = payments, primary_key(reference))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub reference: String,
    pub vote_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_timestamp: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments, primary_key(reference))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPayment<'a> {
    pub reference: &'a str,
    pub vote_id: Uuid,
    pub amount: i64,
    pub status: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub created_timestamp: SystemTime,
}

/// What the settlement transaction should do with a payment/vote pair,
/// given the locally stored status and the gateway's authoritative answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementAction {
    /// The pair was already committed. Return the stored receipt without
    /// touching either row; tallies must not move a second time.
    ReturnExisting,
    /// First successful confirmation. Transition both rows to success.
    Commit,
    /// Gateway reports the charge did not go through. Transition both
    /// rows to failed.
    MarkFailed,
    /// The pair already reached the failed terminal state. Leave it.
    AlreadyFailed,
}

pub fn settlement_action(local_status: &str, gateway_success: bool) -> SettlementAction {
    use crate::models::vote::{STATUS_FAILED, STATUS_SUCCESS};

    if local_status == STATUS_SUCCESS {
        return SettlementAction::ReturnExisting;
    }

    if local_status == STATUS_FAILED {
        return SettlementAction::AlreadyFailed;
    }

    if gateway_success {
        SettlementAction::Commit
    } else {
        SettlementAction::MarkFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::vote::{STATUS_FAILED, STATUS_PENDING, STATUS_SUCCESS};

    #[test]
    fn test_pending_pair_commits_on_gateway_success() {
        assert_eq!(
            settlement_action(STATUS_PENDING, true),
            SettlementAction::Commit,
        );
    }

    #[test]
    fn test_pending_pair_fails_on_gateway_failure() {
        assert_eq!(
            settlement_action(STATUS_PENDING, false),
            SettlementAction::MarkFailed,
        );
    }

    #[test]
    fn test_committed_pair_is_never_recommitted() {
        // A duplicate webhook delivery or a client poll racing the webhook
        // must observe the first commit rather than performing a second one
        assert_eq!(
            settlement_action(STATUS_SUCCESS, true),
            SettlementAction::ReturnExisting,
        );
        assert_eq!(
            settlement_action(STATUS_SUCCESS, false),
            SettlementAction::ReturnExisting,
        );
    }

    #[test]
    fn test_failed_pair_is_terminal() {
        assert_eq!(
            settlement_action(STATUS_FAILED, true),
            SettlementAction::AlreadyFailed,
        );
        assert_eq!(
            settlement_action(STATUS_FAILED, false),
            SettlementAction::AlreadyFailed,
        );
    }
}
