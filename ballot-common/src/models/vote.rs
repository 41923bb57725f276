use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::candidate::Candidate;
use crate::schema::votes;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Candidate, foreign_key = candidate_id))]
#[diesel(table_name = votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Vote {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub voter_email: String,
    pub voter_phone: Option<String>,
    pub vote_count: i32,
    pub amount: i64,
    pub payment_reference: String,
    pub status: String,
    pub created_timestamp: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewVote<'a> {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub voter_email: &'a str,
    pub voter_phone: Option<&'a str>,
    pub vote_count: i32,
    pub amount: i64,
    pub payment_reference: &'a str,
    pub status: &'a str,
    pub created_timestamp: SystemTime,
}

/// Computes the charge for a ballot of `vote_count` votes. The unit price
/// comes from server configuration; a client-supplied amount is never
/// accepted.
pub fn charge_amount(vote_count: i32, unit_price: i64) -> Option<i64> {
    if vote_count < 1 {
        return None;
    }

    i64::from(vote_count).checked_mul(unit_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_amount() {
        assert_eq!(charge_amount(5, 100), Some(500));
        assert_eq!(charge_amount(1, 100), Some(100));
        assert_eq!(charge_amount(0, 100), None);
        assert_eq!(charge_amount(-3, 100), None);
        assert_eq!(charge_amount(i32::MAX, i64::MAX), None);
    }
}
