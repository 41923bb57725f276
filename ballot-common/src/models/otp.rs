use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::otps;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = otps, primary_key(admin_email))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OtpRecord {
    pub admin_email: String,
    pub code_hash: Vec<u8>,
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
    pub attempts_used: i16,
    pub attempts_max: i16,
    pub consumed_at: Option<SystemTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = otps, primary_key(admin_email))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewOtpRecord<'a> {
    pub admin_email: &'a str,
    pub code_hash: &'a [u8],
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
    pub attempts_used: i16,
    pub attempts_max: i16,
    pub consumed_at: Option<SystemTime>,
}
