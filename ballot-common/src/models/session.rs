use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::admin::Admin;
use crate::schema::sessions;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Admin, foreign_key = admin_id))]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub csrf_token: String,
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSession<'a> {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub csrf_token: &'a str,
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
}
