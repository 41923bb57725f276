use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::position::Position;
use crate::schema::candidates;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Position, foreign_key = position_id))]
#[diesel(table_name = candidates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Candidate {
    pub id: Uuid,
    pub position_id: Uuid,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = candidates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewCandidate<'a> {
    pub id: Uuid,
    pub position_id: Uuid,
    pub name: &'a str,
}
