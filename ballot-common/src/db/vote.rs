use diesel::{dsl, ExpressionMethods, JoinOnDsl, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::candidate::Candidate;
use crate::models::payment::{self, NewPayment, Payment, SettlementAction};
use crate::models::position::Position;
use crate::models::vote::{NewVote, Vote, STATUS_FAILED, STATUS_SUCCESS};
use crate::schema::candidates as candidate_fields;
use crate::schema::candidates::dsl::candidates;
use crate::schema::payments as payment_fields;
use crate::schema::payments::dsl::payments;
use crate::schema::positions as position_fields;
use crate::schema::positions::dsl::positions;
use crate::schema::votes as vote_fields;
use crate::schema::votes::dsl::votes;

/// The outcome of a settlement transaction. `newly_committed` is true only
/// for the single invocation that moved the pair out of pending into
/// success; repeated verifications of an already-settled reference get the
/// stored rows back unchanged.
pub struct Settlement {
    pub payment: Payment,
    pub vote: Vote,
    pub newly_committed: bool,
}

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn get_candidate_and_position(
        &self,
        candidate_id: Uuid,
        position_id: Uuid,
    ) -> Result<(Candidate, Position), DaoError> {
        Ok(candidates
            .inner_join(positions.on(position_fields::id.eq(candidate_fields::position_id)))
            .filter(candidate_fields::id.eq(candidate_id))
            .filter(candidate_fields::position_id.eq(position_id))
            .get_result::<(Candidate, Position)>(&mut self.db_thread_pool.get()?)?)
    }

    /// Persists the payment and its pending vote together. Either both
    /// rows exist afterward or neither does.
    pub fn create_pending_vote_and_payment(
        &self,
        new_vote: &NewVote,
        new_payment: &NewPayment,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                dsl::insert_into(votes).values(new_vote).execute(conn)?;
                dsl::insert_into(payments).values(new_payment).execute(conn)?;

                Ok(())
            })?;

        Ok(())
    }

    pub fn find_payment(&self, reference: &str) -> Result<Payment, DaoError> {
        Ok(payments
            .find(reference)
            .get_result::<Payment>(&mut self.db_thread_pool.get()?)?)
    }

    /// Applies the gateway's verdict to a payment/vote pair. Both rows are
    /// locked for the duration of the check-and-update, so two verify
    /// calls racing on the same reference serialize here and only one of
    /// them can observe the pending state.
    pub fn settle_payment(
        &self,
        reference: &str,
        gateway_success: bool,
    ) -> Result<Settlement, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let settlement = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let payment = payments
                    .find(reference)
                    .for_update()
                    .get_result::<Payment>(conn)?;

                let vote = votes
                    .find(payment.vote_id)
                    .for_update()
                    .get_result::<Vote>(conn)?;

                match payment::settlement_action(&payment.status, gateway_success) {
                    SettlementAction::ReturnExisting | SettlementAction::AlreadyFailed => {
                        Ok(Settlement {
                            payment,
                            vote,
                            newly_committed: false,
                        })
                    }
                    SettlementAction::Commit => {
                        let payment = dsl::update(payments.find(reference))
                            .set(payment_fields::status.eq(STATUS_SUCCESS))
                            .get_result::<Payment>(conn)?;

                        let vote = dsl::update(votes.find(vote.id))
                            .set(vote_fields::status.eq(STATUS_SUCCESS))
                            .get_result::<Vote>(conn)?;

                        Ok(Settlement {
                            payment,
                            vote,
                            newly_committed: true,
                        })
                    }
                    SettlementAction::MarkFailed => {
                        let payment = dsl::update(payments.find(reference))
                            .set(payment_fields::status.eq(STATUS_FAILED))
                            .get_result::<Payment>(conn)?;

                        let vote = dsl::update(votes.find(vote.id))
                            .set(vote_fields::status.eq(STATUS_FAILED))
                            .get_result::<Vote>(conn)?;

                        Ok(Settlement {
                            payment,
                            vote,
                            newly_committed: false,
                        })
                    }
                }
            })?;

        Ok(settlement)
    }

    /// Tallies are always derived from successful votes; pending and
    /// failed rows never count.
    pub fn get_results(&self) -> Result<Vec<(Uuid, String, String, i64)>, DaoError> {
        let rows = votes
            .inner_join(candidates.on(candidate_fields::id.eq(vote_fields::candidate_id)))
            .inner_join(positions.on(position_fields::id.eq(vote_fields::position_id)))
            .filter(vote_fields::status.eq(STATUS_SUCCESS))
            .group_by((candidate_fields::id, candidate_fields::name, position_fields::name))
            .select((
                candidate_fields::id,
                candidate_fields::name,
                position_fields::name,
                dsl::sum(vote_fields::vote_count),
            ))
            .load::<(Uuid, String, String, Option<i64>)>(&mut self.db_thread_pool.get()?)?;

        Ok(rows
            .into_iter()
            .map(|(id, candidate_name, position_name, total)| {
                (id, candidate_name, position_name, total.unwrap_or(0))
            })
            .collect())
    }
}
