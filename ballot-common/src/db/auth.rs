use diesel::{dsl, ExpressionMethods, JoinOnDsl, QueryDsl, RunQueryDsl};
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::admin::Admin;
use crate::models::otp::{NewOtpRecord, OtpRecord};
use crate::models::session::{NewSession, Session};
use crate::otp::{self, OtpOutcome, OtpSnapshot};
use crate::schema::admins as admin_fields;
use crate::schema::admins::dsl::admins;
use crate::schema::otps as otp_fields;
use crate::schema::otps::dsl::otps;
use crate::schema::sessions as session_fields;
use crate::schema::sessions::dsl::sessions;

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn get_admin_by_email(&self, admin_email: &str) -> Result<Admin, DaoError> {
        Ok(admins
            .filter(admin_fields::email.eq(admin_email))
            .get_result::<Admin>(&mut self.db_thread_pool.get()?)?)
    }

    /// Saves a freshly issued OTP for an email, overwriting any previous
    /// record. Reissuing resets the attempt counter and clears the
    /// consumed marker, so a new code always starts with a full budget.
    pub fn save_otp(
        &self,
        admin_email: &str,
        code_hash: &[u8],
        expiration: SystemTime,
        attempts_max: i16,
    ) -> Result<(), DaoError> {
        let now = SystemTime::now();

        let new_otp = NewOtpRecord {
            admin_email,
            code_hash,
            created_timestamp: now,
            expiration,
            attempts_used: 0,
            attempts_max,
            consumed_at: None,
        };

        dsl::insert_into(otps)
            .values(&new_otp)
            .on_conflict(otp_fields::admin_email)
            .do_update()
            .set((
                otp_fields::code_hash.eq(code_hash),
                otp_fields::created_timestamp.eq(now),
                otp_fields::expiration.eq(expiration),
                otp_fields::attempts_used.eq(0i16),
                otp_fields::attempts_max.eq(attempts_max),
                otp_fields::consumed_at.eq(Option::<SystemTime>::None),
            ))
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    /// Runs a verification attempt as a single read-modify-write on the
    /// OTP row. The row is locked for the duration of the check so an
    /// issue or a concurrent verify for the same email cannot interleave
    /// with the decision.
    pub fn verify_and_consume_otp(
        &self,
        admin_email: &str,
        given_code: &str,
    ) -> Result<OtpOutcome, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let outcome = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let record = otps
                    .find(admin_email)
                    .for_update()
                    .get_result::<OtpRecord>(conn)?;

                let snapshot = OtpSnapshot {
                    code_hash: record.code_hash,
                    expiration: record.expiration,
                    attempts_used: record.attempts_used,
                    attempts_max: record.attempts_max,
                    consumed_at: record.consumed_at,
                };

                let outcome = otp::evaluate(&snapshot, given_code, SystemTime::now());

                match outcome {
                    OtpOutcome::Verified => {
                        dsl::update(otps.find(admin_email))
                            .set(otp_fields::consumed_at.eq(Some(SystemTime::now())))
                            .execute(conn)?;
                    }
                    OtpOutcome::WrongOrExpired { .. } => {
                        dsl::update(otps.find(admin_email))
                            .set(
                                otp_fields::attempts_used.eq(otp_fields::attempts_used + 1),
                            )
                            .execute(conn)?;
                    }
                    OtpOutcome::RateLimited => (),
                }

                Ok(outcome)
            })?;

        Ok(outcome)
    }

    pub fn create_session(
        &self,
        session_id: Uuid,
        admin_id: Uuid,
        csrf_token: &str,
        expiration: SystemTime,
    ) -> Result<(), DaoError> {
        let new_session = NewSession {
            id: session_id,
            admin_id,
            csrf_token,
            created_timestamp: SystemTime::now(),
            expiration,
        };

        dsl::insert_into(sessions)
            .values(&new_session)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    pub fn get_session_with_admin(
        &self,
        session_id: Uuid,
    ) -> Result<(Session, Admin), DaoError> {
        Ok(sessions
            .inner_join(admins.on(admin_fields::id.eq(session_fields::admin_id)))
            .filter(session_fields::id.eq(session_id))
            .get_result::<(Session, Admin)>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn delete_session(&self, session_id: Uuid) -> Result<usize, DaoError> {
        Ok(diesel::delete(sessions.find(session_id))
            .execute(&mut self.db_thread_pool.get()?)?)
    }
}
