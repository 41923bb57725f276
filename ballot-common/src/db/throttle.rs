use diesel::{dsl, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable, RunQueryDsl};
use std::time::SystemTime;

use crate::db::{DaoError, DbThreadPool};
use crate::schema::throttleable_attempts as throttleable_attempt_fields;
use crate::schema::throttleable_attempts::dsl::throttleable_attempts;

#[derive(Debug, Insertable, Queryable)]
#[diesel(table_name = throttleable_attempt_fields)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ThrottleableAttempt {
    pub identifier_hash: i64,
    pub attempt_count: i32,
    pub expiration_timestamp: SystemTime,
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

    /// Counts an attempt against the given identifier and returns the
    /// count inside the current window. A row whose window has lapsed is
    /// recycled rather than incremented.
    pub fn mark_attempt_and_get_attempt_count(
        &self,
        identifier_hash: i64,
        expiration_timestamp: SystemTime,
    ) -> Result<i32, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let attempt_count = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let existing = throttleable_attempts
                    .find(identifier_hash)
                    .for_update()
                    .get_result::<ThrottleableAttempt>(conn)
                    .optional()?;

                match existing {
                    None => {
                        let new_attempt = ThrottleableAttempt {
                            identifier_hash,
                            attempt_count: 1,
                            expiration_timestamp,
                        };

                        dsl::insert_into(throttleable_attempts)
                            .values(&new_attempt)
                            .execute(conn)?;

                        Ok(1)
                    }
                    Some(row) if row.expiration_timestamp <= SystemTime::now() => {
                        dsl::update(throttleable_attempts.find(identifier_hash))
                            .set((
                                throttleable_attempt_fields::attempt_count.eq(1),
                                throttleable_attempt_fields::expiration_timestamp
                                    .eq(expiration_timestamp),
                            ))
                            .execute(conn)?;

                        Ok(1)
                    }
                    Some(row) => {
                        dsl::update(throttleable_attempts.find(identifier_hash))
                            .set(
                                throttleable_attempt_fields::attempt_count
                                    .eq(throttleable_attempt_fields::attempt_count + 1),
                            )
                            .execute(conn)?;

                        Ok(row.attempt_count + 1)
                    }
                }
            })?;

        Ok(attempt_count)
    }
}
