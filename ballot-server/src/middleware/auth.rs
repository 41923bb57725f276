use ballot_common::db::{self, DaoError, DbThreadPool};
use ballot_common::models::admin::Admin;
use ballot_common::session::{csrf_tokens_match, SESSION_COOKIE_NAME};

use actix_web::dev::Payload;
use actix_web::http::Method;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use std::time::SystemTime;
use uuid::Uuid;

use crate::handlers::error::HttpErrorResponse;

pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

const SESSION_REQUIRED_MSG: &str = "A valid session is required";

/// Resolves the session cookie against the server-side session store.
/// State-changing requests must additionally repeat the session's
/// anti-forgery token in the `X-CSRF-Token` header.
pub struct VerifiedSession {
    pub admin: Admin,
}

impl FromRequest for VerifiedSession {
    type Error = HttpErrorResponse;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let db_thread_pool = req.app_data::<web::Data<DbThreadPool>>().cloned();
        let session_cookie_value = req.cookie(SESSION_COOKIE_NAME).map(|c| String::from(c.value()));
        let method = req.method().clone();
        let csrf_header = req
            .headers()
            .get(CSRF_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Box::pin(async move {
            let db_thread_pool = db_thread_pool.ok_or_else(|| {
                HttpErrorResponse::InternalError(String::from("Database handle is missing"))
            })?;

            let cookie_value = session_cookie_value.ok_or_else(|| {
                HttpErrorResponse::SessionRequired(String::from(SESSION_REQUIRED_MSG))
            })?;

            let session_id = Uuid::parse_str(&cookie_value).map_err(|_| {
                HttpErrorResponse::SessionRequired(String::from(SESSION_REQUIRED_MSG))
            })?;

            let auth_dao = db::auth::Dao::new(&db_thread_pool);
            let (session, admin) =
                match web::block(move || auth_dao.get_session_with_admin(session_id)).await? {
                    Ok(s) => s,
                    Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
                        return Err(HttpErrorResponse::SessionRequired(String::from(
                            SESSION_REQUIRED_MSG,
                        )));
                    }
                    Err(e) => {
                        log::error!("{e}");
                        return Err(HttpErrorResponse::InternalError(String::from(
                            "Failed to look up session",
                        )));
                    }
                };

            if session.expiration <= SystemTime::now() {
                return Err(HttpErrorResponse::SessionRequired(String::from(
                    SESSION_REQUIRED_MSG,
                )));
            }

            if method != Method::GET && method != Method::HEAD {
                let Some(token) = csrf_header else {
                    return Err(HttpErrorResponse::Forbidden(String::from(
                        "Missing anti-forgery token",
                    )));
                };

                if !csrf_tokens_match(&token, &session.csrf_token) {
                    return Err(HttpErrorResponse::Forbidden(String::from(
                        "Incorrect anti-forgery token",
                    )));
                }
            }

            Ok(VerifiedSession { admin })
        })
    }
}
