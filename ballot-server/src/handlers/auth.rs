use ballot_common::db::{self, DaoError, DbThreadPool};
use ballot_common::email::EmailSender;
use ballot_common::request_io::{
    CredentialPair, OutputAdminUser, OutputLoggedOut, OutputOtpRequired, OutputSignedIn,
};
use ballot_common::session::{
    self, SessionCookie, CSRF_COOKIE_NAME, SESSION_COOKIE_NAME,
};
use ballot_common::validators::Validity;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::env;
use crate::handlers::{self, error::HttpErrorResponse};
use crate::middleware::auth::VerifiedSession;
use crate::middleware::throttle::Throttle;

const INCORRECT_CREDENTIAL_MSG: &str = "Incorrect email or password";

pub async fn login(
    req: HttpRequest,
    db_thread_pool: web::Data<DbThreadPool>,
    smtp_sender: web::Data<EmailSender>,
    credentials: web::Json<CredentialPair>,
    throttle: Throttle<8, 10>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if let Validity::Invalid(msg) = credentials.validate_email_address() {
        return Err(HttpErrorResponse::IncorrectlyFormed(msg));
    }

    throttle
        .enforce(&credentials.email, "login", &db_thread_pool)
        .await?;

    if credentials.password.len() > 512 {
        return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
            "Provided password is too long. Max: 512 bytes",
        )));
    }

    let credentials = Arc::new(credentials.into_inner());
    let credentials_ref = Arc::clone(&credentials);

    let auth_dao = db::auth::Dao::new(&db_thread_pool);

    let admin = match web::block(move || auth_dao.get_admin_by_email(&credentials_ref.email))
        .await?
    {
        Ok(a) => a,
        Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
            // Same response as a wrong password to prevent user enumeration
            return Err(HttpErrorResponse::IncorrectCredential(String::from(
                INCORRECT_CREDENTIAL_MSG,
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to get admin credentials",
            )));
        }
    };

    let admin_id = admin.id;
    let admin_role = admin.role.clone();
    let credentials_ref = Arc::clone(&credentials);

    let (sender, receiver) = oneshot::channel();

    rayon::spawn(move || {
        let hash = match argon2_kdf::Hash::from_str(&admin.password_hash) {
            Ok(h) => h,
            Err(e) => {
                sender.send(Err(e)).expect("Sending to channel failed");
                return;
            }
        };

        let does_password_match_hash = hash.verify_with_secret(
            credentials_ref.password.as_bytes(),
            argon2_kdf::Secret::using_bytes(&env::CONF.hashing_key),
        );

        sender
            .send(Ok(does_password_match_hash))
            .expect("Sending to channel failed");
    });

    match receiver.await? {
        Ok(true) => (),
        Ok(false) => {
            return Err(HttpErrorResponse::IncorrectCredential(String::from(
                INCORRECT_CREDENTIAL_MSG,
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to validate password",
            )));
        }
    };

    match &credentials.otp_code {
        None => {
            let otp_debug = handlers::verification::generate_and_email_otp(
                &credentials.email,
                db_thread_pool.as_ref(),
                smtp_sender.as_ref(),
            )
            .await?;

            Ok(HttpResponse::Ok().json(OutputOtpRequired {
                status: String::from("otp_required"),
                email: credentials.email.clone(),
                otp_debug,
            }))
        }
        Some(otp_code) => {
            handlers::verification::verify_otp(otp_code, &credentials.email, &db_thread_pool)
                .await?;

            // A pre-auth session id must never survive authentication
            if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
                if let Ok(old_session_id) = Uuid::parse_str(cookie.value()) {
                    let auth_dao = db::auth::Dao::new(&db_thread_pool);
                    match web::block(move || auth_dao.delete_session(old_session_id)).await? {
                        Ok(_) => (),
                        Err(e) => log::error!("{e}"),
                    }
                }
            }

            let session_id = Uuid::now_v7();
            let csrf_token = session::generate_csrf_token();
            let session_expiration = SystemTime::now() + env::CONF.session_lifetime;

            let csrf_token_copy = csrf_token.clone();
            let auth_dao = db::auth::Dao::new(&db_thread_pool);
            match web::block(move || {
                auth_dao.create_session(session_id, admin_id, &csrf_token_copy, session_expiration)
            })
            .await?
            {
                Ok(_) => (),
                Err(e) => {
                    log::error!("{e}");
                    return Err(HttpErrorResponse::InternalError(String::from(
                        "Failed to create session",
                    )));
                }
            };

            let max_age_secs = env::CONF.session_lifetime.as_secs() as i64;
            let session_cookie = SessionCookie::session(session_id.to_string(), max_age_secs);
            let csrf_cookie = SessionCookie::csrf(csrf_token.clone(), max_age_secs);

            Ok(HttpResponse::Ok()
                .append_header((header::SET_COOKIE, session_cookie.to_set_cookie_string()))
                .append_header((header::SET_COOKIE, csrf_cookie.to_set_cookie_string()))
                .json(OutputSignedIn {
                    user: OutputAdminUser {
                        id: admin_id,
                        email: credentials.email.clone(),
                        role: admin_role,
                    },
                    csrf_token,
                }))
        }
    }
}

/// Always succeeds from the client's perspective. The server-side session
/// is removed when it exists; the expired cookies overwrite the client's
/// jar either way.
pub async fn logout(
    req: HttpRequest,
    db_thread_pool: web::Data<DbThreadPool>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        if let Ok(session_id) = Uuid::parse_str(cookie.value()) {
            let auth_dao = db::auth::Dao::new(&db_thread_pool);
            match web::block(move || auth_dao.delete_session(session_id)).await {
                Ok(Ok(_)) => (),
                Ok(Err(e)) => log::error!("{e}"),
                Err(e) => log::error!("{e}"),
            }
        }
    }

    let expired_session_cookie = SessionCookie::expired(SESSION_COOKIE_NAME, true);
    let expired_csrf_cookie = SessionCookie::expired(CSRF_COOKIE_NAME, false);

    Ok(HttpResponse::Ok()
        .append_header((
            header::SET_COOKIE,
            expired_session_cookie.to_set_cookie_string(),
        ))
        .append_header((
            header::SET_COOKIE,
            expired_csrf_cookie.to_set_cookie_string(),
        ))
        .json(OutputLoggedOut {
            status: String::from("logged_out"),
        }))
}

pub async fn me(session: VerifiedSession) -> Result<HttpResponse, HttpErrorResponse> {
    Ok(HttpResponse::Ok().json(OutputAdminUser {
        id: session.admin.id,
        email: session.admin.email,
        role: session.admin.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;
    use diesel::r2d2::ConnectionManager;

    // A pool that never connects; these tests only exercise paths that
    // return before any query is made
    fn unconnected_db_pool() -> DbThreadPool {
        diesel::r2d2::Pool::builder()
            .build_unchecked(ConnectionManager::new("postgres://localhost/unused"))
    }

    #[actix_web::test]
    async fn test_logout_without_session_still_clears_cookies() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(unconnected_db_pool()))
                .route("/logout", web::post().to(logout)),
        )
        .await;

        let req = TestRequest::post().uri("/logout").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);

        let set_cookies = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .map(|v| String::from(v.to_str().unwrap()))
            .collect::<Vec<_>>();

        assert_eq!(set_cookies.len(), 2);
        assert!(set_cookies
            .iter()
            .any(|c| c.starts_with("ballot_session=") && c.contains("Max-Age=0")));
        assert!(set_cookies
            .iter()
            .any(|c| c.starts_with("ballot_csrf=") && c.contains("Max-Age=0")));
    }

    #[actix_web::test]
    async fn test_logout_with_malformed_cookie_still_succeeds() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(unconnected_db_pool()))
                .route("/logout", web::post().to(logout)),
        )
        .await;

        let req = TestRequest::post()
            .uri("/logout")
            .cookie(Cookie::build(SESSION_COOKIE_NAME, "not-a-uuid").finish())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_me_without_session_cookie_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(unconnected_db_pool()))
                .route("/me", web::get().to(me)),
        )
        .await;

        let req = TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_me_with_malformed_session_cookie_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(unconnected_db_pool()))
                .route("/me", web::get().to(me)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/me")
            .cookie(Cookie::build(SESSION_COOKIE_NAME, "not-a-uuid").finish())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
