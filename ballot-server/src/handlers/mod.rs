pub mod auth;
pub mod health;
pub mod vote;

pub mod verification {
    use actix_web::web;
    use ballot_common::db::{self, DaoError, DbThreadPool};
    use ballot_common::email::{templates::OtpMessage, EmailMessage, EmailSender};
    use ballot_common::otp::{Otp, OtpOutcome, OTP_LENGTH};
    use std::time::SystemTime;

    use super::error::HttpErrorResponse;
    use crate::env;

    const WRONG_OR_EXPIRED_OTP_MSG: &str = "OTP was incorrect or has expired";

    /// Issues a new OTP for an email. The record is persisted before any
    /// delivery is attempted, so a failed delivery leaves a valid code in
    /// place; the recovery path is simply another issue ("resend").
    ///
    /// Returns the raw code only on the non-production escape hatch, when
    /// no transport accepted the message (or email is disabled) and the
    /// production flag is off.
    pub async fn generate_and_email_otp(
        admin_email: &str,
        db_thread_pool: &DbThreadPool,
        smtp_sender: &EmailSender,
    ) -> Result<Option<String>, HttpErrorResponse> {
        let otp = Otp::generate(OTP_LENGTH);
        let code_hash = Otp::hash(&otp);
        let otp_expiration = SystemTime::now() + env::CONF.otp_lifetime;

        let admin_email_copy = String::from(admin_email);

        let auth_dao = db::auth::Dao::new(db_thread_pool);
        match web::block(move || {
            auth_dao.save_otp(
                &admin_email_copy,
                &code_hash,
                otp_expiration,
                env::CONF.otp_max_attempts,
            )
        })
        .await?
        {
            Ok(_) => (),
            Err(e) => {
                log::error!("{e}");
                return Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to save OTP",
                )));
            }
        };

        if !env::CONF.email_enabled {
            return if env::CONF.production {
                Err(HttpErrorResponse::OtpDeliveryFailed(String::from(
                    "OTP delivery is not available",
                )))
            } else {
                Ok(Some(otp))
            };
        }

        let message = EmailMessage {
            body: OtpMessage::generate(&otp[..4], &otp[4..], env::CONF.otp_lifetime),
            subject: "Your one-time passcode",
            from: env::CONF.email_from_address.clone(),
            reply_to: env::CONF.email_reply_to_address.clone(),
            destination: admin_email,
            is_html: true,
        };

        match smtp_sender.send(message).await {
            Ok(_) => Ok(None),
            Err(e) => {
                log::error!("{e}");

                // The OTP record stands even though delivery failed; the
                // user can request a resend
                if env::CONF.production {
                    Err(HttpErrorResponse::OtpDeliveryFailed(String::from(
                        "Failed to send OTP to the email address",
                    )))
                } else {
                    Ok(Some(otp))
                }
            }
        }
    }

    pub async fn verify_otp(
        otp: &str,
        admin_email: &str,
        db_thread_pool: &DbThreadPool,
    ) -> Result<(), HttpErrorResponse> {
        if admin_email.len() > 255 || otp.len() > OTP_LENGTH {
            return Err(HttpErrorResponse::IncorrectOtp(
                String::from(WRONG_OR_EXPIRED_OTP_MSG),
                0,
            ));
        }

        let otp_copy = String::from(otp);
        let admin_email_copy = String::from(admin_email);

        let auth_dao = db::auth::Dao::new(db_thread_pool);
        let outcome =
            match web::block(move || auth_dao.verify_and_consume_otp(&admin_email_copy, &otp_copy))
                .await?
            {
                Ok(o) => o,
                Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
                    return Err(HttpErrorResponse::IncorrectOtp(
                        String::from(WRONG_OR_EXPIRED_OTP_MSG),
                        0,
                    ));
                }
                Err(e) => {
                    log::error!("{e}");
                    return Err(HttpErrorResponse::InternalError(String::from(
                        "Failed to check OTP",
                    )));
                }
            };

        match outcome {
            OtpOutcome::Verified => Ok(()),
            OtpOutcome::RateLimited => Err(HttpErrorResponse::TooManyAttempts(String::from(
                "Too many attempts. Request a new code.",
            ))),
            OtpOutcome::WrongOrExpired { remaining } => Err(HttpErrorResponse::IncorrectOtp(
                String::from(WRONG_OR_EXPIRED_OTP_MSG),
                remaining,
            )),
        }
    }
}

pub mod error {
    use actix_web::http::{header, StatusCode};
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use serde::Serialize;
    use std::fmt;
    use tokio::sync::oneshot;

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(String),
        MissingReference(String),

        // 401
        IncorrectCredential(String),
        IncorrectOtp(String, i16),
        SessionRequired(String),

        // 402
        PaymentNotSuccessful(String),

        // 403
        Forbidden(String),

        // 404
        DoesNotExist(String),

        // 429
        TooManyAttempts(String),

        // 500
        OtpDeliveryFailed(String),
        InternalError(String),

        // 502
        GatewayUnavailable(String),
        VerificationFailed(String),
    }

    #[derive(Serialize)]
    pub struct ErrorBody<'a> {
        pub error: &'static str,
        pub message: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub remaining_attempts: Option<i16>,
    }

    impl HttpErrorResponse {
        pub fn error_code(&self) -> &'static str {
            match self {
                HttpErrorResponse::IncorrectlyFormed(_) => "invalid_input",
                HttpErrorResponse::MissingReference(_) => "missing_reference",
                HttpErrorResponse::IncorrectCredential(_) => "invalid_credentials",
                HttpErrorResponse::IncorrectOtp(_, _) => "invalid_or_expired_otp",
                HttpErrorResponse::SessionRequired(_) => "session_required",
                HttpErrorResponse::PaymentNotSuccessful(_) => "payment_not_successful",
                HttpErrorResponse::Forbidden(_) => "forbidden",
                HttpErrorResponse::DoesNotExist(_) => "not_found",
                HttpErrorResponse::TooManyAttempts(_) => "too_many_requests",
                HttpErrorResponse::OtpDeliveryFailed(_) => "otp_delivery_failed",
                HttpErrorResponse::InternalError(_) => "internal_error",
                HttpErrorResponse::GatewayUnavailable(_) => "gateway_error",
                HttpErrorResponse::VerificationFailed(_) => "verification_failed",
            }
        }

        fn message(&self) -> &str {
            match self {
                HttpErrorResponse::IncorrectlyFormed(msg)
                | HttpErrorResponse::MissingReference(msg)
                | HttpErrorResponse::IncorrectCredential(msg)
                | HttpErrorResponse::IncorrectOtp(msg, _)
                | HttpErrorResponse::SessionRequired(msg)
                | HttpErrorResponse::PaymentNotSuccessful(msg)
                | HttpErrorResponse::Forbidden(msg)
                | HttpErrorResponse::DoesNotExist(msg)
                | HttpErrorResponse::TooManyAttempts(msg)
                | HttpErrorResponse::OtpDeliveryFailed(msg)
                | HttpErrorResponse::InternalError(msg)
                | HttpErrorResponse::GatewayUnavailable(msg)
                | HttpErrorResponse::VerificationFailed(msg) => msg,
            }
        }

        pub fn body(&self) -> ErrorBody<'_> {
            let remaining_attempts = match self {
                HttpErrorResponse::IncorrectOtp(_, remaining) => Some(*remaining),
                _ => None,
            };

            ErrorBody {
                error: self.error_code(),
                message: self.message(),
                remaining_attempts,
            }
        }
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let body = serde_json::to_string(&self.body())
                .unwrap_or_else(|_| String::from("{\"error\":\"internal_error\"}"));
            write!(f, "{body}")
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code())
                .insert_header((header::CONTENT_TYPE, "application/json"))
                .json(self.body())
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_)
                | HttpErrorResponse::MissingReference(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::IncorrectCredential(_)
                | HttpErrorResponse::IncorrectOtp(_, _)
                | HttpErrorResponse::SessionRequired(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::PaymentNotSuccessful(_) => StatusCode::PAYMENT_REQUIRED,
                HttpErrorResponse::Forbidden(_) => StatusCode::FORBIDDEN,
                HttpErrorResponse::DoesNotExist(_) => StatusCode::NOT_FOUND,
                HttpErrorResponse::TooManyAttempts(_) => StatusCode::TOO_MANY_REQUESTS,
                HttpErrorResponse::OtpDeliveryFailed(_) | HttpErrorResponse::InternalError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                HttpErrorResponse::GatewayUnavailable(_)
                | HttpErrorResponse::VerificationFailed(_) => StatusCode::BAD_GATEWAY,
            }
        }
    }

    impl From<actix_web::error::BlockingError> for HttpErrorResponse {
        fn from(_err: actix_web::error::BlockingError) -> Self {
            HttpErrorResponse::InternalError(String::from("Actix thread pool failure"))
        }
    }

    impl From<oneshot::error::RecvError> for HttpErrorResponse {
        fn from(_err: oneshot::error::RecvError) -> Self {
            HttpErrorResponse::InternalError(String::from("Rayon thread pool failure"))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use actix_web::error::ResponseError;

        #[test]
        fn test_status_codes() {
            assert_eq!(
                HttpErrorResponse::IncorrectlyFormed(String::from("x")).status_code(),
                StatusCode::BAD_REQUEST,
            );
            assert_eq!(
                HttpErrorResponse::IncorrectCredential(String::from("x")).status_code(),
                StatusCode::UNAUTHORIZED,
            );
            assert_eq!(
                HttpErrorResponse::IncorrectOtp(String::from("x"), 1).status_code(),
                StatusCode::UNAUTHORIZED,
            );
            assert_eq!(
                HttpErrorResponse::TooManyAttempts(String::from("x")).status_code(),
                StatusCode::TOO_MANY_REQUESTS,
            );
            assert_eq!(
                HttpErrorResponse::PaymentNotSuccessful(String::from("x")).status_code(),
                StatusCode::PAYMENT_REQUIRED,
            );
            assert_eq!(
                HttpErrorResponse::GatewayUnavailable(String::from("x")).status_code(),
                StatusCode::BAD_GATEWAY,
            );
            assert_eq!(
                HttpErrorResponse::DoesNotExist(String::from("x")).status_code(),
                StatusCode::NOT_FOUND,
            );
        }

        #[test]
        fn test_otp_failure_body_reports_remaining_attempts() {
            let err = HttpErrorResponse::IncorrectOtp(String::from("wrong code"), 2);
            let body = serde_json::to_value(err.body()).unwrap();

            assert_eq!(body["error"], "invalid_or_expired_otp");
            assert_eq!(body["remaining_attempts"], 2);
        }

        #[test]
        fn test_non_otp_body_omits_remaining_attempts() {
            let err = HttpErrorResponse::IncorrectCredential(String::from("bad"));
            let body = serde_json::to_value(err.body()).unwrap();

            assert_eq!(body["error"], "invalid_credentials");
            assert!(body.get("remaining_attempts").is_none());
        }
    }
}
