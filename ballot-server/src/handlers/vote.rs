use ballot_common::cache::{CacheHandle, CacheKey};
use ballot_common::db::{self, DaoError, DbThreadPool};
use ballot_common::gateway::{self, GatewayClient};
use ballot_common::models::payment::NewPayment;
use ballot_common::models::vote::{self, NewVote, STATUS_PENDING, STATUS_SUCCESS};
use ballot_common::request_io::{
    InputReference, InputVote, OutputCandidateTally, OutputInitializedPayment, OutputReceipt,
};
use ballot_common::validators::{self, Validity};

use actix_web::{web, HttpResponse};
use std::collections::HashSet;
use std::time::SystemTime;
use uuid::Uuid;

use crate::env;
use crate::handlers::error::HttpErrorResponse;
use crate::middleware::throttle::Throttle;

pub async fn initialize(
    db_thread_pool: web::Data<DbThreadPool>,
    gateway_client: web::Data<GatewayClient>,
    vote_info: web::Json<InputVote>,
    throttle: Throttle<15, 10>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let vote_info = vote_info.into_inner();

    if let Validity::Invalid(msg) = validators::validate_email_address(&vote_info.email) {
        return Err(HttpErrorResponse::IncorrectlyFormed(msg));
    }

    if let Some(phone) = &vote_info.phone {
        if let Validity::Invalid(msg) = validators::validate_phone_number(phone) {
            return Err(HttpErrorResponse::IncorrectlyFormed(msg));
        }
    }

    throttle
        .enforce(&vote_info.email, "initialize_vote", &db_thread_pool)
        .await?;

    // The charge is always computed server-side from configuration; a
    // client-supplied amount is never accepted
    let amount = match vote::charge_amount(vote_info.vote_count, env::CONF.vote_unit_price) {
        Some(a) => a,
        None => {
            return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
                "Vote count must be at least 1",
            )));
        }
    };

    let candidate_id = vote_info.candidate_id;
    let position_id = vote_info.position_id;

    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    match web::block(move || vote_dao.get_candidate_and_position(candidate_id, position_id)).await?
    {
        Ok(_) => (),
        Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
            return Err(HttpErrorResponse::DoesNotExist(String::from(
                "No candidate with that ID for that position",
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to look up candidate",
            )));
        }
    };

    let reference = gateway::generate_reference();

    // The gateway is asked for a checkout session before anything is
    // persisted. If it is unreachable, no local state exists to clean up.
    let checkout = match gateway_client
        .initialize_transaction(&reference, amount, &vote_info.email)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::GatewayUnavailable(String::from(
                "Could not reach the payment gateway",
            )));
        }
    };

    let reference_copy = reference.clone();
    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    match web::block(move || {
        let now = SystemTime::now();
        let vote_id = Uuid::now_v7();

        let new_vote = NewVote {
            id: vote_id,
            candidate_id,
            position_id,
            voter_email: &vote_info.email,
            voter_phone: vote_info.phone.as_deref(),
            vote_count: vote_info.vote_count,
            amount,
            payment_reference: &reference_copy,
            status: STATUS_PENDING,
            created_timestamp: now,
        };

        let new_payment = NewPayment {
            reference: &reference_copy,
            vote_id,
            amount,
            status: STATUS_PENDING,
            email: &vote_info.email,
            phone: vote_info.phone.as_deref(),
            created_timestamp: now,
        };

        vote_dao.create_pending_vote_and_payment(&new_vote, &new_payment)
    })
    .await?
    {
        Ok(_) => (),
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to record the pending vote",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(OutputInitializedPayment {
        authorization_url: checkout.authorization_url,
        reference,
    }))
}

pub async fn verify(
    db_thread_pool: web::Data<DbThreadPool>,
    gateway_client: web::Data<GatewayClient>,
    cache: web::Data<CacheHandle>,
    reference_info: web::Json<InputReference>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let reference = match reference_info.into_inner().reference {
        Some(r) if !r.trim().is_empty() => r,
        _ => {
            return Err(HttpErrorResponse::MissingReference(String::from(
                "No payment reference was provided",
            )));
        }
    };

    let reference_copy = reference.clone();
    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    let payment = match web::block(move || vote_dao.find_payment(&reference_copy)).await? {
        Ok(p) => p,
        Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
            return Err(HttpErrorResponse::DoesNotExist(String::from(
                "No payment with that reference",
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to look up payment",
            )));
        }
    };

    // The local row only says "pending"; the gateway is the authority on
    // whether money was captured
    let verified = match gateway_client.verify_transaction(&reference).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::VerificationFailed(String::from(
                "Could not confirm the payment with the gateway",
            )));
        }
    };

    if verified.status.is_success() && verified.amount != payment.amount {
        log::error!(
            "Gateway reported amount {} for reference {} but {} was expected",
            verified.amount,
            payment.reference,
            payment.amount,
        );
        return Err(HttpErrorResponse::VerificationFailed(String::from(
            "The captured amount does not match the expected charge",
        )));
    }

    let reference_copy = reference.clone();
    let gateway_success = verified.status.is_success();
    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    let settlement =
        match web::block(move || vote_dao.settle_payment(&reference_copy, gateway_success)).await? {
            Ok(s) => s,
            Err(e) => {
                log::error!("{e}");
                return Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to settle the payment",
                )));
            }
        };

    if settlement.payment.status != STATUS_SUCCESS {
        return Err(HttpErrorResponse::PaymentNotSuccessful(String::from(
            "The payment was not successful",
        )));
    }

    let candidate_id = settlement.vote.candidate_id;
    let position_id = settlement.vote.position_id;

    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    let (candidate, position) =
        match web::block(move || vote_dao.get_candidate_and_position(candidate_id, position_id))
            .await?
        {
            Ok(c) => c,
            Err(e) => {
                log::error!("{e}");
                return Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to look up candidate for receipt",
                )));
            }
        };

    if settlement.newly_committed {
        let mut keys = HashSet::new();
        keys.insert(CacheKey::PositionResults(position_id));
        keys.insert(CacheKey::CandidateTally(candidate_id));
        keys.insert(CacheKey::DashboardSummary);

        cache.invalidate(&keys);
    }

    Ok(HttpResponse::Ok().json(OutputReceipt {
        reference: settlement.payment.reference,
        amount: settlement.payment.amount,
        vote_count: settlement.vote.vote_count,
        candidate_name: candidate.name,
        position_name: position.name,
    }))
}

pub async fn results(
    db_thread_pool: web::Data<DbThreadPool>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let vote_dao = db::vote::Dao::new(&db_thread_pool);
    let rows = match web::block(move || vote_dao.get_results()).await? {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to tally results",
            )));
        }
    };

    let tallies = rows
        .into_iter()
        .map(
            |(candidate_id, candidate_name, position_name, votes)| OutputCandidateTally {
                candidate_id,
                candidate_name,
                position_name,
                votes,
            },
        )
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(tallies))
}
