use actix_web::web::*;

mod auth;
mod health;
mod vote;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/api")
            .configure(auth::configure)
            .configure(vote::configure)
            .configure(health::configure),
    );
}
