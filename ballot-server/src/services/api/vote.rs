use actix_web::web::*;

use crate::handlers::vote;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/vote")
            .service(resource("/initialize").route(post().to(vote::initialize)))
            .service(resource("/verify").route(post().to(vote::verify))),
    );

    cfg.service(resource("/results").route(get().to(vote::results)));
}
