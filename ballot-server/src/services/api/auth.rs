use actix_web::web::*;

use crate::handlers::auth;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/admin")
            .service(resource("/login").route(post().to(auth::login)))
            .service(resource("/logout").route(post().to(auth::logout)))
            .service(resource("/me").route(get().to(auth::me))),
    );
}
