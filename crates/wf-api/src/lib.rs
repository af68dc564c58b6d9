//! # wf-api
//!
//! The web routing and orchestration layer for Wayfarer.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pages;

use actix_web::web;

/// Configures the JSON API under `/api` and the HTML pages at the root.
/// Page requests without a session are redirected to the sign-in page.
///
/// The binary mounts static uploads separately so the object store's URL
/// prefix stays a configuration concern.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(handlers::sign_up))
                    .route("/signin", web::post().to(handlers::sign_in))
                    .route("/signout", web::post().to(handlers::sign_out))
                    .route("/session", web::get().to(handlers::current_session))
                    .route("/profile", web::put().to(handlers::update_profile))
                    .route("/password", web::put().to(handlers::change_password)),
            )
            .service(
                web::resource("/posts")
                    .route(web::get().to(handlers::list_posts))
                    .route(web::post().to(handlers::create_post)),
            )
            // before /posts/{id} so "map" is never parsed as an id
            .route("/posts/map", web::get().to(handlers::post_map))
            .route("/posts/{id}", web::get().to(handlers::get_post))
            .route("/media", web::post().to(handlers::upload_media)),
    )
    .route("/", web::get().to(pages::index))
    .route("/post/{id}", web::get().to(pages::view_post))
    .service(
        web::resource(pages::SIGN_IN_PATH)
            .route(web::get().to(pages::sign_in_page))
            .route(web::post().to(pages::sign_in_form)),
    )
    .route("/signup", web::post().to(pages::sign_up_form))
    .route("/signout", web::post().to(pages::sign_out_form))
    .service(
        web::resource("/new")
            .route(web::get().to(pages::new_post_page))
            .route(web::post().to(pages::new_post_form)),
    )
    .route("/settings", web::get().to(pages::settings_page))
    .route("/settings/profile", web::post().to(pages::profile_form))
    .route("/settings/password", web::post().to(pages::password_form));
}
