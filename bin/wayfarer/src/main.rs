//! # Wayfarer Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use wf_api::configure_routes;
use wf_api::handlers::AppState;
use wf_api::middleware::{cors_policy, security_headers, standard_middleware};
use wf_config::{LogSettings, Settings};
use wf_core::journal::Journal;
use wf_core::models::AuthChange;
use wf_core::traits::IdentityProvider;

// Feature-gated imports: each port needs exactly one implementation
#[cfg(feature = "db-sqlite")]
use wf_db_sqlite::SqlitePostStore;

#[cfg(feature = "storage-local")]
use wf_storage_local::LocalObjectStore;

#[cfg(feature = "auth-simple")]
use wf_auth_simple::SimpleIdentityProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local", feature = "auth-simple")))]
compile_error!("enable one implementation per port: db-sqlite, storage-local and auth-simple");

/// `RUST_LOG` wins over the configured level. actix's `log` records are
/// forwarded into tracing by `init`.
fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // 1. Record store
    let posts = SqlitePostStore::new(settings.database.url.expose_secret())
        .await
        .context("failed to open the post store")?;

    // 2. Object store
    let storage = &settings.storage;
    std::fs::create_dir_all(&storage.root)
        .with_context(|| format!("failed to create {}", storage.root.display()))?;
    let objects = LocalObjectStore::new(
        storage.root.clone(),
        storage.url_prefix.clone(),
        storage.thumbnail_size,
    );

    // 3. Identity provider
    let identity: Arc<dyn IdentityProvider> = Arc::new(SimpleIdentityProvider::new(
        chrono::Duration::hours(settings.auth.session_ttl_hours),
        settings.auth.min_password_length,
    ));

    // held for the lifetime of the server
    let _auth_log = identity.on_auth_state_change(Arc::new(|change: &AuthChange| {
        info!(event = ?change.event, user_id = %change.user_id, "auth state changed");
    }));

    let state = web::Data::new(AppState {
        identity: identity.clone(),
        journal: Journal::new(Arc::new(posts), Arc::new(objects)),
        max_upload_bytes: storage.max_upload_bytes,
    });

    let (host, port) = settings.bind_address();
    let uploads_root = storage.root.clone();
    let url_prefix = storage.url_prefix.clone();
    info!(%host, port, uploads = %uploads_root.display(), "wayfarer starting");

    HttpServer::new(move || {
        App::new()
            .wrap(standard_middleware())
            .wrap(cors_policy())
            .wrap(security_headers())
            .app_data(state.clone())
            .service(Files::new(&url_prefix, &uploads_root))
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("failed to bind {host}:{port}"))?
    .run()
    .await?;

    Ok(())
}
