//! Shared setup for the HTTP tests: in-memory SQLite, a temp upload
//! directory and the in-process identity provider with cheap hashing.
#![allow(dead_code)]

use std::sync::Arc;

use actix_web::http::header;
use actix_web::web;
use argon2::{Algorithm, Argon2, Params, Version};
use tempfile::TempDir;
use wf_api::handlers::AppState;
use wf_auth_simple::SimpleIdentityProvider;
use wf_core::journal::Journal;
use wf_db_sqlite::SqlitePostStore;
use wf_storage_local::LocalObjectStore;

pub async fn state(dir: &TempDir) -> web::Data<AppState> {
    let params = Params::new(8, 1, 1, None).unwrap();
    let identity = SimpleIdentityProvider::default()
        .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params));
    let posts = SqlitePostStore::new("sqlite::memory:").await.unwrap();
    let objects = LocalObjectStore::new(dir.path().to_path_buf(), "/uploads", 16);

    web::Data::new(AppState {
        identity: Arc::new(identity),
        journal: Journal::new(Arc::new(posts), Arc::new(objects)),
        max_upload_bytes: 1024,
    })
}

macro_rules! app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .configure(wf_api::configure_routes),
        )
        .await
    };
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

/// One text or file part: field name, optional filename, content.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a str);

/// Builds a `multipart/form-data` body; returns the content type and bytes.
pub fn form_data(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let parts: Vec<_> = parts
        .iter()
        .map(|(name, filename, data)| (*name, *filename, data.as_bytes()))
        .collect();
    encode(&parts)
}

pub fn multipart(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    encode(&[(field, Some(filename), data)])
}

fn encode(parts: &[(&str, Option<&str>, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "wayfarerboundary";
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{name}\"; filename=\"{filename}\""),
            None => format!("form-data; name=\"{name}\""),
        };
        let head = format!("--{boundary}\r\nContent-Disposition: {disposition}\r\n");
        body.extend_from_slice(head.as_bytes());
        if filename.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
