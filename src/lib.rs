//! REST API for posting and browsing memes.
//!
//! Requests flow `routes` → `handlers` → [`service::MemeService`] → a
//! [`domain::MemeRepository`] (DynamoDB in production, in-memory for
//! development and tests).

pub mod aws_clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod startup;

use service::MemeService;

/// AppState holds shared resources for the web server.
#[derive(Clone)]
pub struct AppState {
    pub memes: MemeService,
}
