// Library exports for tinyweb
// This allows integration tests and external code to use tinyweb modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod session;
pub mod state;
