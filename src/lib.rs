// Library exports for Shutter
// This allows integration tests and the binary to share the service layer

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod interactions;
pub mod posts;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod store;
