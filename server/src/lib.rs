pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod server_state;
