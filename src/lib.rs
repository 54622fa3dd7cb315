pub mod app;
pub mod app_state_builder;
pub mod canonical;
pub mod classify;
pub mod config;
pub mod directory;
pub mod enrich;
pub mod error;
pub mod injection;
pub mod rate_limit;
pub mod register;
pub mod sanitize;
pub mod server_config;
pub mod signature;
pub mod state;
pub mod submit;
pub mod transport;
pub mod url_guard;
