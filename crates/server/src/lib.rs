//! HTTP query surface over the thread store: canonical id lookup, document
//! listing, and reply-hierarchy navigation.

mod config;
mod error;
mod routes;
mod server;
mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{build_router, start_server};
pub use state::ServerState;
