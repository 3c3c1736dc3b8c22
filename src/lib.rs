pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod pipeline;
pub mod relations;
pub mod server;
pub mod services;
pub mod state;
pub mod tenancy;

pub use server::app;
pub use state::AppState;
