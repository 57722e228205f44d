//! Online Boutique frontend - request-entry composition layer.
//!
//! This crate wires the storefront's HTTP surface:
//!
//! - [`services`] - typed contracts for the seven downstream services and
//!   all-or-nothing resolution of their handles
//! - [`platform`] - deployment environment detection (`ENV_PLATFORM` plus a
//!   metadata DNS probe) and the resulting display profile
//! - [`middleware`] - the ordered request pipeline (session, logging, tracing)
//! - [`routes`] - the static route table and page handlers
//! - [`server`] - construction and the serve loop
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = HttpServiceRegistry::new(&config.services)?;
//! let server = Server::new(ServerOptions::default(), &registry, &DnsProbe, config.static_dir).await?;
//! server.run(config.socket_addr()).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assets;
pub mod config;
pub mod error;
pub mod instrument;
pub mod middleware;
pub mod platform;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

pub use error::{AppError, ServerError};
pub use server::{Server, ServerOptions};
