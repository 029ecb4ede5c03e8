//! EdgeAuth daemon - admission gateway for a colocated reverse proxy.
//!
//! Answers two questions over a loopback-only HTTP listener:
//! - `GET /validate`: may this request through? (token or temporary IP grant)
//! - `POST /allow`: HMAC-signed grant admitting an IP for a while
//!
//! The admission logic itself lives in `edgeauth-core`; this crate wires it
//! to configuration, the session authority and the network.

pub mod config;
pub mod server;
pub mod services;
pub mod session;
pub mod validator;

pub use config::{ConfigError, DaemonConfig, EnvConfigSecret};
pub use server::{Gateway, LISTEN_ADDR};
pub use session::{extract_ip, SessionObserver, SessionStarted};
