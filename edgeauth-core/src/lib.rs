//! Admission engine for the EdgeAuth gateway.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//!
//! Dependencies are injected via traits:
//! - [`admission::TokenValidator`] - Whether a token names a live principal
//! - [`admission::SessionRegistry`] - In-process view of live sessions
//! - [`signing::SecretProvider`] - Where the administrative secret comes from
//!
//! # Example
//!
//! ```ignore
//! use edgeauth_core::{allow::EphemeralAllowStore, signing::*};
//!
//! let store = Arc::new(EphemeralAllowStore::new());
//! let verifier = AdminVerifier::new(GrantPolicy::default(), store.clone());
//!
//! // The secret is resolved by the caller and handed in per request
//! let secret = provider.admin_secret();
//! let grant = verifier.verify_and_apply(secret.as_ref(), &headers, &body, now)?;
//! ```

pub mod admission;
pub mod allow;
pub mod signing;

pub use admission::{
    AdmissionGate, AdmissionMethod, CheckRequest, Decision, RegistryValidator, SessionRegistry,
    TokenValidator, ValidationError,
};
pub use allow::EphemeralAllowStore;
pub use signing::{
    AdminSecret, AdminVerifier, FailureClass, GrantBody, GrantError, GrantPolicy, SecretProvider,
    StaticSecret, VerifiedGrant,
};
