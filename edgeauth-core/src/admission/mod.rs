//! Admission decisions for check requests.
//!
//! A request is admitted by a token that the [`TokenValidator`] vouches for,
//! or, failing that, by a live ephemeral grant for its client IP.

mod credentials;
mod gate;
mod validator;

pub use credentials::{
    extract_token, CheckRequest, FORWARDED_FOR_HEADER, LEGACY_TOKEN_HEADER, PRIMARY_TOKEN_HEADER,
};
pub use gate::{AdmissionGate, AdmissionMethod, Decision};
pub use validator::{RegistryValidator, SessionRegistry, TokenValidator, ValidationError};
