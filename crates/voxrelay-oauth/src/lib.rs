//! OAuth 2.0 client-credentials exchange for the voice provider.
//!
//! Every relay session trades the provider API key and secret for a
//! short-lived bearer token before it dials the realtime endpoint.
//!
//! # Components
//!
//! - [`oauth`]: endpoint configuration, Basic auth header, token response parsing
//! - [`credential`]: the [`Credential`] type and the [`CredentialSource`] seam

pub mod credential;
pub mod error;
pub mod oauth;

pub use credential::{
    ClientCredentialsExchanger, Credential, CredentialSource, SharedCredentialSource,
    StaticCredentialSource,
};
pub use error::{OAuthError, Result};
pub use oauth::{ClientCredentials, OAuthConfig};
