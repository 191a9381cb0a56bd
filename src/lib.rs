//! # Client authentication for database connections
//!
//! This crate implements the authentication core a database driver needs while establishing a
//! connection:
//!
//! * a client for the SCRAM-SHA-1 and SCRAM-SHA-256 mechanisms according to RFC5802 and
//!   RFC7677 ([`ScramClient`](client/struct.ScramClient.html)). It doesn't support
//!   channel-binding;
//! * a [`MechanismSelector`](selector/struct.MechanismSelector.html) choosing a mechanism from
//!   the server's offer and fetching credentials from a
//!   [`CredentialSource`](selector/trait.CredentialSource.html);
//! * the [`LdapSaslPlugin`](plugin/struct.LdapSaslPlugin.html), which drives an exchange from
//!   raw server packets;
//! * an HTTP Digest helper for the cluster-management RPC endpoint
//!   ([`digest`](digest/index.html)).
//!
//! Nothing here performs I/O. The caller owns the transport, sends what the exchange produces
//! and feeds back what the server answers.
//!
//! # Usage
//!
//! ``` rust,no_run
//! use sasl_handshake::{select_mechanism, StaticCredentials};
//!
//! // This function represents your I/O implementation.
//! fn send_and_receive(message: &[u8]) -> Vec<u8> {
//!     unimplemented!()
//! }
//!
//! # fn main() -> Result<(), sasl_handshake::Error> {
//! let mut credentials = StaticCredentials::new("user", "password");
//! let mut scram = select_mechanism(&["SCRAM-SHA-256", "SCRAM-SHA-1"], &mut credentials)?;
//!
//! // The client speaks first; the input of the first round is ignored.
//! let mut challenge = Vec::new();
//! while let Some(response) = scram.evaluate_challenge(&challenge)? {
//!     challenge = send_and_receive(&response);
//! }
//! assert!(scram.is_complete());
//! # Ok(())
//! # }
//! ```
//!
//! Any error returned means that the authentication attempt wasn't successful. The exchange is
//! terminated afterwards and must not be reused.

pub mod client;
pub mod config;
pub mod digest;
mod error;
pub mod mechanism;
pub mod plugin;
pub mod selector;
mod utils;

pub use crate::client::{Credentials, ExchangeStage, ScramClient};
pub use crate::config::{ScramConfig, UsernameEscaping, NONCE_LENGTH};
pub use crate::error::{Error, Field, Kind, Result};
pub use crate::mechanism::{Mechanism, SCRAM_SHA_1, SCRAM_SHA_256};
pub use crate::plugin::{LdapSaslPlugin, PLUGIN_NAME};
pub use crate::selector::{
    select_mechanism, CredentialError, CredentialSource, MechanismSelector, StaticCredentials,
};
