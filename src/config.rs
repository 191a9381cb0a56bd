//! Client-side knobs of the SCRAM handshake.

use crate::mechanism::Mechanism;

/// Length of the generated client nonce.
pub const NONCE_LENGTH: usize = 32;

/// How `=` and `,` are escaped in the authentication and authorization ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsernameEscaping {
    /// `=` becomes `=2D` and `,` becomes `=2C`.
    ///
    /// This is what the servers paired with this driver expect. RFC 5802 asks for `=3D`
    /// instead, so usernames containing `=` won't authenticate against a strictly conforming
    /// server in this mode.
    Legacy,
    /// `=` becomes `=3D` and `,` becomes `=2C` (RFC 5802 section 5.1).
    Rfc5802,
}

impl Default for UsernameEscaping {
    fn default() -> Self {
        UsernameEscaping::Legacy
    }
}

/// Options applied to every exchange created from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScramConfig {
    nonce_length: usize,
    min_iterations: Option<u32>,
    username_escaping: UsernameEscaping,
}

impl Default for ScramConfig {
    fn default() -> Self {
        ScramConfig {
            nonce_length: NONCE_LENGTH,
            min_iterations: None,
            username_escaping: UsernameEscaping::default(),
        }
    }
}

impl ScramConfig {
    /// Sets the number of characters of the client nonce. Values below 1 are raised to 1.
    pub fn nonce_length(mut self, length: usize) -> Self {
        self.nonce_length = length.max(1);
        self
    }

    /// Raises the smallest iteration count accepted from the server. A value below the
    /// mechanism's own floor has no effect.
    pub fn min_iterations(mut self, iterations: u32) -> Self {
        self.min_iterations = Some(iterations);
        self
    }

    /// Selects the username escaping rule.
    pub fn username_escaping(mut self, escaping: UsernameEscaping) -> Self {
        self.username_escaping = escaping;
        self
    }

    pub(crate) fn get_nonce_length(&self) -> usize {
        self.nonce_length
    }

    pub(crate) fn get_username_escaping(&self) -> UsernameEscaping {
        self.username_escaping
    }

    /// The iteration floor in effect for `mechanism`.
    pub fn effective_min_iterations(&self, mechanism: &Mechanism) -> u32 {
        match self.min_iterations {
            Some(configured) => configured.max(mechanism.min_iterations()),
            None => mechanism.min_iterations(),
        }
    }
}
