//! Hash primitives of the supported SCRAM mechanisms.
//!
//! A [`Mechanism`](struct.Mechanism.html) is a capability record bundling the three functions the
//! handshake needs (`H`, `HMAC` and `Hi`) together with the digest length and the smallest
//! iteration count the client accepts. The state machine in [`client`](../client/index.html)
//! is written once against this record.

use std::fmt;
use std::num::NonZeroU32;

use ring::{digest, hmac, pbkdf2};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Smallest iteration count accepted for either mechanism (RFC 5802 section 5.1 and RFC 7677
/// section 4 both recommend 4096).
pub const MIN_ITERATIONS: u32 = 4096;

/// The hash function family of one SCRAM mechanism.
pub struct Mechanism {
    name: &'static str,
    digest: &'static digest::Algorithm,
    hmac: &'static hmac::Algorithm,
    pbkdf2: &'static pbkdf2::Algorithm,
    output_len: usize,
    min_iterations: u32,
}

/// SCRAM-SHA-1 (RFC 5802), 20-byte digests.
pub static SCRAM_SHA_1: Mechanism = Mechanism {
    name: "SCRAM-SHA-1",
    digest: &digest::SHA1_FOR_LEGACY_USE_ONLY,
    hmac: &hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
    pbkdf2: &pbkdf2::PBKDF2_HMAC_SHA1,
    output_len: 20,
    min_iterations: MIN_ITERATIONS,
};

/// SCRAM-SHA-256 (RFC 7677), 32-byte digests.
pub static SCRAM_SHA_256: Mechanism = Mechanism {
    name: "SCRAM-SHA-256",
    digest: &digest::SHA256,
    hmac: &hmac::HMAC_SHA256,
    pbkdf2: &pbkdf2::PBKDF2_HMAC_SHA256,
    output_len: 32,
    min_iterations: MIN_ITERATIONS,
};

static SUPPORTED: [&Mechanism; 2] = [&SCRAM_SHA_1, &SCRAM_SHA_256];

impl Mechanism {
    /// Looks up a mechanism by its IANA name. The comparison is exact.
    pub fn by_name(name: &str) -> Option<&'static Mechanism> {
        SUPPORTED.iter().copied().find(|mechanism| mechanism.name == name)
    }

    /// All mechanisms this crate implements.
    pub fn supported() -> &'static [&'static Mechanism] {
        &SUPPORTED
    }

    /// The IANA name of the mechanism, e.g. `SCRAM-SHA-256`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Length in bytes of `H`, `HMAC` and `Hi` outputs.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// The smallest iteration count this mechanism accepts from a server.
    pub fn min_iterations(&self) -> u32 {
        self.min_iterations
    }

    /// `H(data)`.
    pub fn h(&self, data: &[u8]) -> Vec<u8> {
        digest::digest(self.digest, data).as_ref().to_vec()
    }

    /// `HMAC(key, data)`.
    pub fn hmac(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        self.hmac_parts(key, &[data])
    }

    /// `HMAC(key, data)` where `data` is given as consecutive slices.
    pub(crate) fn hmac_parts(&self, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
        let key = hmac::Key::new(*self.hmac, key);
        let mut context = hmac::Context::with_key(&key);
        for part in parts {
            context.update(part);
        }
        context.sign().as_ref().to_vec()
    }

    /// `Hi(password, salt, iterations)`, i.e. PBKDF2 with `HMAC` as the pseudorandom function
    /// and an output as long as `H`'s.
    pub fn hi(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let iterations = NonZeroU32::new(iterations).ok_or(Error::WeakParameters {
            iterations: i64::from(iterations),
            minimum: self.min_iterations,
        })?;
        let mut salted_password = Zeroizing::new(vec![0u8; self.output_len]);
        pbkdf2::derive(*self.pbkdf2, iterations, salt, password, &mut salted_password);
        Ok(salted_password)
    }
}

impl fmt::Debug for Mechanism {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Mechanism")
            .field("name", &self.name)
            .field("output_len", &self.output_len)
            .field("min_iterations", &self.min_iterations)
            .finish()
    }
}

impl PartialEq for Mechanism {
    fn eq(&self, other: &Mechanism) -> bool {
        self.name == other.name
    }
}
