use std::{error, fmt};

/// The authentication error cases.
///
/// Every error aborts the handshake it was raised in. Nothing in this crate retries locally.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// A message wasn't formatted as required or arrived out of order. `Kind` contains further
    /// information.
    ///
    /// RFC5802 section 7 describes the format of the exchanged messages.
    Protocol(Kind),
    /// The server responded with a nonce that doesn't start with our nonce.
    NonceMismatch,
    /// The server announced an iteration count below the accepted minimum.
    WeakParameters {
        /// Iteration count sent by the server.
        iterations: i64,
        /// Smallest iteration count the client accepts.
        minimum: u32,
    },
    /// The server rejected the authentication request. `String` contains a message from the server.
    ServerRejected(String),
    /// The server signature didn't match the expected one. The server couldn't be validated.
    ServerSignatureInvalid,
    /// The credential source failed or wasn't configured.
    CredentialUnavailable(String),
    /// None of the mechanisms offered by the peer is supported.
    NoSupportedMechanism(Vec<String>),
    /// A required algorithm or the random source isn't available.
    CryptoUnavailable(String),
    /// A `WWW-Authenticate` header couldn't be parsed as a digest challenge.
    MalformedChallenge(String),
    /// The server required a mandatory extension to be present that this client doesn't support.
    UnsupportedExtension,
    /// The username supplied was not valid
    InvalidUser(String),
}

/// The kinds of protocol errors.
#[derive(Debug, PartialEq)]
pub enum Kind {
    /// The content of the field `Field` is invalid.
    InvalidField(Field),
    /// The field `Field` was expected but not found.
    ExpectedField(Field),
    /// A message arrived after the exchange was finished.
    UnexpectedMessage,
    /// Two buffers that must have the same length didn't.
    LengthMismatch {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },
    /// The message isn't valid UTF-8.
    InvalidEncoding,
    /// A message part isn't of the form `key=value`.
    InvalidAttribute(String),
}

/// The fields used in the exchanged messages.
#[derive(Debug, PartialEq)]
pub enum Field {
    /// Nonce
    Nonce,
    /// Salt
    Salt,
    /// Iterations
    Iterations,
    /// Verify or Error
    VerifyOrError,
    /// Authcid
    Authcid,
    /// Digest realm
    Realm,
    /// Digest quality of protection
    Qop,
    /// Mechanism name sent by the server
    Mechanism,
}

impl Error {
    /// Returns the name of the error class, for callers that surface it as part of a
    /// connection failure.
    pub fn kind_name(&self) -> &'static str {
        use self::Error::*;
        match *self {
            Protocol(_) => "ProtocolViolation",
            NonceMismatch => "NonceMismatch",
            WeakParameters { .. } => "WeakParameters",
            ServerRejected(_) => "ServerRejected",
            ServerSignatureInvalid => "ServerSignatureInvalid",
            CredentialUnavailable(_) => "CredentialUnavailable",
            NoSupportedMechanism(_) => "NoSupportedMechanism",
            CryptoUnavailable(_) => "CryptoUnavailable",
            MalformedChallenge(_) => "MalformedChallenge",
            UnsupportedExtension => "UnsupportedExtension",
            InvalidUser(_) => "InvalidUser",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::Error::*;
        use self::Kind::*;
        match *self {
            Protocol(InvalidField(ref field)) => write!(fmt, "Invalid field {:?}", field),
            Protocol(ExpectedField(ref field)) => write!(fmt, "Expected field {:?}", field),
            Protocol(UnexpectedMessage) => write!(fmt, "Unexpected message after completion"),
            Protocol(LengthMismatch { left, right }) => {
                write!(fmt, "Length mismatch: {} != {}", left, right)
            }
            Protocol(InvalidEncoding) => write!(fmt, "Message is not valid UTF-8"),
            Protocol(InvalidAttribute(ref part)) => write!(fmt, "Invalid attribute '{}'", part),
            NonceMismatch => write!(fmt, "Invalid nonce"),
            WeakParameters { iterations, minimum } => write!(
                fmt,
                "Announced iteration count too small: {} < {}",
                iterations, minimum
            ),
            ServerRejected(ref msg) => write!(fmt, "authentication error {}", msg),
            ServerSignatureInvalid => write!(fmt, "Server failed validation"),
            CredentialUnavailable(ref reason) => {
                write!(fmt, "Credentials unavailable: {}", reason)
            }
            NoSupportedMechanism(ref offered) => write!(
                fmt,
                "No supported mechanism among [{}]",
                offered.join(", ")
            ),
            CryptoUnavailable(ref what) => write!(fmt, "Crypto unavailable: {}", what),
            MalformedChallenge(ref reason) => write!(fmt, "Malformed challenge: {}", reason),
            UnsupportedExtension => write!(fmt, "Unsupported extension"),
            InvalidUser(ref username) => write!(fmt, "Invalid user: '{}'", username),
        }
    }
}

impl error::Error for Error {}

/// A `Result` alias where the `Err` case is `sasl_handshake::Error`.
pub type Result<T> = ::std::result::Result<T, Error>;
