//! The client side of the SCRAM exchange.
//!
//! [`ScramClient`](struct.ScramClient.html) drives one authentication attempt. Each call to
//! [`evaluate_challenge`](struct.ScramClient.html#method.evaluate_challenge) consumes the
//! current stage and either produces the next one or leaves the exchange terminated.

use std::convert::TryFrom;
use std::fmt;
use std::mem;
use std::str;

use rand::rngs::OsRng;
use rand::RngCore;
use ring::constant_time;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::config::{ScramConfig, UsernameEscaping};
use crate::error::{Error, Field, Kind, Result};
use crate::mechanism::Mechanism;
use crate::utils::{
    find_attribute, find_proofs, generate_nonce, parse_attributes, prep_password, prep_username,
};

/// The identity and secret used for one exchange.
pub struct Credentials {
    authentication_id: String,
    password: Zeroizing<String>,
    authorization_id: Option<String>,
}

impl Credentials {
    /// Constructs credentials for `authentication_id`. The authorized identity is the same as the
    /// authenticated one unless [`with_authorization_id`](#method.with_authorization_id) is used.
    pub fn new<U, P>(authentication_id: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        Credentials {
            authentication_id: authentication_id.into(),
            password: Zeroizing::new(password.into()),
            authorization_id: None,
        }
    }

    /// Impersonates `authorization_id` using the credentials of the authentication id.
    pub fn with_authorization_id<A: Into<String>>(mut self, authorization_id: A) -> Self {
        self.authorization_id = Some(authorization_id.into());
        self
    }

    /// The username used for authentication.
    pub fn authentication_id(&self) -> &str {
        &self.authentication_id
    }

    /// The username used for authorization, if it differs.
    pub fn authorization_id(&self) -> Option<&str> {
        self.authorization_id.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Credentials")
            .field("authentication_id", &self.authentication_id)
            .field("password", &"<redacted>")
            .field("authorization_id", &self.authorization_id)
            .finish()
    }
}

/// The observable position of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeStage {
    /// The client first message hasn't been produced yet.
    ClientFirst,
    /// Waiting for the server first message; the reply is the client final message.
    ServerFirstClientFinal,
    /// Waiting for the server final message.
    ServerFinal,
    /// Finished, successfully or not. The exchange can't be used again.
    Terminated,
}

/// One SCRAM authentication attempt.
///
/// The exchange is single use. Once it is terminated, successfully or because of an error, every
/// further call fails and a new instance is needed for another attempt.
pub struct ScramClient {
    mechanism: &'static Mechanism,
    min_iterations: u32,
    stage: Stage,
}

enum Stage {
    ClientFirst(ClientFirst),
    ServerFirst(ServerFirst),
    ServerFinal(ServerFinal),
    Terminated { authenticated: bool },
}

impl ScramClient {
    /// Constructs an exchange with the default configuration and the operating system's random
    /// number generator.
    pub fn new(mechanism: &'static Mechanism, credentials: Credentials) -> Result<Self> {
        Self::with_config(mechanism, credentials, &ScramConfig::default())
    }

    /// Constructs an exchange using `config` and the operating system's random number generator.
    pub fn with_config(
        mechanism: &'static Mechanism,
        credentials: Credentials,
        config: &ScramConfig,
    ) -> Result<Self> {
        Self::with_rng(mechanism, credentials, config, &mut OsRng)
    }

    /// Constructs an exchange whose client nonce is drawn from `rng`. Please only use a
    /// cryptographically secure random number generator!
    pub fn with_rng<R: RngCore>(
        mechanism: &'static Mechanism,
        credentials: Credentials,
        config: &ScramConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let nonce = generate_nonce(rng, config.get_nonce_length())?;
        Self::with_nonce(mechanism, credentials, config, &nonce)
    }

    /// Constructs an exchange with a fixed client nonce. This is meant for reproducing test
    /// vectors; a nonce must never be used twice.
    pub fn with_nonce(
        mechanism: &'static Mechanism,
        credentials: Credentials,
        config: &ScramConfig,
        nonce: &str,
    ) -> Result<Self> {
        if nonce.is_empty() || nonce.contains(',') {
            return Err(Error::Protocol(Kind::InvalidField(Field::Nonce)));
        }
        Ok(ScramClient {
            mechanism,
            min_iterations: config.effective_min_iterations(mechanism),
            stage: Stage::ClientFirst(ClientFirst {
                credentials,
                nonce: nonce.to_string(),
                escaping: config.get_username_escaping(),
            }),
        })
    }

    /// The mechanism this exchange runs.
    pub fn mechanism(&self) -> &'static Mechanism {
        self.mechanism
    }

    /// The client sends the first message, so the first call ignores its input.
    pub fn has_initial_response(&self) -> bool {
        true
    }

    /// Returns the current stage.
    pub fn stage(&self) -> ExchangeStage {
        match self.stage {
            Stage::ClientFirst(_) => ExchangeStage::ClientFirst,
            Stage::ServerFirst(_) => ExchangeStage::ServerFirstClientFinal,
            Stage::ServerFinal(_) => ExchangeStage::ServerFinal,
            Stage::Terminated { .. } => ExchangeStage::Terminated,
        }
    }

    /// Returns `true` once the server signature has been verified.
    pub fn is_complete(&self) -> bool {
        match self.stage {
            Stage::Terminated { authenticated } => authenticated,
            _ => false,
        }
    }

    /// Processes the peer's challenge and returns the response to send back.
    ///
    /// # Return value
    ///
    /// * The first call returns the client first message; `challenge` is ignored.
    /// * The second call processes the server first message and returns the client final
    ///   message.
    /// * The third call verifies the server final message and returns `Ok(None)` on success.
    ///
    /// Any error terminates the exchange. Calls after termination fail with
    /// `Error::Protocol(Kind::UnexpectedMessage)`.
    pub fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        let stage = mem::replace(&mut self.stage, Stage::Terminated { authenticated: false });
        let result = self.advance(stage, challenge);
        if let Err(ref error) = result {
            warn!(mechanism = self.mechanism.name(), %error, "SCRAM exchange aborted");
        }
        result
    }

    fn advance(&mut self, stage: Stage, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        match stage {
            Stage::ClientFirst(state) => {
                let (next, client_first) = state.client_first()?;
                trace!(mechanism = self.mechanism.name(), "client first message computed");
                self.stage = Stage::ServerFirst(next);
                Ok(Some(client_first.into_bytes()))
            }
            Stage::ServerFirst(state) => {
                let server_first = decode(challenge)?;
                let (next, client_final) =
                    state.handle_server_first(self.mechanism, self.min_iterations, server_first)?;
                trace!(mechanism = self.mechanism.name(), "client final message computed");
                self.stage = Stage::ServerFinal(next);
                Ok(Some(client_final.into_bytes()))
            }
            Stage::ServerFinal(state) => {
                state.handle_server_final(decode(challenge)?)?;
                debug!(mechanism = self.mechanism.name(), "server signature verified");
                self.stage = Stage::Terminated { authenticated: true };
                Ok(None)
            }
            Stage::Terminated { authenticated } => {
                self.stage = Stage::Terminated { authenticated };
                Err(Error::Protocol(Kind::UnexpectedMessage))
            }
        }
    }
}

impl fmt::Debug for ScramClient {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ScramClient")
            .field("mechanism", &self.mechanism.name())
            .field("min_iterations", &self.min_iterations)
            .field("stage", &self.stage())
            .finish()
    }
}

fn decode(challenge: &[u8]) -> Result<&str> {
    str::from_utf8(challenge).map_err(|_| Error::Protocol(Kind::InvalidEncoding))
}

/// The initial state, holding the credentials and the client nonce.
struct ClientFirst {
    credentials: Credentials,
    nonce: String,
    escaping: UsernameEscaping,
}

impl ClientFirst {
    /// Returns the next state and the client first message.
    fn client_first(self) -> Result<(ServerFirst, String)> {
        let gs2header = match self.credentials.authorization_id {
            Some(ref authzid) => format!("n,a={},", prep_username(authzid, self.escaping)?),
            None => "n,,".to_string(),
        };
        let authcid = prep_username(&self.credentials.authentication_id, self.escaping)?;
        let client_first_bare = format!("n={},r={}", authcid, self.nonce);
        let client_first = format!("{}{}", gs2header, client_first_bare);
        let server_first = ServerFirst {
            gs2header,
            password: self.credentials.password,
            client_nonce: self.nonce,
            client_first_bare,
        };
        Ok((server_first, client_first))
    }
}

/// The state after the client first message was computed.
struct ServerFirst {
    gs2header: String,
    password: Zeroizing<String>,
    client_nonce: String,
    client_first_bare: String,
}

/// Parses a `server_first_message` returning a (nonce, salt, iterations) tuple of raw values.
fn parse_server_first(data: &str) -> Result<(&str, &str, &str)> {
    let attributes = parse_attributes(data)?;
    if let Some(&("m", _)) = attributes.first() {
        return Err(Error::UnsupportedExtension);
    }
    let nonce = find_attribute(&attributes, "r")
        .ok_or(Error::Protocol(Kind::ExpectedField(Field::Nonce)))?;
    let salt = find_attribute(&attributes, "s")
        .ok_or(Error::Protocol(Kind::ExpectedField(Field::Salt)))?;
    let iterations = find_attribute(&attributes, "i")
        .ok_or(Error::Protocol(Kind::ExpectedField(Field::Iterations)))?;
    Ok((nonce, salt, iterations))
}

impl ServerFirst {
    /// Processes the server first message and returns the next state and the client final
    /// message. The password is dropped once the salted password has been derived.
    fn handle_server_first(
        self,
        mechanism: &Mechanism,
        min_iterations: u32,
        server_first: &str,
    ) -> Result<(ServerFinal, String)> {
        let (nonce, salt, iterations) = parse_server_first(server_first)?;
        if !nonce.starts_with(&self.client_nonce) {
            return Err(Error::NonceMismatch);
        }
        let iterations: i64 = iterations
            .parse()
            .map_err(|_| Error::Protocol(Kind::InvalidField(Field::Iterations)))?;
        if iterations < i64::from(min_iterations) {
            return Err(Error::WeakParameters {
                iterations,
                minimum: min_iterations,
            });
        }
        let iterations = u32::try_from(iterations)
            .map_err(|_| Error::Protocol(Kind::InvalidField(Field::Iterations)))?;
        let salt = base64::decode(salt.as_bytes())
            .map_err(|_| Error::Protocol(Kind::InvalidField(Field::Salt)))?;

        let ServerFirst {
            gs2header,
            password,
            client_first_bare,
            ..
        } = self;
        let salted_password = {
            let normalized = prep_password(&password);
            drop(password);
            mechanism.hi(&normalized, &salt, iterations)?
        };

        let proofs = find_proofs(
            mechanism,
            &gs2header,
            &client_first_bare,
            server_first,
            &salted_password,
            nonce,
        )?;
        let client_final = format!(
            "{},p={}",
            proofs.client_final_without_proof,
            base64::encode(&proofs.client_proof)
        );
        Ok((
            ServerFinal {
                server_signature: proofs.server_signature,
            },
            client_final,
        ))
    }
}

/// The state after the client final message was computed.
struct ServerFinal {
    server_signature: Vec<u8>,
}

impl ServerFinal {
    /// Processes the final answer from the server.
    ///
    /// * `Err(Error::ServerRejected(_))` carries the server's reason.
    /// * `Err(Error::ServerSignatureInvalid)` means the server couldn't prove it knows the
    ///   credentials and must not be trusted.
    fn handle_server_final(self, server_final: &str) -> Result<()> {
        if let Some(reason) = server_final.strip_prefix("e=") {
            return Err(Error::ServerRejected(reason.to_string()));
        }
        let attributes = parse_attributes(server_final)?;
        let verifier = find_attribute(&attributes, "v")
            .ok_or(Error::Protocol(Kind::ExpectedField(Field::VerifyOrError)))?;
        let verifier = base64::decode(verifier.as_bytes())
            .map_err(|_| Error::Protocol(Kind::InvalidField(Field::VerifyOrError)))?;
        constant_time::verify_slices_are_equal(&self.server_signature, &verifier)
            .map_err(|_| Error::ServerSignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_server_first, Credentials, ExchangeStage, ScramClient};

    use crate::config::ScramConfig;
    use crate::error::{Error, Field, Kind};
    use crate::mechanism::{SCRAM_SHA_1, SCRAM_SHA_256};

    const NONCE: &str = "fyko+d2lbbFgONRv9qkxdawL";
    const SERVER_FIRST: &str =
        "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096";

    fn client() -> ScramClient {
        ScramClient::with_nonce(
            &SCRAM_SHA_1,
            Credentials::new("user", "pencil"),
            &ScramConfig::default(),
            NONCE,
        )
        .unwrap()
    }

    fn started() -> ScramClient {
        let mut client = client();
        client.evaluate_challenge(b"").unwrap();
        client
    }

    #[test]
    fn test_parse_server_first_success() {
        let (nonce, salt, iterations) = parse_server_first(SERVER_FIRST).unwrap();
        assert_eq!(nonce, "fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j");
        assert_eq!(salt, "QSXCR+Q6sek8bf92");
        assert_eq!(iterations, "4096");

        // Attribute order isn't fixed.
        let (nonce, salt, iterations) = parse_server_first("i=4096,s=c2FsdA==,r=abc").unwrap();
        assert_eq!((nonce, salt, iterations), ("abc", "c2FsdA==", "4096"));
    }

    #[test]
    fn test_parse_server_first_missing_fields() {
        assert_eq!(
            parse_server_first("s=c2FsdA==,i=4096").unwrap_err(),
            Error::Protocol(Kind::ExpectedField(Field::Nonce))
        );
        assert_eq!(
            parse_server_first("r=abc,i=4096").unwrap_err(),
            Error::Protocol(Kind::ExpectedField(Field::Salt))
        );
        assert_eq!(
            parse_server_first("r=abc,s=c2FsdA==").unwrap_err(),
            Error::Protocol(Kind::ExpectedField(Field::Iterations))
        );
        assert_eq!(
            parse_server_first("m=ext,r=abc,s=c2FsdA==,i=4096").unwrap_err(),
            Error::UnsupportedExtension
        );
    }

    #[test]
    fn test_client_first() {
        let mut client = client();
        assert!(client.has_initial_response());
        assert_eq!(client.stage(), ExchangeStage::ClientFirst);
        let client_first = client.evaluate_challenge(b"ignored").unwrap().unwrap();
        assert_eq!(client_first, b"n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL");
        assert_eq!(client.stage(), ExchangeStage::ServerFirstClientFinal);
    }

    #[test]
    fn test_client_first_authzid_and_escaping() {
        let credentials = Credentials::new("ad=min,1", "pencil").with_authorization_id("us,er");
        let config = ScramConfig::default();
        let mut client =
            ScramClient::with_nonce(&SCRAM_SHA_256, credentials, &config, NONCE).unwrap();
        let client_first = client.evaluate_challenge(b"").unwrap().unwrap();
        assert_eq!(
            String::from_utf8(client_first).unwrap(),
            "n,a=us=2Cer,n=ad=2Dmin=2C1,r=fyko+d2lbbFgONRv9qkxdawL"
        );
    }

    #[test]
    fn test_invalid_nonce_rejected() {
        let config = ScramConfig::default();
        for nonce in &["", "abc,def"] {
            let credentials = Credentials::new("user", "p");
            let result = ScramClient::with_nonce(&SCRAM_SHA_1, credentials, &config, nonce);
            assert_eq!(result.unwrap_err(), Error::Protocol(Kind::InvalidField(Field::Nonce)));
        }
    }

    #[test]
    fn test_generated_nonce() {
        let config = ScramConfig::default().nonce_length(40);
        let credentials = Credentials::new("user", "pencil");
        let mut client = ScramClient::with_config(&SCRAM_SHA_256, credentials, &config).unwrap();
        let client_first =
            String::from_utf8(client.evaluate_challenge(b"").unwrap().unwrap()).unwrap();
        let nonce = client_first.strip_prefix("n,,n=user,r=").unwrap();
        assert_eq!(nonce.len(), 40);
        assert!(!nonce.contains(','));
    }

    #[test]
    fn test_nonce_mismatch() {
        let mut client = started();
        assert_eq!(
            client
                .evaluate_challenge(b"r=XXXXd2lbbFgONRv9qkxdawL3rfc,s=QSXCR+Q6sek8bf92,i=4096")
                .unwrap_err(),
            Error::NonceMismatch
        );
        assert_eq!(client.stage(), ExchangeStage::Terminated);
        assert!(!client.is_complete());
    }

    #[test]
    fn test_nonce_checked_before_iterations() {
        let mut client = started();
        assert_eq!(
            client.evaluate_challenge(b"r=other,s=QSXCR+Q6sek8bf92,i=1").unwrap_err(),
            Error::NonceMismatch
        );
    }

    #[test]
    fn test_weak_parameters() {
        for iterations in &["1", "4095", "0", "-1", "-4096"] {
            let mut client = started();
            let server_first = format!("r={}3rfc,s=QSXCR+Q6sek8bf92,i={}", NONCE, iterations);
            assert_eq!(
                client.evaluate_challenge(server_first.as_bytes()).unwrap_err(),
                Error::WeakParameters {
                    iterations: iterations.parse().unwrap(),
                    minimum: 4096
                }
            );
            assert_eq!(client.stage(), ExchangeStage::Terminated);
        }
    }

    #[test]
    fn test_configured_minimum() {
        let config = ScramConfig::default().min_iterations(8192);
        let credentials = Credentials::new("user", "pencil");
        let mut client =
            ScramClient::with_nonce(&SCRAM_SHA_1, credentials, &config, NONCE).unwrap();
        client.evaluate_challenge(b"").unwrap();
        assert_eq!(
            client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap_err(),
            Error::WeakParameters {
                iterations: 4096,
                minimum: 8192
            }
        );
    }

    #[test]
    fn test_invalid_server_first_fields() {
        let mut client = started();
        let server_first = format!("r={}x,s=QSXCR,i=abc", NONCE);
        assert_eq!(
            client.evaluate_challenge(server_first.as_bytes()).unwrap_err(),
            Error::Protocol(Kind::InvalidField(Field::Iterations))
        );

        let mut client = started();
        let server_first = format!("r={}x,s=!!!,i=4096", NONCE);
        assert_eq!(
            client.evaluate_challenge(server_first.as_bytes()).unwrap_err(),
            Error::Protocol(Kind::InvalidField(Field::Salt))
        );

        let mut client = started();
        assert_eq!(
            client.evaluate_challenge(&[0xff, 0xfe]).unwrap_err(),
            Error::Protocol(Kind::InvalidEncoding)
        );
    }

    #[test]
    fn test_server_final_variants() {
        let mut client = started();
        client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(client.stage(), ExchangeStage::ServerFinal);
        assert_eq!(
            client.evaluate_challenge(b"e=invalid-proof").unwrap_err(),
            Error::ServerRejected("invalid-proof".to_string())
        );

        let mut client = started();
        client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(
            client.evaluate_challenge(b"x=something").unwrap_err(),
            Error::Protocol(Kind::ExpectedField(Field::VerifyOrError))
        );

        let mut client = started();
        client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(
            client.evaluate_challenge(b"v=not base64!").unwrap_err(),
            Error::Protocol(Kind::InvalidField(Field::VerifyOrError))
        );

        let mut client = started();
        client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(
            client.evaluate_challenge(b"v=AAAAAAAAAAAAAAAAAAAAAAAAAAA=").unwrap_err(),
            Error::ServerSignatureInvalid
        );
    }

    #[test]
    fn test_after_completion() {
        let mut client = started();
        client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(client.evaluate_challenge(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap(), None);
        assert!(client.is_complete());
        assert_eq!(
            client.evaluate_challenge(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap_err(),
            Error::Protocol(Kind::UnexpectedMessage)
        );
        assert!(client.is_complete());
    }

    #[test]
    fn test_after_failure() {
        let mut client = started();
        assert!(client.evaluate_challenge(b"garbage").is_err());
        assert_eq!(
            client.evaluate_challenge(SERVER_FIRST.as_bytes()).unwrap_err(),
            Error::Protocol(Kind::UnexpectedMessage)
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = Credentials::new("user", "pencil");
        assert!(!format!("{:?}", credentials).contains("pencil"));
        assert!(!format!("{:?}", client()).contains("pencil"));
    }
}
