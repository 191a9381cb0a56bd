//! Picking a mechanism from the peer's offer.

use std::error;
use std::fmt;

use tracing::debug;

use crate::client::{Credentials, ScramClient};
use crate::config::ScramConfig;
use crate::error::{Error, Result};
use crate::mechanism::Mechanism;

/// The error type credential sources report.
pub type CredentialError = Box<dyn error::Error + Send + Sync>;

/// Supplies the identity and secret for an exchange.
///
/// Implementations may block, e.g. to prompt a user. They're called at most once per exchange and
/// never retried.
pub trait CredentialSource {
    /// The username used for authentication.
    fn authentication_id(&mut self) -> ::std::result::Result<String, CredentialError>;

    /// The password of the authentication id.
    fn password(&mut self) -> ::std::result::Result<String, CredentialError>;

    /// The username to act as. The default implementation authorizes as the authentication id.
    fn authorization_id(&mut self) -> ::std::result::Result<Option<String>, CredentialError> {
        Ok(None)
    }
}

/// A credential source for credentials that are known up front.
#[derive(Clone)]
pub struct StaticCredentials {
    authentication_id: String,
    password: String,
    authorization_id: Option<String>,
}

impl StaticCredentials {
    /// Constructs a source always returning the given username and password.
    pub fn new<U, P>(authentication_id: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        StaticCredentials {
            authentication_id: authentication_id.into(),
            password: password.into(),
            authorization_id: None,
        }
    }

    /// Also returns `authorization_id` as the identity to act as.
    pub fn with_authorization_id<A: Into<String>>(mut self, authorization_id: A) -> Self {
        self.authorization_id = Some(authorization_id.into());
        self
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("StaticCredentials")
            .field("authentication_id", &self.authentication_id)
            .field("authorization_id", &self.authorization_id)
            .finish()
    }
}

impl Drop for StaticCredentials {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.password.zeroize();
    }
}

impl CredentialSource for StaticCredentials {
    fn authentication_id(&mut self) -> ::std::result::Result<String, CredentialError> {
        Ok(self.authentication_id.clone())
    }

    fn password(&mut self) -> ::std::result::Result<String, CredentialError> {
        Ok(self.password.clone())
    }

    fn authorization_id(&mut self) -> ::std::result::Result<Option<String>, CredentialError> {
        Ok(self.authorization_id.clone())
    }
}

/// Creates exchanges for offered mechanism names.
#[derive(Clone, Debug, Default)]
pub struct MechanismSelector {
    config: ScramConfig,
}

impl MechanismSelector {
    /// Constructs a selector whose exchanges use `config`.
    pub fn new(config: ScramConfig) -> Self {
        MechanismSelector { config }
    }

    /// Returns the first supported mechanism in `offered`, keeping the peer's order.
    pub fn find<S: AsRef<str>>(offered: &[S]) -> Option<&'static Mechanism> {
        offered.iter().find_map(|name| Mechanism::by_name(name.as_ref()))
    }

    /// Picks the first supported mechanism in `offered` and constructs an exchange with the
    /// credentials from `source`. The source is only consulted once a mechanism matched.
    ///
    /// # Return value
    ///
    /// * `Error::NoSupportedMechanism` if no offered name is supported.
    /// * `Error::CredentialUnavailable` if the source failed.
    pub fn select<S, C>(&self, offered: &[S], source: &mut C) -> Result<ScramClient>
    where
        S: AsRef<str>,
        C: CredentialSource + ?Sized,
    {
        let mechanism = Self::find(offered).ok_or_else(|| {
            let offered = offered.iter().map(|name| name.as_ref().to_string());
            Error::NoSupportedMechanism(offered.collect())
        })?;
        debug!(mechanism = mechanism.name(), "selected SASL mechanism");

        let authentication_id = source.authentication_id().map_err(unavailable)?;
        let password = source.password().map_err(unavailable)?;
        let mut credentials = Credentials::new(authentication_id, password);
        if let Some(authorization_id) = source.authorization_id().map_err(unavailable)? {
            credentials = credentials.with_authorization_id(authorization_id);
        }
        ScramClient::with_config(mechanism, credentials, &self.config)
    }
}

fn unavailable(error: CredentialError) -> Error {
    Error::CredentialUnavailable(error.to_string())
}

/// Picks a mechanism with the default configuration. See
/// [`MechanismSelector::select`](struct.MechanismSelector.html#method.select).
pub fn select_mechanism<S, C>(offered: &[S], source: &mut C) -> Result<ScramClient>
where
    S: AsRef<str>,
    C: CredentialSource + ?Sized,
{
    MechanismSelector::default().select(offered, source)
}
