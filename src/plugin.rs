//! The SASL authentication plugin a connection sequencer drives with raw server packets.
//!
//! The server's first packet names the mechanism to use. Every following packet is a challenge
//! of that mechanism. The sequencer owns the transport and sends whatever the plugin returns.

use std::str;

use tracing::debug;

use crate::client::ScramClient;
use crate::config::ScramConfig;
use crate::error::{Error, Field, Kind, Result};
use crate::selector::{CredentialSource, MechanismSelector};

/// The name the server uses to request this plugin.
pub const PLUGIN_NAME: &str = "authentication_ldap_sasl_client";

/// Client half of the `authentication_ldap_sasl_client` authentication method.
#[derive(Debug)]
pub struct LdapSaslPlugin<C> {
    source: C,
    selector: MechanismSelector,
    client: Option<ScramClient>,
}

impl<C: CredentialSource> LdapSaslPlugin<C> {
    /// Constructs a plugin taking its credentials from `source`.
    pub fn new(source: C) -> Self {
        Self::with_config(source, ScramConfig::default())
    }

    /// Constructs a plugin whose exchanges use `config`.
    pub fn with_config(source: C, config: ScramConfig) -> Self {
        LdapSaslPlugin {
            source,
            selector: MechanismSelector::new(config),
            client: None,
        }
    }

    /// The protocol name of the plugin.
    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// Returns `true` once the running exchange verified the server.
    pub fn is_authenticated(&self) -> bool {
        self.client.as_ref().map_or(false, ScramClient::is_complete)
    }

    /// Processes one packet from the server and returns the packet to send back, if any.
    ///
    /// The first packet carries the mechanism name, optionally NUL terminated. The plugin
    /// creates the exchange and answers with the client first message right away.
    pub fn next_authentication_step(&mut self, from_server: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.client {
            Some(ref mut client) => client.evaluate_challenge(from_server),
            None => {
                let name = mechanism_name(from_server)?;
                let mut client = self.selector.select(&[name], &mut self.source)?;
                debug!(plugin = PLUGIN_NAME, mechanism = name, "starting SASL exchange");
                let response = if client.has_initial_response() {
                    client.evaluate_challenge(&[])?
                } else {
                    None
                };
                self.client = Some(client);
                Ok(response)
            }
        }
    }

    /// Discards the running exchange. The next packet is expected to name a mechanism again.
    pub fn reset(&mut self) {
        self.client = None;
    }
}

fn mechanism_name(packet: &[u8]) -> Result<&str> {
    let packet = match packet.iter().position(|&byte| byte == 0) {
        Some(end) => &packet[..end],
        None => packet,
    };
    let name = str::from_utf8(packet)
        .map_err(|_| Error::Protocol(Kind::InvalidField(Field::Mechanism)))?
        .trim();
    if name.is_empty() {
        return Err(Error::Protocol(Kind::ExpectedField(Field::Mechanism)));
    }
    Ok(name)
}
