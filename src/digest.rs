//! HTTP Digest authentication (RFC 2617, `qop=auth`) for the cluster-management XML-RPC endpoint.
//!
//! The transport receives a `WWW-Authenticate` header, calls
//! [`build_authorization_header`](fn.build_authorization_header.html) once and resends its
//! request with the returned `Authorization` value. One header answers exactly one request; the
//! nonce count is always `00000001`.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use rand::RngCore;
use ring::digest;

use crate::error::{Error, Field, Kind, Result};

/// The only request URI of the management endpoint.
pub const RPC_URI: &str = "/RPC2";

/// Nonce count of the first (and only) request answered per challenge.
pub const NONCE_COUNT: &str = "00000001";

/// The request method used for every RPC call.
const METHOD: &str = "POST";

const PREFIX: &str = "Digest ";

/// The attributes of a `WWW-Authenticate: Digest ...` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    params: BTreeMap<String, String>,
}

impl DigestChallenge {
    /// Returns the unquoted value of attribute `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Iterates over all attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the challenge carries no attribute.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn require(&self, name: &str, field: Field) -> Result<&str> {
        self.get(name).ok_or(Error::Protocol(Kind::ExpectedField(field)))
    }
}

/// Hash function named by the challenge's `algorithm` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// `MD5`, the default when the challenge doesn't name an algorithm.
    Md5,
    /// `SHA-256` (RFC 7616).
    Sha256,
}

impl DigestAlgorithm {
    /// Resolves an `algorithm` attribute value. The comparison ignores case.
    pub fn by_name(name: Option<&str>) -> Result<Self> {
        match name {
            None => Ok(DigestAlgorithm::Md5),
            Some(name) if name.eq_ignore_ascii_case("MD5") => Ok(DigestAlgorithm::Md5),
            Some(name) if name.eq_ignore_ascii_case("SHA-256") => Ok(DigestAlgorithm::Sha256),
            Some(name) => Err(Error::CryptoUnavailable(format!("digest algorithm {}", name))),
        }
    }

    /// The attribute value of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Lowercase hex digest of `data`.
    fn hash_hex(self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 => to_hex(&Md5::digest(data.as_bytes())),
            DigestAlgorithm::Sha256 => {
                to_hex(digest::digest(&digest::SHA256, data.as_bytes()).as_ref())
            }
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Parses the value of a `WWW-Authenticate` header.
///
/// The value must start with `Digest `. Attributes are separated by commas and split at their
/// first `=`; surrounding quotes are removed from values. Commas inside quoted values don't
/// separate attributes, backslash escapes inside quotes are kept as they are.
pub fn parse_challenge(header: &str) -> Result<DigestChallenge> {
    let attributes = header.strip_prefix(PREFIX).ok_or_else(|| {
        Error::MalformedChallenge(format!("missing '{}' prefix", PREFIX.trim()))
    })?;

    let mut params = BTreeMap::new();
    for part in split_unquoted(attributes) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, value) = match part.find('=') {
            Some(pos) if pos > 0 => (part[..pos].trim(), part[pos + 1..].trim()),
            _ => return Err(Error::MalformedChallenge(format!("invalid attribute '{}'", part))),
        };
        params.insert(name.to_string(), unquote(value).to_string());
    }
    Ok(DigestChallenge { params })
}

/// Splits at commas that aren't inside a quoted string.
fn split_unquoted(data: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (pos, chr) in data.char_indices() {
        match chr {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&data[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&data[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Wraps `value` in double quotes, escaping `"` and `\`.
pub fn quote_param(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for chr in value.chars() {
        if chr == '"' || chr == '\\' {
            quoted.push('\\');
        }
        quoted.push(chr);
    }
    quoted.push('"');
    quoted
}

/// Inputs of the `response` attribute.
#[derive(Clone, Copy, Debug)]
pub struct DigestInput<'a> {
    /// Request URI.
    pub uri: &'a str,
    /// Username.
    pub username: &'a str,
    /// Password, never sent.
    pub password: &'a str,
    /// Realm from the challenge.
    pub realm: &'a str,
    /// Server nonce from the challenge.
    pub nonce: &'a str,
    /// Nonce count, eight hex digits.
    pub nc: &'a str,
    /// Client nonce.
    pub cnonce: &'a str,
    /// Quality of protection, `auth`.
    pub qop: &'a str,
}

/// Computes the `response` attribute of a `POST` request:
/// `H(H(username:realm:password):nonce:nc:cnonce:qop:H(POST:uri))`.
pub fn compute_response_digest(algorithm: DigestAlgorithm, input: &DigestInput) -> String {
    response_digest(algorithm, METHOD, input)
}

fn response_digest(algorithm: DigestAlgorithm, method: &str, input: &DigestInput) -> String {
    let ha1 = algorithm.hash_hex(&format!("{}:{}:{}", input.username, input.realm, input.password));
    let ha2 = algorithm.hash_hex(&format!("{}:{}", method, input.uri));
    algorithm.hash_hex(&format!(
        "{}:{}:{}:{}:{}:{}",
        ha1, input.nonce, input.nc, input.cnonce, input.qop, ha2
    ))
}

/// Generates a client nonce from the server nonce, the nonce count, the current time and eight
/// random bytes, hashed with SHA-1 and base64 encoded.
///
/// The value is unique, not secret.
pub fn generate_client_nonce<R: RngCore>(
    server_nonce: &str,
    nc: &str,
    rng: &mut R,
) -> Result<String> {
    let mut random = [0u8; 8];
    rng.try_fill_bytes(&mut random)
        .map_err(|e| Error::CryptoUnavailable(format!("random source: {}", e)))?;
    let printable: String = random.iter().map(|&byte| (0x20 + byte % 95) as char).collect();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let combo = format!("{}:{}:{}:{}", server_nonce, nc, timestamp, printable);
    let hashed = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, combo.as_bytes());
    Ok(base64::encode(hashed.as_ref()))
}

/// Builds the `Authorization` header value answering `challenge` for the `/RPC2` endpoint.
pub fn build_authorization_header<R: RngCore>(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    rng: &mut R,
) -> Result<String> {
    let nonce = challenge.require("nonce", Field::Nonce)?;
    let cnonce = generate_client_nonce(nonce, NONCE_COUNT, rng)?;
    build_authorization_header_with_cnonce(challenge, username, password, &cnonce)
}

/// Like [`build_authorization_header`](fn.build_authorization_header.html) with a fixed client
/// nonce.
pub fn build_authorization_header_with_cnonce(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    cnonce: &str,
) -> Result<String> {
    let realm = challenge.require("realm", Field::Realm)?;
    let nonce = challenge.require("nonce", Field::Nonce)?;
    let qop = challenge.require("qop", Field::Qop)?;
    if !qop.split(',').any(|option| option.trim() == "auth") {
        return Err(Error::Protocol(Kind::InvalidField(Field::Qop)));
    }
    let named_algorithm = challenge.get("algorithm");
    let algorithm = DigestAlgorithm::by_name(named_algorithm)?;

    let response = compute_response_digest(
        algorithm,
        &DigestInput {
            uri: RPC_URI,
            username,
            password,
            realm,
            nonce,
            nc: NONCE_COUNT,
            cnonce,
            qop: "auth",
        },
    );

    let mut header = format!(
        "Digest username={}, realm={}, nonce={}, uri={}, qop=auth, nc={}, cnonce={}, response={}",
        quote_param(username),
        quote_param(realm),
        quote_param(nonce),
        quote_param(RPC_URI),
        NONCE_COUNT,
        quote_param(cnonce),
        quote_param(&response),
    );
    if let Some(opaque) = challenge.get("opaque") {
        header.push_str(", opaque=");
        header.push_str(&quote_param(opaque));
    }
    if named_algorithm.is_some() {
        header.push_str(", algorithm=");
        header.push_str(algorithm.name());
    }
    Ok(header)
}
