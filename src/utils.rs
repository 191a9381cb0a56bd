use std::borrow::Cow;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::UsernameEscaping;
use crate::error::{Error, Kind, Result};
use crate::mechanism::Mechanism;

/// Splits a SCRAM message into its `key=value` attributes, keeping wire order. Values may
/// contain `=`; only the first one separates the key.
pub(crate) fn parse_attributes(data: &str) -> Result<Vec<(&str, &str)>> {
    data.split(',')
        .map(|part| match part.find('=') {
            Some(pos) if pos > 0 => Ok((&part[..pos], &part[pos + 1..])),
            _ => Err(Error::Protocol(Kind::InvalidAttribute(part.to_string()))),
        })
        .collect()
}

/// Returns the value of the first attribute named `key`.
pub(crate) fn find_attribute<'a>(attributes: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|&&(name, _)| name == key)
        .map(|&(_, value)| value)
}

/// Escapes `=` and `,` in a SASL name. `=` is replaced first so the escape sequences of `,` are
/// left alone.
pub(crate) fn escape_username(name: &str, escaping: UsernameEscaping) -> Cow<'_, str> {
    if !name.chars().any(|chr| chr == ',' || chr == '=') {
        return name.into();
    }
    let equals = match escaping {
        UsernameEscaping::Legacy => "=2D",
        UsernameEscaping::Rfc5802 => "=3D",
    };
    name.replace('=', equals).replace(',', "=2C").into()
}

/// Normalizes a username with SASLprep and escapes it for use in a message.
pub(crate) fn prep_username(name: &str, escaping: UsernameEscaping) -> Result<String> {
    let prepared =
        stringprep::saslprep(name).map_err(|_| Error::InvalidUser(name.to_string()))?;
    Ok(escape_username(&prepared, escaping).into_owned())
}

/// Normalizes a password with SASLprep. Passwords with prohibited characters are used as they
/// are, the server applies the same rule.
pub(crate) fn prep_password(password: &str) -> Zeroizing<Vec<u8>> {
    match stringprep::saslprep(password) {
        Ok(prepared) => Zeroizing::new(prepared.as_bytes().to_vec()),
        Err(_) => Zeroizing::new(password.as_bytes().to_vec()),
    }
}

/// Generates `length` random printable ASCII characters (`!` to `~`) without `,`.
///
/// A source that keeps producing only rejected bytes is reported as unavailable.
pub(crate) fn generate_nonce<R: RngCore>(rng: &mut R, length: usize) -> Result<String> {
    // 93 candidate characters; bytes >= 186 are rejected to keep the distribution uniform.
    const CHARS: u8 = 93;
    const MAX_FILLS_WITHOUT_PROGRESS: usize = 16;
    let mut nonce = String::with_capacity(length);
    let mut buffer = [0u8; 64];
    let mut fills_without_progress = 0;
    while nonce.len() < length {
        if fills_without_progress == MAX_FILLS_WITHOUT_PROGRESS {
            return Err(Error::CryptoUnavailable(
                "secure random source yields no usable bytes".to_string(),
            ));
        }
        rng.try_fill_bytes(&mut buffer)
            .map_err(|e| Error::CryptoUnavailable(format!("secure random source: {}", e)))?;
        let before = nonce.len();
        for &byte in buffer.iter().filter(|&&byte| byte < CHARS * 2) {
            let x = 33 + byte % CHARS;
            nonce.push(if x > 43 { (x + 1) as char } else { x as char });
            if nonce.len() == length {
                break;
            }
        }
        if nonce.len() == before {
            fills_without_progress += 1;
        } else {
            fills_without_progress = 0;
        }
    }
    Ok(nonce)
}

/// XORs two buffers of the same length.
pub(crate) fn xor(left: &[u8], right: &[u8]) -> Result<Vec<u8>> {
    if left.len() != right.len() {
        return Err(Error::Protocol(Kind::LengthMismatch {
            left: left.len(),
            right: right.len(),
        }));
    }
    Ok(left.iter().zip(right).map(|(l, r)| l ^ r).collect())
}

/// Output of [`find_proofs`].
pub(crate) struct Proofs {
    pub client_final_without_proof: String,
    pub client_proof: Vec<u8>,
    pub server_signature: Vec<u8>,
}

/// Finds the client proof and the expected server signature based on the salted password.
///
/// `client_first_bare` and `server_first` must be the exact strings exchanged on the wire.
pub(crate) fn find_proofs(
    mechanism: &Mechanism,
    gs2header: &str,
    client_first_bare: &str,
    server_first: &str,
    salted_password: &[u8],
    nonce: &str,
) -> Result<Proofs> {
    let client_final_without_proof =
        format!("c={},r={}", base64::encode(gs2header.as_bytes()), nonce);
    let auth_message = [
        client_first_bare.as_bytes(),
        b",",
        server_first.as_bytes(),
        b",",
        client_final_without_proof.as_bytes(),
    ];

    let client_key = Zeroizing::new(mechanism.hmac(salted_password, b"Client Key"));
    let stored_key = mechanism.h(&client_key);
    let client_signature = mechanism.hmac_parts(&stored_key, &auth_message);
    let client_proof = xor(&client_key, &client_signature)?;

    let server_key = Zeroizing::new(mechanism.hmac(salted_password, b"Server Key"));
    let server_signature = mechanism.hmac_parts(&server_key, &auth_message);

    Ok(Proofs {
        client_final_without_proof,
        client_proof,
        server_signature,
    })
}
