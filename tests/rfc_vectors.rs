//! Published SCRAM test vectors.

use sasl_handshake::{
    Credentials, Mechanism, ScramClient, ScramConfig, SCRAM_SHA_1, SCRAM_SHA_256,
};

fn exchange(
    mechanism: &'static Mechanism,
    nonce: &str,
    server_first: &str,
    server_final: &str,
) -> (String, String) {
    let mut client = ScramClient::with_nonce(
        mechanism,
        Credentials::new("user", "pencil"),
        &ScramConfig::default(),
        nonce,
    )
    .unwrap();
    let client_first = client.evaluate_challenge(&[]).unwrap().unwrap();
    let client_final = client
        .evaluate_challenge(server_first.as_bytes())
        .unwrap()
        .unwrap();
    assert_eq!(client.evaluate_challenge(server_final.as_bytes()).unwrap(), None);
    assert!(client.is_complete());
    (
        String::from_utf8(client_first).unwrap(),
        String::from_utf8(client_final).unwrap(),
    )
}

#[test]
fn test_rfc5802_sha1() {
    let (client_first, client_final) = exchange(
        &SCRAM_SHA_1,
        "fyko+d2lbbFgONRv9qkxdawL",
        "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096",
        "v=rmF9pqV8S7suAoZWja4dJRkFsKQ=",
    );
    assert_eq!(client_first, "n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL");
    assert_eq!(
        client_final,
        "c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="
    );
}

#[test]
fn test_rfc7677_sha256() {
    let (client_first, client_final) = exchange(
        &SCRAM_SHA_256,
        "rOprNGfwEbeRWgbNEkqO",
        "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
        "v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=",
    );
    assert_eq!(client_first, "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
    assert_eq!(
        client_final,
        "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
         p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
    );
}

#[test]
fn test_sha256_with_rfc5802_nonce() {
    let (client_first, client_final) = exchange(
        &SCRAM_SHA_256,
        "fyko+d2lbbFgONRv9qkxdawL",
        "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
        "v=PUZ0/urxX86eGWh/paDV5XxNJSa1/ISFj3iCA2BxaT0=",
    );
    assert_eq!(client_first, "n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL");
    assert_eq!(
        client_final,
        "c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,\
         p=khPunbEN1bS6ZR10eQcjEAYZW+T9aSBx7y/UMYTjXdk="
    );
}

#[test]
fn test_wrong_password_fails_at_signature() {
    let mut client = ScramClient::with_nonce(
        &SCRAM_SHA_1,
        Credentials::new("user", "pen"),
        &ScramConfig::default(),
        "fyko+d2lbbFgONRv9qkxdawL",
    )
    .unwrap();
    client.evaluate_challenge(&[]).unwrap();
    let client_final = client
        .evaluate_challenge(
            b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096",
        )
        .unwrap()
        .unwrap();
    assert!(client_final.starts_with(b"c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p="));
    assert_eq!(
        client
            .evaluate_challenge(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=")
            .unwrap_err()
            .kind_name(),
        "ServerSignatureInvalid"
    );
}
