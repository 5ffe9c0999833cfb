// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Agreement Tests
//!
//! Both sides of a session must land on the same 32-byte secret no matter
//! which key encoding the broker hands back.

use fabstir_broker_chat::crypto::{
    decode_public_key_hex, derive_shared_secret, generate_ephemeral_key_pair, parse_public_key,
    CryptoError, EphemeralKeyPair,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use proptest::prelude::*;

#[test]
fn test_both_parties_derive_same_secret() {
    let requester = generate_ephemeral_key_pair();
    let responder = generate_ephemeral_key_pair();

    let a = requester
        .derive_shared_secret(&responder.public_key_bytes())
        .unwrap();
    let b = responder
        .derive_shared_secret(&requester.public_key_bytes())
        .unwrap();

    assert_eq!(a, b, "ECDH must be symmetric");
    assert_eq!(a.as_bytes().len(), 32);
}

#[test]
fn test_free_function_matches_key_pair_method() {
    let local = EphemeralKeyPair::generate();
    let peer = EphemeralKeyPair::generate();

    let via_method = local.derive_shared_secret(&peer.public_key_bytes()).unwrap();
    let via_fn = derive_shared_secret(&local.private_key_bytes(), &peer.public_key_bytes()).unwrap();

    assert_eq!(via_method, via_fn);
}

#[test]
fn test_uncompressed_peer_key_gives_same_secret() {
    let local = EphemeralKeyPair::generate();
    let peer = EphemeralKeyPair::generate();

    let compressed = peer.public_key_bytes();
    let uncompressed = parse_public_key(&compressed)
        .unwrap()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    assert_eq!(uncompressed.len(), 65);

    assert_eq!(
        local.derive_shared_secret(&compressed).unwrap(),
        local.derive_shared_secret(&uncompressed).unwrap()
    );
}

#[test]
fn test_different_peers_give_different_secrets() {
    let local = EphemeralKeyPair::generate();
    let first = local
        .derive_shared_secret(&EphemeralKeyPair::generate().public_key_bytes())
        .unwrap();
    let second = local
        .derive_shared_secret(&EphemeralKeyPair::generate().public_key_bytes())
        .unwrap();

    assert_ne!(first, second);
}

#[test]
fn test_rejects_malformed_keys_before_any_work() {
    let local = EphemeralKeyPair::generate();

    // Wrong length
    let err = local.derive_shared_secret(&[0x02; 20]).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey { .. }));

    // Right length, not on the curve
    let mut bogus = [0xffu8; 33];
    bogus[0] = 0x02;
    let err = local.derive_shared_secret(&bogus).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey { .. }));

    // Bad private scalar
    let peer = EphemeralKeyPair::generate();
    let err = derive_shared_secret(&[0u8; 32], &peer.public_key_bytes()).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey { .. }));
    let err = derive_shared_secret(&[1u8; 16], &peer.public_key_bytes()).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey { .. }));
}

#[test]
fn test_hex_public_key_round_trip() {
    let pair = EphemeralKeyPair::generate();
    let hex_key = pair.public_key_hex();
    assert_eq!(hex_key.len(), 66);

    assert_eq!(decode_public_key_hex(&hex_key).unwrap(), pair.public_key_bytes());
    assert_eq!(
        decode_public_key_hex(&format!("0x{}", hex_key)).unwrap(),
        pair.public_key_bytes()
    );
    assert!(decode_public_key_hex("not-hex").is_err());
}

proptest! {
    #[test]
    fn prop_agreement_is_symmetric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
        // Most 32-byte strings are valid scalars; skip the rest
        let left = EphemeralKeyPair::from_private_key(&a);
        let right = EphemeralKeyPair::from_private_key(&b);
        prop_assume!(left.is_ok() && right.is_ok());
        let (left, right) = (left.unwrap(), right.unwrap());

        let ab = left.derive_shared_secret(&right.public_key_bytes()).unwrap();
        let ba = right.derive_shared_secret(&left.public_key_bytes()).unwrap();
        prop_assert_eq!(ab, ba);
    }
}
