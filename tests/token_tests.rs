use chrono::{Duration, Utc};
use jewel_portal::{
    models::Role,
    token::{Identity, TOKEN_TTL_DAYS, TokenCodec, TokenError},
};
use uuid::Uuid;

const SECRET: &str = "token-test-secret-0123456789";

fn identity(role: Role, is_verified: bool) -> Identity {
    Identity {
        account_id: Uuid::new_v4(),
        role,
        is_verified,
        is_blocked: false,
    }
}

#[test]
fn test_issue_then_verify_returns_same_identity() {
    let codec = TokenCodec::new(SECRET);
    let subject = identity(Role::Salesman, true);

    let issued = codec.issue(&subject).expect("issue");
    let verified = codec.verify(&issued.token).expect("verify");

    assert_eq!(verified, subject);
}

#[test]
fn test_tokens_live_for_seven_days() {
    let codec = TokenCodec::new(SECRET);
    let now = Utc::now();

    let issued = codec.issue_at(&identity(Role::Admin, true), now).expect("issue");

    assert_eq!(codec.ttl(), Duration::days(TOKEN_TTL_DAYS));
    assert_eq!(issued.expires_at, now + Duration::days(7));
}

#[test]
fn test_expired_token_is_rejected() {
    let codec = TokenCodec::new(SECRET);
    let eight_days_ago = Utc::now() - Duration::days(8);

    let issued = codec
        .issue_at(&identity(Role::Admin, true), eight_days_ago)
        .expect("issue");

    assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let forger = TokenCodec::new("somebody-elses-secret");
    let codec = TokenCodec::new(SECRET);

    let forged = forger.issue(&identity(Role::Admin, true)).expect("issue");

    assert_eq!(codec.verify(&forged.token), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let codec = TokenCodec::new(SECRET);
    let issued = codec.issue(&identity(Role::Shop, false)).expect("issue");

    // Swap the payload for the payload of an admin token from another codec.
    let other = TokenCodec::new("x")
        .issue(&identity(Role::Admin, true))
        .expect("issue");
    let mut parts: Vec<&str> = issued.token.split('.').collect();
    let forged_payload = other.token.split('.').nth(1).expect("payload");
    parts[1] = forged_payload;
    let tampered = parts.join(".");

    assert_eq!(codec.verify(&tampered), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_garbage_is_malformed() {
    let codec = TokenCodec::new(SECRET);

    assert_eq!(codec.verify("not-a-token"), Err(TokenError::MalformedToken));
    assert_eq!(codec.verify(""), Err(TokenError::MalformedToken));
}

#[test]
fn test_verification_flags_survive_the_round_trip() {
    let codec = TokenCodec::new(SECRET);
    let mut subject = identity(Role::Salesman, false);
    subject.is_blocked = true;

    let verified = codec
        .verify(&codec.issue(&subject).expect("issue").token)
        .expect("verify");

    assert!(!verified.is_verified);
    assert!(verified.is_blocked);
    assert_eq!(verified.role, Role::Salesman);
}
