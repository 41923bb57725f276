use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::SystemTime;

use crate::threadrand::SecureRng;

pub const OTP_LENGTH: usize = 8;

pub struct Otp {}

impl Otp {
    pub fn generate(length: usize) -> String {
        let mut rng = SecureRng;
        (0..length)
            .map(|_| (b'0' + rng.gen_range(0..10)) as char)
            .collect()
    }

    pub fn hash(code: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        hasher.finalize().to_vec()
    }

    pub fn hashes_match(given: &[u8], saved: &[u8]) -> bool {
        if given.len() != saved.len() {
            return false;
        }

        let mut hashes_dont_match = 0u8;

        // Do bitwise comparison to prevent timing attacks
        for (i, saved_byte) in saved.iter().enumerate() {
            unsafe {
                hashes_dont_match |= saved_byte ^ given.get_unchecked(i);
            }
        }

        hashes_dont_match == 0
    }
}

/// The fields of a stored OTP row that the verification decision depends
/// on, snapshotted inside the row-locking transaction.
#[derive(Clone, Debug)]
pub struct OtpSnapshot {
    pub code_hash: Vec<u8>,
    pub expiration: SystemTime,
    pub attempts_used: i16,
    pub attempts_max: i16,
    pub consumed_at: Option<SystemTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpOutcome {
    /// The code matched an unexpired, unconsumed record. The record must
    /// be marked consumed; it can never verify again.
    Verified,
    /// The attempt budget was already spent before this attempt. No
    /// counter moves and the code is not even compared.
    RateLimited,
    /// Expired, already consumed, or simply wrong. Costs one attempt;
    /// `remaining` is surfaced to the caller.
    WrongOrExpired { remaining: i16 },
}

/// Decides what a verification attempt does to an OTP record. The guard
/// order is significant:
///
/// 1. An exhausted attempt counter rejects before anything else, without
///    consuming further attempts and without comparing the code.
/// 2. An expired or consumed record rejects and costs an attempt.
/// 3. Only then is the code digest compared (constant-time).
pub fn evaluate(snapshot: &OtpSnapshot, given_code: &str, now: SystemTime) -> OtpOutcome {
    if snapshot.attempts_used >= snapshot.attempts_max {
        return OtpOutcome::RateLimited;
    }

    let remaining = snapshot.attempts_max - snapshot.attempts_used - 1;

    if now >= snapshot.expiration || snapshot.consumed_at.is_some() {
        return OtpOutcome::WrongOrExpired { remaining };
    }

    if Otp::hashes_match(&Otp::hash(given_code), &snapshot.code_hash) {
        OtpOutcome::Verified
    } else {
        OtpOutcome::WrongOrExpired { remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn snapshot_for(code: &str, expires_in: Duration) -> OtpSnapshot {
        OtpSnapshot {
            code_hash: Otp::hash(code),
            expiration: SystemTime::now() + expires_in,
            attempts_used: 0,
            attempts_max: 3,
            consumed_at: None,
        }
    }

    #[test]
    fn test_generate_hash_match() {
        let otp = Otp::generate(OTP_LENGTH);

        assert_eq!(otp.len(), OTP_LENGTH);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));

        assert!(Otp::hashes_match(&Otp::hash(&otp), &Otp::hash(&otp)));
        assert!(!Otp::hashes_match(&Otp::hash(&otp), &Otp::hash("00000000")));
        assert!(!Otp::hashes_match(&Otp::hash(&otp), &[]));
    }

    #[test]
    fn test_correct_code_verifies_once() {
        let mut snapshot = snapshot_for("81936402", Duration::from_secs(300));
        let now = SystemTime::now();

        assert_eq!(evaluate(&snapshot, "81936402", now), OtpOutcome::Verified);

        // Consuming the record makes the same code worthless
        snapshot.consumed_at = Some(now);
        assert_eq!(
            evaluate(&snapshot, "81936402", now),
            OtpOutcome::WrongOrExpired { remaining: 2 },
        );
    }

    #[test]
    fn test_wrong_code_costs_an_attempt_and_reports_remaining() {
        let mut snapshot = snapshot_for("81936402", Duration::from_secs(300));
        let now = SystemTime::now();

        assert_eq!(
            evaluate(&snapshot, "12345678", now),
            OtpOutcome::WrongOrExpired { remaining: 2 },
        );

        snapshot.attempts_used = 1;
        assert_eq!(
            evaluate(&snapshot, "12345678", now),
            OtpOutcome::WrongOrExpired { remaining: 1 },
        );

        snapshot.attempts_used = 2;
        assert_eq!(
            evaluate(&snapshot, "12345678", now),
            OtpOutcome::WrongOrExpired { remaining: 0 },
        );
    }

    #[test]
    fn test_exhausted_attempts_reject_even_the_correct_code() {
        let mut snapshot = snapshot_for("81936402", Duration::from_secs(300));
        snapshot.attempts_used = 3;

        assert_eq!(
            evaluate(&snapshot, "81936402", SystemTime::now()),
            OtpOutcome::RateLimited,
        );
    }

    #[test]
    fn test_expired_code_rejects_regardless_of_correctness() {
        let snapshot = OtpSnapshot {
            code_hash: Otp::hash("81936402"),
            expiration: SystemTime::now() - Duration::from_secs(1),
            attempts_used: 0,
            attempts_max: 3,
            consumed_at: None,
        };

        assert_eq!(
            evaluate(&snapshot, "81936402", SystemTime::now()),
            OtpOutcome::WrongOrExpired { remaining: 2 },
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let expiration = SystemTime::now() + Duration::from_secs(300);
        let snapshot = OtpSnapshot {
            code_hash: Otp::hash("81936402"),
            expiration,
            attempts_used: 0,
            attempts_max: 3,
            consumed_at: None,
        };

        // Usable strictly before the expiration instant, not at it
        assert_eq!(
            evaluate(&snapshot, "81936402", expiration - Duration::from_secs(1)),
            OtpOutcome::Verified,
        );
        assert_eq!(
            evaluate(&snapshot, "81936402", expiration),
            OtpOutcome::WrongOrExpired { remaining: 2 },
        );
    }

    #[test]
    fn test_three_wrong_codes_then_rate_limited() {
        let mut snapshot = snapshot_for("81936402", Duration::from_secs(300));
        let now = SystemTime::now();

        for expected_remaining in (0..3).rev() {
            let outcome = evaluate(&snapshot, "99999999", now);
            assert_eq!(
                outcome,
                OtpOutcome::WrongOrExpired {
                    remaining: expected_remaining,
                },
            );
            snapshot.attempts_used += 1;
        }

        // Even the correct code is rejected once the budget is spent
        assert_eq!(evaluate(&snapshot, "81936402", now), OtpOutcome::RateLimited);
    }
}
