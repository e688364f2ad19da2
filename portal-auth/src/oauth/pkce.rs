//! PKCE (Proof Key for Code Exchange) support for OAuth 2.0.
//!
//! Implements the S256 method of RFC 7636.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Number of OS-random bytes behind a verifier (512 bits, 86 base64url chars).
const VERIFIER_ENTROPY_BYTES: usize = 64;

const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

/// PKCE code verifier (random string). Never logged.
#[derive(Clone)]
pub struct PkceVerifier(SecretString);

impl PkceVerifier {
    /// Generate a new random PKCE verifier from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; VERIFIER_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut random_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(random_bytes);
        Self(SecretString::new(verifier))
    }

    /// Create a PKCE verifier from an existing string.
    pub fn from_string(verifier: String) -> Self {
        Self(SecretString::new(verifier))
    }

    /// Get the verifier string.
    pub fn as_str(&self) -> &str {
        self.0.expose_secret()
    }

    /// Generate the corresponding code challenge.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }

    /// Check a string against the RFC 7636 verifier grammar:
    /// 43-128 characters from `[A-Za-z0-9-._~]`.
    pub fn is_valid_grammar(candidate: &str) -> bool {
        (VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&candidate.len())
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PkceVerifier([REDACTED])")
    }
}

/// PKCE code challenge (SHA256 hash of verifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Create a code challenge from a verifier.
    ///
    /// Uses SHA256 hashing and base64url encoding as per RFC 7636.
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_str().as_bytes());
        let hash = hasher.finalize();
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    /// Get the challenge string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `code_challenge_method` value for this challenge.
    pub fn method(&self) -> &'static str {
        "S256"
    }
}

/// Verifier together with its derived challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: PkceVerifier,
    pub challenge: PkceChallenge,
}

impl PkcePair {
    pub fn generate() -> Self {
        let verifier = PkceVerifier::generate();
        let challenge = verifier.challenge();
        Self {
            verifier,
            challenge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 86);
        assert!(PkceVerifier::is_valid_grammar(verifier.as_str()));
    }

    #[test]
    fn test_generated_verifiers_never_contain_standard_base64_chars() {
        for _ in 0..64 {
            let verifier = PkceVerifier::generate();
            assert!(!verifier.as_str().contains(|c: char| matches!(c, '+' | '/' | '=')));
            assert!(PkceVerifier::is_valid_grammar(verifier.as_str()));
        }
    }

    #[test]
    fn test_generated_verifiers_are_unique() {
        let a = PkceVerifier::generate();
        let b = PkceVerifier::generate();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_pkce_challenge_deterministic() {
        let verifier = PkceVerifier::from_string("test_verifier".to_string());
        let challenge1 = verifier.challenge();
        let challenge2 = verifier.challenge();
        assert_eq!(challenge1, challenge2);
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier =
            PkceVerifier::from_string("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(
            verifier.challenge().as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_different_verifiers_give_different_challenges() {
        let a = PkceVerifier::generate().challenge();
        let b = PkceVerifier::generate().challenge();
        assert_ne!(a, b);
    }

    #[test]
    fn test_grammar_rejects_short_long_and_illegal() {
        assert!(!PkceVerifier::is_valid_grammar(&"a".repeat(42)));
        assert!(PkceVerifier::is_valid_grammar(&"a".repeat(43)));
        assert!(PkceVerifier::is_valid_grammar(&"a".repeat(128)));
        assert!(!PkceVerifier::is_valid_grammar(&"a".repeat(129)));
        assert!(!PkceVerifier::is_valid_grammar(&format!("{}+", "a".repeat(50))));
    }

    #[test]
    fn test_pair_challenge_matches_verifier() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge, pair.verifier.challenge());
        assert_eq!(pair.challenge.method(), "S256");
    }

    #[test]
    fn test_verifier_debug_is_redacted() {
        let verifier = PkceVerifier::from_string("super-secret".to_string());
        assert!(!format!("{:?}", verifier).contains("super-secret"));
    }
}
