//! PBKDF2-HMAC-SHA256 credential hashing
//!
//! Digests are stored as `"<salt hex>:<hash hex>"`.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::CredentialVerifier;
use crate::error::Result;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Pbkdf2Verifier {
    iterations: u32,
}

impl Pbkdf2Verifier {
    pub fn new() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Lower iteration counts are only meant for tests
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    fn derive(&self, password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut out);
        out
    }
}

impl Default for Pbkdf2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for Pbkdf2Verifier {
    fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let hashed = self.derive(password, &salt);
        Ok(format!("{}:{}", hex::encode(salt), hex::encode(hashed)))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        let Some((salt_hex, hash_hex)) = digest.split_once(':') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
            return false;
        };
        if salt.is_empty() || expected.len() != HASH_LEN {
            return false;
        }

        let candidate = self.derive(password, &salt);
        candidate[..].ct_eq(&expected[..]).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> Pbkdf2Verifier {
        Pbkdf2Verifier::with_iterations(1_000)
    }

    #[test]
    fn test_hash_then_verify() {
        let v = verifier();
        let digest = v.hash("hunter22").unwrap();
        assert!(v.verify("hunter22", &digest));
        assert!(!v.verify("hunter23", &digest));
    }

    #[test]
    fn test_digest_format() {
        let digest = verifier().hash("secret").unwrap();
        let (salt, hash) = digest.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(hash.len(), HASH_LEN * 2);
    }

    #[test]
    fn test_salt_is_random() {
        let v = verifier();
        assert_ne!(v.hash("same").unwrap(), v.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_digests_never_verify() {
        let v = verifier();
        assert!(!v.verify("pw", ""));
        assert!(!v.verify("pw", "no-colon"));
        assert!(!v.verify("pw", "zz:zz"));
        assert!(!v.verify("pw", "00ff:abcd"));
    }

    #[test]
    fn test_iteration_count_is_part_of_the_derivation() {
        let digest = verifier().hash("pw").unwrap();
        assert!(!Pbkdf2Verifier::with_iterations(2_000).verify("pw", &digest));
    }

    #[test]
    fn test_default_uses_hardened_iteration_count() {
        assert_eq!(Pbkdf2Verifier::default().iterations, DEFAULT_ITERATIONS);
    }
}
