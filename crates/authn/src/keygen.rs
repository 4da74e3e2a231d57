//! Signing key generation.
//!
//! Generation is CPU-bound: a 2048-bit RSA key takes tens of milliseconds.
//! Async callers go through [`generate_blocking`], which runs the generator
//! on tokio's blocking pool.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use fail::fail_point;
use rand_core::OsRng;
use rsa::{
    RsaPrivateKey,
    pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding},
};
use zeroize::Zeroizing;

use crate::{config::DEFAULT_KEY_BITS, error::AuthError};

/// A freshly generated RSA key pair, PEM-encoded.
#[derive(Clone)]
pub struct KeyPair {
    /// SPKI PEM (`BEGIN PUBLIC KEY`).
    pub public_key_pem: String,
    /// PKCS#8 PEM (`BEGIN PRIVATE KEY`), wiped on drop.
    pub private_key_pem: Zeroizing<String>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_pem", &self.public_key_pem)
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}

/// Source of new signing key pairs.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    /// Produces a new key pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyGeneration`] if no key pair could be produced.
    fn generate(&self) -> Result<KeyPair, AuthError>;
}

/// Generates RSA keys from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyGenerator {
    bits: usize,
}

impl RsaKeyGenerator {
    /// Creates a generator for `bits`-bit moduli.
    ///
    /// Callers are expected to have validated `bits` through
    /// [`AuthnConfig`](crate::AuthnConfig).
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bits
    }
}

impl Default for RsaKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_BITS)
    }
}

impl KeyGenerator for RsaKeyGenerator {
    #[tracing::instrument(skip(self), fields(bits = self.bits))]
    fn generate(&self) -> Result<KeyPair, AuthError> {
        fail_point!("keygen-generate", |_| {
            Err(AuthError::key_generation("injected failure during key generation"))
        });

        let private = RsaPrivateKey::new(&mut OsRng, self.bits)
            .map_err(|e| AuthError::key_generation(e.to_string()))?;
        let public_key_pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::key_generation(format!("public key encoding: {e}")))?;
        let private_key_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::key_generation(format!("private key encoding: {e}")))?;
        Ok(KeyPair { public_key_pem, private_key_pem })
    }
}

/// Hands out a fixed set of pre-provisioned key pairs in turn.
///
/// Useful where keys are minted ahead of time, such as warm pools and
/// tests. The set is cycled, so a pair is reused after every other pair has
/// been handed out once; each registration still gets its own kid.
#[derive(Debug)]
pub struct PresetKeyGenerator {
    pairs: Vec<KeyPair>,
    next: AtomicUsize,
}

impl PresetKeyGenerator {
    /// Creates a generator over `pairs`.
    #[must_use]
    pub fn new(pairs: Vec<KeyPair>) -> Self {
        Self { pairs, next: AtomicUsize::new(0) }
    }
}

impl KeyGenerator for PresetKeyGenerator {
    fn generate(&self) -> Result<KeyPair, AuthError> {
        fail_point!("keygen-generate", |_| {
            Err(AuthError::key_generation("injected failure during key generation"))
        });

        if self.pairs.is_empty() {
            return Err(AuthError::key_generation("no preset key pairs configured"));
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.pairs.len();
        Ok(self.pairs[i].clone())
    }
}

/// Runs `generator` on the blocking thread pool.
///
/// # Errors
///
/// Returns the generator's error, or [`AuthError::KeyGeneration`] if the
/// blocking task panicked or was cancelled.
pub async fn generate_blocking(generator: Arc<dyn KeyGenerator>) -> Result<KeyPair, AuthError> {
    tokio::task::spawn_blocking(move || generator.generate())
        .await
        .map_err(|e| AuthError::key_generation(format!("generation task failed: {e}")))?
}
