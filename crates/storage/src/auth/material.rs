//! Validated RSA key material.
//!
//! Registration accepts PEM text from callers and turns it into these types
//! before touching any registry state. Once constructed, public material is
//! known to be a well-formed RSA key of at least [`MIN_RSA_BITS`] bits and
//! private material is known to match its public half.
//!
//! Private material is held as PKCS#1 DER inside [`Zeroizing`], so the bytes
//! are wiped when the last reference drops. It implements neither
//! `Serialize` nor a revealing `Debug`.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    traits::PublicKeyParts,
};
use zeroize::Zeroizing;

use crate::error::{RegistryError, RegistryResult};

/// Smallest RSA modulus accepted for signing or verification.
pub const MIN_RSA_BITS: usize = 2048;

/// Public half of a signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    key: RsaPublicKey,
    n: String,
    e: String,
}

impl PublicKeyMaterial {
    /// Parses a public key from SPKI (`BEGIN PUBLIC KEY`) or PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) PEM.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KeyMaterialInvalid`] if the text is not an RSA
    /// public key or the modulus is shorter than [`MIN_RSA_BITS`].
    pub fn from_pem(pem: &str) -> RegistryResult<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|_| RegistryError::key_material_invalid("public key is not a valid RSA PEM"))?;
        Self::from_key(key)
    }

    /// Wraps an already parsed public key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KeyMaterialInvalid`] if the modulus is too short.
    pub fn from_key(key: RsaPublicKey) -> RegistryResult<Self> {
        let bits = key.size() * 8;
        if bits < MIN_RSA_BITS {
            return Err(RegistryError::key_material_invalid(format!(
                "RSA modulus is {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }
        let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
        Ok(Self { key, n, e })
    }

    /// Modulus, big-endian, base64url without padding.
    #[must_use]
    pub fn modulus(&self) -> &str {
        &self.n
    }

    /// Public exponent, big-endian, base64url without padding.
    #[must_use]
    pub fn exponent(&self) -> &str {
        &self.e
    }

    /// Modulus length in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    pub(crate) fn key(&self) -> &RsaPublicKey {
        &self.key
    }
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyMaterial").field("bits", &self.bits()).finish_non_exhaustive()
    }
}

/// Private half of a signing key.
pub struct PrivateKeyMaterial {
    der: Zeroizing<Vec<u8>>,
}

impl PrivateKeyMaterial {
    /// Parses a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`)
    /// private key and checks that it belongs to `public`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KeyMaterialInvalid`] if the text is not an RSA
    /// private key or does not match `public`.
    pub fn from_pem(pem: &str, public: &PublicKeyMaterial) -> RegistryResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|_| {
                RegistryError::key_material_invalid("private key is not a valid RSA PEM")
            })?;
        if &key.to_public_key() != public.key() {
            return Err(RegistryError::key_material_invalid(
                "private key does not match the public key",
            ));
        }
        let der = key
            .to_pkcs1_der()
            .map_err(|_| RegistryError::internal("failed to encode private key"))?;
        Ok(Self { der: Zeroizing::new(der.as_bytes().to_vec()) })
    }

    /// PKCS#1 DER encoding of the private key.
    #[must_use]
    pub fn pkcs1_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyMaterial([REDACTED])")
    }
}
