//! Public key discovery document (JWKS) types.

use serde::{Deserialize, Serialize};

use super::material::PublicKeyMaterial;

/// JOSE algorithm name used for every signing key.
pub const SIGNING_ALGORITHM: &str = "RS256";

/// JWK key type for RSA keys.
pub const RSA_KEY_TYPE: &str = "RSA";

/// Intended use of a published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    /// Signature verification.
    Sig,
}

/// One public key in a discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`.
    pub kty: String,
    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub use_field: KeyUse,
    /// Key ID referenced by token headers.
    pub kid: String,
    /// Modulus, base64url without padding.
    pub n: String,
    /// Public exponent, base64url without padding.
    pub e: String,
    /// Signing algorithm, always `RS256`.
    pub alg: String,
}

impl Jwk {
    /// Builds the public JWK for `material` under `kid`.
    #[must_use]
    pub fn from_material(kid: impl Into<String>, material: &PublicKeyMaterial) -> Self {
        Self {
            kty: RSA_KEY_TYPE.to_owned(),
            use_field: KeyUse::Sig,
            kid: kid.into(),
            n: material.modulus().to_owned(),
            e: material.exponent().to_owned(),
            alg: SIGNING_ALGORITHM.to_owned(),
        }
    }
}

/// Public-only view of a tenant's currently valid keys.
///
/// Keys appear in registration order, oldest first. Serializes as
/// `{"keys": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

impl DiscoveryDocument {
    /// Finds the key with the given `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Whether the document holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of published keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testutil::fixture_keypair;

    #[test]
    fn test_document_wire_format() {
        let material = PublicKeyMaterial::from_pem(&fixture_keypair().public_pem).unwrap();
        let doc = DiscoveryDocument { keys: vec![Jwk::from_material("key_1_1", &material)] };

        let value = serde_json::to_value(&doc).unwrap();
        let key = &value["keys"][0];
        assert_eq!(key["kty"], "RSA");
        assert_eq!(key["use"], "sig");
        assert_eq!(key["alg"], "RS256");
        assert_eq!(key["kid"], "key_1_1");
        assert_eq!(key["e"], "AQAB");
        assert_eq!(key["n"].as_str().unwrap(), material.modulus());
        assert_eq!(key.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_find() {
        let material = PublicKeyMaterial::from_pem(&fixture_keypair().public_pem).unwrap();
        let doc = DiscoveryDocument {
            keys: vec![
                Jwk::from_material("key_1_1", &material),
                Jwk::from_material("key_1_2", &material),
            ],
        };
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.find("key_1_2").map(|k| k.kid.as_str()), Some("key_1_2"));
        assert!(doc.find("key_2_1").is_none());
        assert!(DiscoveryDocument::default().is_empty());
    }
}
