//! RSA encryption of login credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use starcloud::AuthError;

use crate::wire::LoginPayload;

/// Base64 body of the service's published SubjectPublicKeyInfo. The PEM the
/// service hands out wraps at irregular widths, so the lines are kept as-is
/// and joined before decoding.
const STARCLOUD_PUBLIC_KEY: &[&str] = &[
    "MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAvrzz4DGWHc6YmK0BZ30LMqZv",
    "WTLOsuIzPJn9LrJ++5416UwqpnnR5DxI4NOAdwwAOv7aOdiZ6ny5u8BX5potv+cB3evrc",
    "pw5HbxSbj1kUzfOv4VCnGSdPMRnx/i3DCaQN1ubliJrm/jfGBEVioTNkT+iNxcZZYxazg",
    "P1PHJOpmUwu7LME+zdGSB+y0MIZasmKi6aVFBIHug83ku0lNpA+hdWTJu+Unsl6cD58wf",
    "7fSF3zLbb9Cmy/kg+qcS0QzzBajSXh1UuRm+4KuQZfDRDuIagICtXvrY/u2Ow3Kdw4YGq",
    "EMe+TLiuxFoCQO9smGCOi9sCFAVrC3DaGPhGYT422QIDAQAB",
];

/// Encrypts the login payload into the opaque `key` the service expects.
#[derive(Debug, Clone)]
pub struct CredentialCipher {
    key: RsaPublicKey,
}

impl CredentialCipher {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Cipher for the production StarCloud key.
    pub fn starcloud() -> Result<Self, AuthError> {
        let der = STANDARD
            .decode(STARCLOUD_PUBLIC_KEY.concat())
            .map_err(|e| AuthError::Encryption(format!("public key is not base64: {e}")))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| AuthError::Encryption(format!("public key is not valid SPKI: {e}")))?;
        Ok(Self::new(key))
    }

    /// Compact JSON `{"account","password","rememberMe":false}`, encrypted
    /// with PKCS#1 v1.5 and base64-encoded.
    pub fn encrypt(&self, account: &str, password: &str) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(&LoginPayload {
            account,
            password,
            remember_me: false,
        })
        .map_err(|e| AuthError::Encryption(e.to_string()))?;

        let mut rng = rand::thread_rng();
        let encrypted = self
            .key
            .encrypt(&mut rng, Pkcs1v15Encrypt, &payload)
            .map_err(|e| AuthError::Encryption(e.to_string()))?;

        Ok(STANDARD.encode(encrypted))
    }
}

#[cfg(test)]
mod tests {
    use rsa::RsaPrivateKey;

    use super::*;

    #[test]
    fn production_key_parses_as_2048_bit() {
        use rsa::traits::PublicKeyParts;

        let cipher = CredentialCipher::starcloud().unwrap();
        assert_eq!(cipher.key.size(), 256);
    }

    #[test]
    fn ciphertext_is_one_block_and_randomized() {
        let cipher = CredentialCipher::starcloud().unwrap();
        let first = cipher.encrypt("someone@example.org", "hunter2").unwrap();
        let second = cipher.encrypt("someone@example.org", "hunter2").unwrap();

        assert_eq!(STANDARD.decode(&first).unwrap().len(), 256);
        assert_ne!(first, second);
    }

    #[test]
    fn decrypts_to_compact_payload() {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let cipher = CredentialCipher::new(RsaPublicKey::from(&private));

        let key = cipher.encrypt("a@b.c", "pw").unwrap();
        let plain = private
            .decrypt(Pkcs1v15Encrypt, &STANDARD.decode(key).unwrap())
            .unwrap();

        assert_eq!(
            String::from_utf8(plain).unwrap(),
            r#"{"account":"a@b.c","password":"pw","rememberMe":false}"#
        );
    }

    #[test]
    fn oversized_credentials_fail_to_encrypt() {
        let cipher = CredentialCipher::starcloud().unwrap();
        let password = "x".repeat(300);
        let err = cipher.encrypt("a@b.c", &password).unwrap_err();
        assert!(matches!(err, AuthError::Encryption(_)));
    }
}
