use std::path::Path;

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};

use crate::error::{SigningError, SigningResult};

/// Private key registered with the CDN under a key-pair id
#[derive(Debug, Clone)]
pub enum PrivateKey {
    /// RSA key, signs with PKCS#1 v1.5 over SHA-1
    Rsa(Box<RsaPrivateKey>),
    /// ECDSA P-256 key, signs deterministically over SHA-1 with DER output
    Ecdsa(p256::ecdsa::SigningKey),
}

impl PrivateKey {
    /// Loads a key from PEM bytes.
    ///
    /// Accepts RSA keys in PKCS#1 or PKCS#8 form and ECDSA P-256 keys in PKCS#8 form.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidKey` if the bytes are not a supported PEM private key.
    pub fn from_pem(bytes: &[u8]) -> SigningResult<Self> {
        let pem = std::str::from_utf8(bytes)
            .map_err(|e| SigningError::InvalidKey(format!("key file is not UTF-8: {e}")))?
            .trim();

        if pem.contains("BEGIN RSA PRIVATE KEY") {
            let key = RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
            return Ok(Self::Rsa(Box::new(key)));
        }

        if pem.contains("BEGIN PRIVATE KEY") {
            if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
                return Ok(Self::Ecdsa(key));
            }
            let key = RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
            return Ok(Self::Rsa(Box::new(key)));
        }

        Err(SigningError::InvalidKey(
            "expected an RSA (PKCS#1 or PKCS#8) or ECDSA P-256 (PKCS#8) PEM key".to_string(),
        ))
    }

    /// Reads and parses a PEM key file
    ///
    /// # Errors
    ///
    /// Returns `SigningError::KeyFile` if the file cannot be read and
    /// `SigningError::InvalidKey` if its contents cannot be parsed.
    pub async fn from_pem_file(path: impl AsRef<Path>) -> SigningResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SigningError::KeyFile {
                path: path.to_path_buf(),
                source,
            })?;

        let key = Self::from_pem(&bytes)?;
        tracing::debug!(path = %path.display(), kind = key.kind(), "loaded private key");
        Ok(key)
    }

    /// Short name of the key algorithm
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "rsa",
            Self::Ecdsa(_) => "ecdsa-p256",
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> SigningResult<Vec<u8>> {
        let digest = Sha1::digest(message);

        match self {
            Self::Rsa(key) => key
                .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
                .map_err(|e| SigningError::SigningFailure(e.to_string())),
            Self::Ecdsa(key) => {
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| SigningError::SigningFailure(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}
