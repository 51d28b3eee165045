//! Request authentication
//!
//! CloudAPI authenticates every request with an HTTP signature over the
//! `Date` header. Signatures come from a [`RequestSigner`]:
//! [`PrivateKeySigner`] for key material from a file or the environment, or
//! a caller-supplied implementation backed by the SSH agent.

use crate::error::{Result, TritonError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nodeflow_cloud::ApiError;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha256;
use std::path::{Path, PathBuf};

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
const ENCRYPTED_HEADER: &str = "Proc-Type: 4,ENCRYPTED";

/// Signs the request signing string
pub trait RequestSigner: Send + Sync {
    /// Signature algorithm (e.g. "rsa-sha256")
    fn algorithm(&self) -> &str;

    /// Base64 signature over `data`
    fn sign(&self, data: &[u8]) -> std::result::Result<String, ApiError>;
}

/// Where the signing key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Keys held by the running SSH agent
    Agent,
    /// PEM key read from a file
    File { path: PathBuf, pem: String },
    /// Key material passed directly
    Inline(String),
}

impl KeySource {
    /// Resolve `TRITON_KEY_MATERIAL`-style input
    ///
    /// Empty or absent material selects the agent. A value naming an existing
    /// file is read and must hold an unencrypted PEM key. Anything else is
    /// treated as the key itself.
    pub fn resolve(key_material: Option<&str>) -> Result<Self> {
        let material = match key_material.map(str::trim) {
            None | Some("") => return Ok(KeySource::Agent),
            Some(material) => material,
        };

        let path = Path::new(material);
        if path.is_file() {
            let pem = std::fs::read_to_string(path)?;
            validate_pem(material, &pem)?;
            tracing::debug!(path = %path.display(), "Loaded key material from file");
            return Ok(KeySource::File {
                path: path.to_path_buf(),
                pem,
            });
        }

        Ok(KeySource::Inline(material.to_string()))
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, KeySource::Agent)
    }
}

/// RSA-SHA256 signer over a PEM private key (PKCS#1 or PKCS#8)
pub struct PrivateKeySigner {
    key: SigningKey<Sha256>,
}

impl PrivateKeySigner {
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| TritonError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key: SigningKey::<Sha256>::new(key),
        })
    }

    /// Signer for file or inline material; the agent has no key to load
    pub fn from_key_source(source: &KeySource) -> Result<Self> {
        match source {
            KeySource::Agent => Err(TritonError::AgentSignerRequired),
            KeySource::File { pem, .. } | KeySource::Inline(pem) => Self::from_pem(pem),
        }
    }
}

impl RequestSigner for PrivateKeySigner {
    fn algorithm(&self) -> &str {
        "rsa-sha256"
    }

    fn sign(&self, data: &[u8]) -> std::result::Result<String, ApiError> {
        let signature = self
            .key
            .try_sign(data)
            .map_err(|e| ApiError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

fn validate_pem(label: &str, content: &str) -> Result<()> {
    let begin = content
        .find(PEM_BEGIN)
        .ok_or_else(|| TritonError::KeyMaterial(label.to_string()))?;
    if !content[begin..].contains(PEM_END) {
        return Err(TritonError::KeyMaterial(label.to_string()));
    }
    if content.contains(ENCRYPTED_HEADER) {
        return Err(TritonError::EncryptedKey(label.to_string()));
    }
    Ok(())
}

/// `Authorization` header value for a request dated `date`
pub fn authorization_header(
    key_path: &str,
    signer: &dyn RequestSigner,
    date: &str,
) -> std::result::Result<String, ApiError> {
    let signing_string = format!("date: {}", date);
    let signature = signer.sign(signing_string.as_bytes())?;
    Ok(format!(
        r#"Signature keyId="{}",algorithm="{}",headers="date",signature="{}""#,
        key_path,
        signer.algorithm(),
        signature
    ))
}
