//! Triton provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TritonError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to read key material {0}: no PEM key found")]
    KeyMaterial(String),

    #[error(
        "Failed to read key {0}: password protected keys are not supported, decrypt the key first"
    )]
    EncryptedKey(String),

    #[error("Failed to parse private key: {0}")]
    InvalidKey(String),

    #[error("No key material set; SSH agent signing needs a RequestSigner passed to TritonClient::new")]
    AgentSignerRequired,

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TritonError>;
