//! Access key credentials.
//!
//! The secret never appears in `Debug` output.

use crate::error::{Error, ErrorKind, Result};

/// Access key id and secret used to sign requests.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Create credentials. Both parts must be non-empty.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        if access_key_id.trim().is_empty() || secret_access_key.trim().is_empty() {
            return Err(Error::new(ErrorKind::Credentials(
                "access key id and secret access key are required".to_string(),
            )));
        }
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            Error::new(ErrorKind::Credentials("AWS_ACCESS_KEY_ID is not set".to_string()))
        })?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            Error::new(ErrorKind::Credentials("AWS_SECRET_ACCESS_KEY is not set".to_string()))
        })?;
        Self::new(access_key_id, secret_access_key)
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}
