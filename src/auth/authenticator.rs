//! Realm-scoped digest authenticator.

use std::collections::HashMap;

use sha1::{Digest, Sha1};

use crate::auth::Credential;
use crate::config::loader::ConfigError;
use crate::config::AuthConfig;

/// Compute the directory digest for a user: lowercase hex SHA-1 of
/// `realm ‖ name ‖ secret`.
pub fn password_digest(realm: &str, name: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(realm.as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validates credentials against a fixed user directory.
#[derive(Debug, Clone)]
pub struct Authenticator {
    realm: String,
    users: HashMap<String, String>,
}

impl Authenticator {
    /// Build an authenticator from configuration.
    ///
    /// Fails when the realm is empty, the directory is empty or a digest is
    /// not a 40 character hex string.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        if config.realm.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.realm is required when authentication is enabled".to_string(),
            ));
        }
        if config.users.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.users must list at least one user".to_string(),
            ));
        }

        let mut users = HashMap::with_capacity(config.users.len());
        for (name, digest) in &config.users {
            if digest.len() != 40 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "auth.users.{name} is not a sha1 hex digest"
                )));
            }
            users.insert(name.clone(), digest.to_ascii_lowercase());
        }

        tracing::debug!(
            realm = %config.realm,
            users = users.len(),
            "Using basic authentication"
        );

        Ok(Self {
            realm: config.realm.clone(),
            users,
        })
    }

    /// True when the credential matches the stored digest for its user.
    pub fn is_authorized(&self, credential: Option<&Credential>) -> bool {
        let Some(credential) = credential else {
            return false;
        };
        if credential.name.is_empty() || credential.secret.is_empty() {
            return false;
        }
        let Some(required) = self.users.get(&credential.name) else {
            return false;
        };

        let actual = password_digest(&self.realm, &credential.name, &credential.secret);
        constant_time_eq(actual.as_bytes(), required.as_bytes())
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Value for the `WWW-Authenticate` header, realm as an RFC 7230
    /// quoted-string.
    pub fn challenge(&self) -> String {
        let mut quoted = String::with_capacity(self.realm.len() + 2);
        for c in self.realm.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        format!("Basic realm=\"{}\"", quoted)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
