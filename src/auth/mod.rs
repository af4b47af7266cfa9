//! Registry credentials
//!
//! Credentials are resolved per registry host through a [`Keychain`]. The
//! default keychain reads Docker config files and credential helpers; callers
//! holding credentials already can use [`StaticKeychain`]. Whatever the
//! source, credentials reach the registry client as a [`RegistryAuth`].

use base64::Engine;
use oci_distribution::secrets::RegistryAuth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{IndexError, Result};

mod keychain;

pub use keychain::{DefaultKeychain, Keychain, MultiKeychain, StaticKeychain};

#[cfg(test)]
mod tests;

/// Credentials for one registry host, as stored in Docker config files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// base64 `user:password`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
}

impl AuthConfig {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username: Some(username),
            password: Some(password),
            ..Default::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        *self == Self::default()
    }

    /// Credentials for the distribution client
    ///
    /// Explicit username/password win over the encoded `auth` field.
    /// Token-only entries fall back to anonymous access.
    pub fn to_registry_auth(&self) -> RegistryAuth {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return RegistryAuth::Basic(username.clone(), password.clone());
        }

        match self.auth.as_deref().and_then(decode_basic) {
            Some((username, password)) => RegistryAuth::Basic(username, password),
            None => RegistryAuth::Anonymous,
        }
    }
}

/// Split a base64 `user:password` pair
fn decode_basic(auth: &str) -> Option<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(auth).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Source of credentials resolved by a keychain
pub trait Authenticator: Send + Sync {
    fn authorization(&self) -> Result<AuthConfig>;
}

/// No credentials
pub struct Anonymous;

impl Authenticator for Anonymous {
    fn authorization(&self) -> Result<AuthConfig> {
        Ok(AuthConfig::anonymous())
    }
}

/// Contents of a Docker `config.json` (or podman `auth.json`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuthEntry>,
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: HashMap<String, String>,
    #[serde(rename = "credsStore", skip_serializing_if = "Option::is_none")]
    pub creds_store: Option<String>,
}

impl DockerConfig {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| IndexError::Auth(format!("invalid docker config: {}", e)))
    }
}

/// One entry of the `auths` map; keys are lowercase on disk
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DockerAuthEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "identitytoken", skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,
    #[serde(rename = "registrytoken", skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
}

impl From<&DockerAuthEntry> for AuthConfig {
    fn from(entry: &DockerAuthEntry) -> Self {
        AuthConfig {
            username: entry.username.clone(),
            password: entry.password.clone(),
            auth: entry.auth.clone(),
            identity_token: entry.identity_token.clone(),
            registry_token: entry.registry_token.clone(),
        }
    }
}
