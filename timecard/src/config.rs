//! Settings read from the persisted store.

use crate::errors::TimecardError;
use crate::storage::{keys, KeyValueStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Connection settings for the Azure DevOps tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerSettings {
    pub org_url: String,
    pub project: String,
    pub api_version: String,
    /// Stored form: base64 of `":" + secret`.
    pub encoded_token: Option<String>,
}

impl TrackerSettings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            org_url: store.get(keys::ORG_URL).unwrap_or_default(),
            project: store.get(keys::PROJECT).unwrap_or_default(),
            api_version: store.get(keys::API_VERSION).unwrap_or_default(),
            encoded_token: store.get_non_empty(keys::TOKEN),
        }
    }

    /// Persist org/project/version, and the token when a new one is given.
    /// Blank required fields are rejected without writing anything.
    pub fn save(
        store: &dyn KeyValueStore,
        org_url: &str,
        project: &str,
        api_version: &str,
        new_token: Option<&str>,
    ) -> Result<Self, TimecardError> {
        let (org_url, project, api_version) = (org_url.trim(), project.trim(), api_version.trim());
        if org_url.is_empty() || project.is_empty() || api_version.is_empty() {
            return Err(TimecardError::InvalidArgument(
                "org URL, project and API version are required".into(),
            ));
        }
        store.set(keys::ORG_URL, org_url)?;
        store.set(keys::PROJECT, project)?;
        store.set(keys::API_VERSION, api_version)?;
        if let Some(token) = new_token.map(str::trim).filter(|t| !t.is_empty()) {
            store.set(keys::TOKEN, &encode_token(token))?;
        }
        Ok(Self::load(store))
    }

    pub fn has_token(&self) -> bool {
        self.encoded_token.is_some()
    }

    /// Names of missing settings, in display order. `username` is checked
    /// here too because searching needs it.
    pub fn missing(&self, username: Option<&str>) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_token() {
            missing.push("Token");
        }
        if username.map(str::trim).unwrap_or_default().is_empty() {
            missing.push("Username");
        }
        if self.org_url.is_empty() {
            missing.push("Org URL");
        }
        if self.project.is_empty() {
            missing.push("Project");
        }
        if self.api_version.is_empty() {
            missing.push("API Version");
        }
        missing
    }

    /// True when a required connection setting (not the username) is absent.
    pub fn connection_incomplete(&self) -> bool {
        !self.has_token()
            || self.org_url.is_empty()
            || self.project.is_empty()
            || self.api_version.is_empty()
    }
}

/// Encode a personal access token the way it is stored.
pub fn encode_token(secret: &str) -> String {
    BASE64.encode(format!(":{secret}"))
}

/// Recover the bare secret from its stored form: decode and drop the leading
/// separator character.
pub fn decode_token(encoded: &str) -> Result<String, base64::DecodeError> {
    let bytes = BASE64.decode(encoded.trim())?;
    let decoded = String::from_utf8_lossy(&bytes);
    let mut chars = decoded.chars();
    chars.next();
    Ok(chars.as_str().to_string())
}

/// Optional features, toggled from the extension popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Toolbar button, Ctrl+D and the DevOps button of the comment bar.
    pub azure_devops: bool,
}

impl FeatureFlags {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            azure_devops: store
                .get(keys::FEATURE_AZURE_DEVOPS)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), TimecardError> {
        store.set(
            keys::FEATURE_AZURE_DEVOPS,
            if self.azure_devops { "true" } else { "false" },
        )
    }
}
