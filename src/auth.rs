//! Tenant authentication
//!
//! Roman calls the webhook with `Authorization: <scheme> <token>`. The token
//! selects a tenant entry in the auth configuration document:
//!
//! ```json
//! {
//!   "token-abc": { "admins": ["user-1", "user-2"], "appKey": "roman-app-key" }
//! }
//! ```

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::debug;

/// Auth configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to read auth configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse auth configuration {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A tenant that passed authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantAuth {
    pub admins: HashSet<String>,
    pub app_key: String,
}

impl TenantAuth {
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }
}

/// Tenant entry as written in the configuration document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantEntry {
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default)]
    app_key: Option<String>,
}

impl TenantEntry {
    /// Entries without admins or without an app key are treated as absent
    fn into_tenant(self) -> Option<TenantAuth> {
        let app_key = self.app_key.filter(|key| !key.is_empty())?;
        if self.admins.is_empty() {
            return None;
        }
        Some(TenantAuth {
            admins: self.admins.into_iter().collect(),
            app_key,
        })
    }
}

/// Where tenant entries come from
#[derive(Debug, Clone)]
enum AuthSource {
    /// JSON file, re-read on every lookup so edits apply without a restart
    File(PathBuf),
    Static(HashMap<String, TenantAuth>),
}

/// Resolves bearer tokens to tenants
#[derive(Debug, Clone)]
pub struct AuthResolver {
    source: AuthSource,
}

impl AuthResolver {
    /// Resolver backed by the auth configuration file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: AuthSource::File(path.into()),
        }
    }

    /// Resolver over a fixed set of tenants
    pub fn from_tenants(tenants: HashMap<String, TenantAuth>) -> Self {
        Self {
            source: AuthSource::Static(tenants),
        }
    }

    /// Look up the tenant for `token`
    pub async fn resolve(&self, token: &str) -> Result<Option<TenantAuth>, AuthError> {
        match &self.source {
            AuthSource::Static(tenants) => Ok(tenants
                .get(token)
                .filter(|t| !t.admins.is_empty() && !t.app_key.is_empty())
                .cloned()),
            AuthSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| AuthError::Io {
                        path: path.clone(),
                        source,
                    })?;
                let mut entries: HashMap<String, TenantEntry> =
                    serde_json::from_str(&raw).map_err(|source| AuthError::Parse {
                        path: path.clone(),
                        source,
                    })?;

                let tenant = entries.remove(token).and_then(TenantEntry::into_tenant);
                debug!("Auth lookup found tenant: {}", tenant.is_some());
                Ok(tenant)
            }
        }
    }
}

/// Extract the token from an `Authorization` header value
///
/// Only the second whitespace-separated field is used; the scheme is not checked.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.split_whitespace().nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn auth_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Token   xyz extra"), Some("xyz"));
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[tokio::test]
    async fn test_resolve_from_file() {
        let file = auth_file(
            r#"{"token-1": {"admins": ["alice", "bob"], "appKey": "key-1"}}"#,
        );
        let resolver = AuthResolver::from_file(file.path());

        let tenant = resolver.resolve("token-1").await.unwrap().unwrap();
        assert_eq!(tenant.app_key, "key-1");
        assert!(tenant.is_admin("alice"));
        assert!(!tenant.is_admin("mallory"));

        assert_eq!(resolver.resolve("token-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incomplete_entries_are_absent() {
        let file = auth_file(
            r#"{
                "no-key": {"admins": ["alice"]},
                "empty-key": {"admins": ["alice"], "appKey": ""},
                "no-admins": {"appKey": "key"},
                "empty-admins": {"admins": [], "appKey": "key"}
            }"#,
        );
        let resolver = AuthResolver::from_file(file.path());

        for token in ["no-key", "empty-key", "no-admins", "empty-admins"] {
            assert_eq!(resolver.resolve(token).await.unwrap(), None, "token {token}");
        }
    }

    #[tokio::test]
    async fn test_file_is_read_on_each_lookup() {
        let file = auth_file("{}");
        let resolver = AuthResolver::from_file(file.path());
        assert_eq!(resolver.resolve("token-1").await.unwrap(), None);

        std::fs::write(
            file.path(),
            r#"{"token-1": {"admins": ["alice"], "appKey": "key-1"}}"#,
        )
        .unwrap();
        assert!(resolver.resolve("token-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_error() {
        let resolver = AuthResolver::from_file("/nonexistent/roman-broadcast/auth.json");
        assert!(matches!(
            resolver.resolve("token-1").await,
            Err(AuthError::Io { .. })
        ));

        let file = auth_file("not json");
        let resolver = AuthResolver::from_file(file.path());
        assert!(matches!(
            resolver.resolve("token-1").await,
            Err(AuthError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_tenants() {
        let resolver = AuthResolver::from_tenants(HashMap::from([(
            "token-1".to_string(),
            TenantAuth {
                admins: HashSet::from(["alice".to_string()]),
                app_key: "key-1".to_string(),
            },
        )]));
        assert!(resolver.resolve("token-1").await.unwrap().is_some());
        assert!(resolver.resolve("other").await.unwrap().is_none());
    }
}
