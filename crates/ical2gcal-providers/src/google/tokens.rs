//! Persistence for the Google OAuth tokens.
//!
//! A sync run should not send the user through the browser flow every
//! time, so the granted tokens live in a JSON file under the user's data
//! directory and are refreshed in place when the access token lapses.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Treat tokens as expired this many seconds before Google does.
const EXPIRY_SLACK_SECS: i64 = 60;

/// The tokens granted by one authorization, plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token presented on API requests.
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    pub refresh_token: Option<String>,
    /// Instant after which the access token must be refreshed.
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes the user consented to.
    pub scopes: Vec<String>,
    /// When the access token was last (re)issued.
    pub last_refresh: DateTime<Utc>,
}

impl TokenSet {
    /// Builds a token set from the token endpoint's response fields.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// True once the access token is past (or within a minute of)
    /// expiry. Tokens without a reported lifetime never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Swaps in a refreshed access token.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expiry_from(expires_in_secs);
        self.last_refresh = Utc::now();
    }
}

/// Expiry instant for a token that lives `secs` seconds from now.
fn expiry_from(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(|secs| Utc::now() + Duration::seconds(secs - EXPIRY_SLACK_SECS))
}

/// File-backed token store with an in-memory copy.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-save cannot leave a torn token file behind.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    current: RwLock<Option<TokenSet>>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Reads tokens from disk, if any are stored.
    ///
    /// Returns `Ok(false)` when the token file does not exist yet.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!("no stored tokens at {:?}", self.path);
            return Ok(false);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ProviderError::configuration(format!("cannot read token file: {}", e)))?;
        let tokens: TokenSet = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::configuration(format!("token file is not valid JSON: {}", e))
        })?;

        info!("loaded stored tokens from {:?}", self.path);
        *self.current.write().unwrap() = Some(tokens);
        Ok(true)
    }

    /// Replaces the stored tokens and writes them out.
    pub fn set(&self, tokens: TokenSet) -> ProviderResult<()> {
        *self.current.write().unwrap() = Some(tokens);
        self.save()
    }

    /// Applies a refreshed access token and writes the result out.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<()> {
        {
            let mut current = self.current.write().unwrap();
            let Some(tokens) = current.as_mut() else {
                return Err(ProviderError::internal("refresh with no stored tokens"));
            };
            tokens.update_access_token(access_token, expires_in_secs);
        }
        self.save()
    }

    /// A copy of the tokens currently held in memory.
    pub fn get(&self) -> Option<TokenSet> {
        self.current.read().unwrap().clone()
    }

    /// True while the held access token is still usable as-is.
    pub fn has_valid_tokens(&self) -> bool {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.is_expired())
    }

    /// True when a refresh token is on hand for minting new access
    /// tokens.
    pub fn has_refresh_token(&self) -> bool {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|t| t.refresh_token.is_some())
    }

    /// Writes the in-memory tokens to disk, atomically.
    pub fn save(&self) -> ProviderResult<()> {
        let current = self.current.read().unwrap();
        let tokens = current
            .as_ref()
            .ok_or_else(|| ProviderError::internal("nothing to save"))?;
        let body = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("token serialization failed: {}", e)))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                ProviderError::configuration(format!("cannot create {:?}: {}", dir, e))
            })?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body)
            .map_err(|e| ProviderError::configuration(format!("cannot write token file: {}", e)))?;
        fs::rename(&staging, &self.path).map_err(|e| {
            ProviderError::configuration(format!("cannot move token file into place: {}", e))
        })?;

        // Owner-only; this file holds a refresh token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        debug!("tokens written to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("google-tokens.json"))
    }

    #[test]
    fn fresh_tokens_are_not_expired() {
        let tokens = TokenSet::new("at", Some("rt".into()), Some(3600), vec!["cal".into()]);
        assert!(!tokens.is_expired());
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
    }

    #[test]
    fn lifetimes_inside_the_slack_count_as_expired() {
        let tokens = TokenSet::new("at", None, Some(30), vec![]);
        assert!(tokens.is_expired());
    }

    #[test]
    fn tokens_without_lifetime_never_expire() {
        let tokens = TokenSet::new("at", None, None, vec![]);
        assert!(!tokens.is_expired());
    }

    #[test]
    fn refresh_replaces_token_and_expiry() {
        let mut tokens = TokenSet::new("old", None, Some(30), vec![]);
        assert!(tokens.is_expired());

        tokens.update_access_token("new", Some(3600));
        assert_eq!(tokens.access_token, "new");
        assert!(!tokens.is_expired());
    }

    #[test]
    fn tokens_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .set(TokenSet::new(
                "at",
                Some("rt".into()),
                Some(3600),
                vec!["cal".into()],
            ))
            .unwrap();

        let reopened = store_in(&dir);
        assert!(reopened.load().unwrap());
        assert_eq!(reopened.get().unwrap().access_token, "at");
        assert!(reopened.has_refresh_token());
        assert!(reopened.has_valid_tokens());
    }

    #[test]
    fn load_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.load().unwrap());
        assert!(store.get().is_none());
        assert!(!store.has_valid_tokens());
        assert!(!store.has_refresh_token());
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("google-tokens.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(TokenStore::new(path).load().is_err());
    }

    #[test]
    fn refresh_through_the_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .set(TokenSet::new("old", Some("rt".into()), Some(30), vec![]))
            .unwrap();
        assert!(!store.has_valid_tokens());

        store.update_access_token("new", Some(3600)).unwrap();
        assert!(store.has_valid_tokens());

        let reopened = store_in(&dir);
        reopened.load().unwrap();
        assert_eq!(reopened.get().unwrap().access_token, "new");
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir)
            .set(TokenSet::new("at", None, None, vec![]))
            .unwrap();

        let mode = std::fs::metadata(dir.path().join("google-tokens.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
