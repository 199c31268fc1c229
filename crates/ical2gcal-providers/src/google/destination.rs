//! Google Calendar destination implementation.
//!
//! Implements [`CalendarDestination`] on top of the API client, wrapping
//! every call with token loading and transparent refresh.

use ical2gcal_core::{CanonicalEvent, RemoteEvent};
use tokio::sync::RwLock as TokioRwLock;
use tracing::{debug, info};

use crate::destination::{BoxFuture, CalendarDestination};
use crate::error::{ProviderError, ProviderResult};

use super::client::GcalClient;
use super::config::GcalConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStore;

/// Google Calendar destination.
///
/// Writes the sync plan into the configured calendar through the
/// Calendar API v3, authenticating with the OAuth 2.0 PKCE flow.
pub struct GoogleDestination {
    config: GcalConfig,
    token_store: TokenStore,
    oauth_client: OAuthClient,
    /// Lazily built API client, shared across concurrent calls
    api_client: TokioRwLock<Option<GcalClient>>,
}

impl GoogleDestination {
    /// Builds a destination from the given configuration.
    ///
    /// Picks up previously stored tokens but never starts the browser
    /// flow on its own; that is what [`authenticate`](Self::authenticate)
    /// is for.
    pub fn new(config: GcalConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let token_store = TokenStore::new(&config.token_path);
        if let Err(e) = token_store.load() {
            debug!("stored tokens unreadable, starting unauthenticated: {}", e);
        }

        let oauth_client = OAuthClient::new(config.credentials.clone(), config.timeout);

        // Stand the API client up now when stored tokens are still live
        let api_client = token_store
            .get()
            .filter(|tokens| !tokens.is_expired())
            .map(|tokens| GcalClient::new(tokens.access_token, config.timeout));

        Ok(Self {
            config,
            token_store,
            oauth_client,
            api_client: TokioRwLock::new(api_client),
        })
    }

    /// Runs the interactive OAuth flow and persists the granted tokens.
    pub async fn authenticate(&self) -> ProviderResult<()> {
        info!("starting Google authentication flow");

        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;

        self.token_store.set(tokens.clone())?;
        *self.api_client.write().await =
            Some(GcalClient::new(tokens.access_token, self.config.timeout));

        info!("authentication successful");
        Ok(())
    }

    /// True when we hold usable credentials.
    ///
    /// A live access token or a refresh token both count; an expired
    /// access token is refreshed on the next API call.
    pub fn is_authenticated(&self) -> bool {
        self.token_store.has_valid_tokens() || self.token_store.has_refresh_token()
    }

    /// Makes sure a usable API client is in place before a call.
    async fn ensure_client(&self) -> ProviderResult<()> {
        {
            let client = self.api_client.read().await;
            if client.is_some() && self.token_store.has_valid_tokens() {
                return Ok(());
            }
        }

        self.refresh_client().await
    }

    /// Builds or re-keys the API client from stored tokens.
    async fn refresh_client(&self) -> ProviderResult<()> {
        let tokens = self.token_store.get().ok_or_else(|| {
            ProviderError::authentication("not authenticated - run 'ical2gcal auth'")
        })?;

        if !tokens.is_expired() {
            let mut slot = self.api_client.write().await;
            if slot.is_none() {
                *slot = Some(GcalClient::new(tokens.access_token, self.config.timeout));
            }
            return Ok(());
        }

        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            ProviderError::authentication("access token expired and no refresh token is stored")
        })?;

        debug!("access token expired, refreshing");
        let (access_token, expires_in) = self.oauth_client.refresh_token(refresh_token).await?;
        self.token_store
            .update_access_token(&access_token, expires_in)?;

        let mut slot = self.api_client.write().await;
        match slot.as_mut() {
            Some(client) => client.set_access_token(&access_token),
            None => *slot = Some(GcalClient::new(&access_token, self.config.timeout)),
        }
        Ok(())
    }

    async fn clear_impl(&self) -> ProviderResult<()> {
        self.ensure_client().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| ProviderError::internal("calendar client not initialized"))?;

        client.clear(&self.config.calendar_id).await
    }

    async fn list_impl(&self) -> ProviderResult<Vec<RemoteEvent>> {
        self.ensure_client().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| ProviderError::internal("calendar client not initialized"))?;

        client.list_events(&self.config.calendar_id).await
    }

    async fn insert_impl(&self, event: &CanonicalEvent) -> ProviderResult<()> {
        self.ensure_client().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| ProviderError::internal("calendar client not initialized"))?;

        client.insert_event(&self.config.calendar_id, event).await
    }

    async fn update_impl(&self, event: &CanonicalEvent) -> ProviderResult<()> {
        self.ensure_client().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| ProviderError::internal("calendar client not initialized"))?;

        client.update_event(&self.config.calendar_id, event).await
    }

    async fn delete_impl(&self, event_id: &str) -> ProviderResult<()> {
        self.ensure_client().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| ProviderError::internal("calendar client not initialized"))?;

        client.delete_event(&self.config.calendar_id, event_id).await
    }
}

impl CalendarDestination for GoogleDestination {
    fn name(&self) -> &str {
        "google"
    }

    fn clear(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move { self.clear_impl().await.map_err(|e| e.with_provider("google")) })
    }

    fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move { self.list_impl().await.map_err(|e| e.with_provider("google")) })
    }

    fn insert_event<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.insert_impl(event)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }

    fn update_event<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.update_impl(event)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }

    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.delete_impl(event_id)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }
}
