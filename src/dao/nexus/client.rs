use std::{future::Future, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode, Url};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dao::{
    access::{AccessResult, DataAccess},
    credential_store::CredentialStore,
    models::{TeamScoreSummary, UserInfo, summarize_teams},
};

use super::{
    config::NexusConfig,
    credential::{Credential, RefreshResponse, SignInResponse},
    error::{NexusDaoError, NexusResult},
};

/// Filters accepted by [`NexusClient::query_path`].
///
/// Ordering and range values are JSON-encoded before being sent, matching the
/// REST query syntax of the remote database.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Child key, `$key` or `$value` to order by.
    pub order_by: Option<String>,
    /// Keep only the first `n` ordered children.
    pub limit_to_first: Option<u32>,
    /// Keep only the last `n` ordered children.
    pub limit_to_last: Option<u32>,
    /// Lower bound of the ordered range.
    pub start_at: Option<Value>,
    /// Upper bound of the ordered range.
    pub end_at: Option<Value>,
    /// Exact match on the ordered value.
    pub equal_to: Option<Value>,
    /// Only return the keys directly below the path.
    pub shallow: bool,
}

impl QueryOptions {
    /// Keys-only listing of a path.
    pub fn shallow() -> Self {
        Self {
            shallow: true,
            ..Self::default()
        }
    }

    fn to_params(&self, id_token: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("auth", id_token.to_string())];
        if let Some(order_by) = &self.order_by {
            params.push(("orderBy", Value::String(order_by.clone()).to_string()));
        }
        if let Some(limit) = self.limit_to_first {
            params.push(("limitToFirst", limit.to_string()));
        }
        if let Some(limit) = self.limit_to_last {
            params.push(("limitToLast", limit.to_string()));
        }
        if let Some(value) = &self.start_at {
            params.push(("startAt", value.to_string()));
        }
        if let Some(value) = &self.end_at {
            params.push(("endAt", value.to_string()));
        }
        if let Some(value) = &self.equal_to {
            params.push(("equalTo", value.to_string()));
        }
        if self.shallow {
            params.push(("shallow", "true".to_string()));
        }
        params
    }
}

/// Authenticated client for the remote competition database and its identity provider.
#[derive(Clone)]
pub struct NexusClient {
    client: Client,
    config: Arc<NexusConfig>,
    credential: Arc<Mutex<Option<Credential>>>,
    credential_store: Arc<dyn CredentialStore>,
}

impl NexusClient {
    /// Build a client. No credential is held until a login or reload succeeds.
    pub fn new(config: NexusConfig, credential_store: Arc<dyn CredentialStore>) -> NexusResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| NexusDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            config: Arc::new(config),
            credential: Arc::new(Mutex::new(None)),
            credential_store,
        })
    }

    /// Read a single path of the database.
    pub async fn fetch_path(&self, path: &str) -> NexusResult<Value> {
        self.query_path(path, &QueryOptions::default()).await
    }

    /// Read a path of the database with ordering/range filters applied remotely.
    pub async fn query_path(&self, path: &str, options: &QueryOptions) -> NexusResult<Value> {
        let path = path.trim_start_matches('/');
        self.with_credential(|id_token| self.read(path, options, id_token))
            .await
    }

    /// Raw `teams` node of an event.
    pub async fn event_teams(&self, region: &str, event_id: &str) -> NexusResult<Value> {
        self.fetch_path(&format!("regions/{region}/events/{event_id}/teams"))
            .await
    }

    /// Run `op` with a valid id token, refreshing and retrying once when the database answers 401.
    async fn with_credential<T, F, Fut>(&self, op: F) -> NexusResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = NexusResult<T>>,
    {
        let id_token = self.valid_id_token().await?;
        match op(id_token).await {
            Err(NexusDaoError::Unauthorized { path, .. }) => {
                debug!(%path, "credential rejected; refreshing once before retrying");
                let id_token = self.force_refresh().await?;
                op(id_token).await
            }
            other => other,
        }
    }

    async fn read(&self, path: &str, options: &QueryOptions, id_token: String) -> NexusResult<Value> {
        let url = self.node_url(path)?;
        let response = self
            .client
            .get(url)
            .query(&options.to_params(&id_token))
            .send()
            .await
            .map_err(|source| NexusDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                response
                    .json::<Value>()
                    .await
                    .map_err(|source| NexusDaoError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    })
            }
            StatusCode::UNAUTHORIZED => {
                let message = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "Permission denied".to_string());
                Err(NexusDaoError::Unauthorized {
                    path: path.to_string(),
                    message,
                })
            }
            status => Err(NexusDaoError::RequestStatus {
                path: path.to_string(),
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// REST URL of a database node. Each key is percent-encoded as its own path segment.
    fn node_url(&self, path: &str) -> NexusResult<Url> {
        let invalid = |reason: String| NexusDaoError::InvalidDatabaseUrl {
            url: self.config.database_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.config.database_url).map_err(|err| invalid(err.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| invalid("cannot be a base URL".into()))?;
            segments.pop_if_empty();
            let keys: Vec<&str> = path.split('/').filter(|key| !key.is_empty()).collect();
            match keys.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        Ok(url)
    }

    /// Return the in-memory id token, refreshing it when close to expiry or
    /// reloading the persisted refresh token when none is held.
    async fn valid_id_token(&self) -> NexusResult<String> {
        let mut guard = self.credential.lock().await;
        let refresh_token = match guard.as_ref() {
            Some(credential) if !credential.needs_refresh(OffsetDateTime::now_utc()) => {
                return Ok(credential.id_token.clone());
            }
            Some(credential) => credential.refresh_token.clone(),
            None => self.persisted_refresh_token().await?,
        };

        self.install_refreshed(&mut guard, &refresh_token).await
    }

    async fn force_refresh(&self) -> NexusResult<String> {
        let mut guard = self.credential.lock().await;
        let refresh_token = match guard.as_ref() {
            Some(credential) => credential.refresh_token.clone(),
            None => self.persisted_refresh_token().await?,
        };

        self.install_refreshed(&mut guard, &refresh_token).await
    }

    async fn install_refreshed(
        &self,
        slot: &mut Option<Credential>,
        refresh_token: &str,
    ) -> NexusResult<String> {
        match self.exchange_refresh_token(refresh_token).await {
            Ok(credential) => {
                let id_token = credential.id_token.clone();
                *slot = Some(credential);
                Ok(id_token)
            }
            Err(err) => {
                if matches!(err, NexusDaoError::RefreshRejected { .. }) {
                    slot.take();
                }
                Err(err)
            }
        }
    }

    async fn persisted_refresh_token(&self) -> NexusResult<String> {
        self.credential_store
            .load()
            .await
            .map_err(NexusDaoError::CredentialStore)?
            .ok_or_else(|| NexusDaoError::NotAuthenticated {
                reason: "no credential in memory and no persisted refresh token".into(),
            })
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> NexusResult<Credential> {
        const TOKEN: &str = "token";
        let response = self
            .client
            .post(&self.config.token_url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(|source| NexusDaoError::RequestSend {
                path: TOKEN.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "token refresh rejected");
            return Err(NexusDaoError::RefreshRejected { status, body });
        }

        let payload = response
            .json::<RefreshResponse>()
            .await
            .map_err(|source| NexusDaoError::DecodeResponse {
                path: TOKEN.to_string(),
                source,
            })?;
        info!("credential refreshed");
        Credential::issued_now(payload.id_token, payload.refresh_token, &payload.expires_in)
    }

    /// Ask the login function to email a magic link.
    pub async fn request_magic_link(&self, email: &str) -> NexusResult<()> {
        const LOGIN_FUNCTION: &str = "sendLoginEmail";
        let response = self
            .client
            .post(&self.config.login_function_url)
            .json(&json!({
                "data": {
                    "email": email,
                    "redirectUrl": self.config.login_redirect_url,
                }
            }))
            .send()
            .await
            .map_err(|source| NexusDaoError::RequestSend {
                path: LOGIN_FUNCTION.to_string(),
                source,
            })?;

        if response.status().is_success() {
            info!(%email, "magic link sent");
            Ok(())
        } else {
            Err(NexusDaoError::RequestStatus {
                path: LOGIN_FUNCTION.to_string(),
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Complete the passwordless sign-in and hold the resulting credential.
    pub async fn sign_in_with_magic_link(&self, email: &str, magic_link: &str) -> NexusResult<Credential> {
        const SIGN_IN: &str = "accounts:signInWithEmailLink";
        let oob_code = extract_oob_code(magic_link).ok_or(NexusDaoError::InvalidMagicLink)?;

        let response = self
            .client
            .post(format!("{}/{SIGN_IN}", self.config.identity_url))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "email": email, "oobCode": oob_code }))
            .send()
            .await
            .map_err(|source| NexusDaoError::RequestSend {
                path: SIGN_IN.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(NexusDaoError::RequestStatus {
                path: SIGN_IN.to_string(),
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload = response
            .json::<SignInResponse>()
            .await
            .map_err(|source| NexusDaoError::DecodeResponse {
                path: SIGN_IN.to_string(),
                source,
            })?;
        let credential =
            Credential::issued_now(payload.id_token, payload.refresh_token, &payload.expires_in)?;

        self.credential.lock().await.replace(credential.clone());
        info!(%email, "signed in");
        Ok(credential)
    }

    /// Look up the account owning the current credential.
    pub async fn lookup_user(&self) -> NexusResult<Value> {
        self.with_credential(|id_token| self.lookup(id_token)).await
    }

    async fn lookup(&self, id_token: String) -> NexusResult<Value> {
        const LOOKUP: &str = "accounts:lookup";
        let response = self
            .client
            .post(format!("{}/{LOOKUP}", self.config.identity_url))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|source| NexusDaoError::RequestSend {
                path: LOOKUP.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                response
                    .json::<Value>()
                    .await
                    .map_err(|source| NexusDaoError::DecodeResponse {
                        path: LOOKUP.to_string(),
                        source,
                    })
            }
            StatusCode::UNAUTHORIZED => Err(NexusDaoError::Unauthorized {
                path: LOOKUP.to_string(),
                message: response.text().await.unwrap_or_default(),
            }),
            status => Err(NexusDaoError::RequestStatus {
                path: LOOKUP.to_string(),
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Replace the in-memory credential with one derived from the persisted refresh token.
    pub async fn reload(&self) -> NexusResult<()> {
        let mut guard = self.credential.lock().await;
        let refresh_token = self.persisted_refresh_token().await?;
        self.install_refreshed(&mut guard, &refresh_token).await?;
        Ok(())
    }

    /// Drop the in-memory credential.
    pub async fn clear_credential(&self) {
        self.credential.lock().await.take();
    }
}

/// Pull the `oobCode` sign-in code out of a magic link, looking one level into
/// a wrapped `link` parameter as produced by dynamic links.
fn extract_oob_code(magic_link: &str) -> Option<String> {
    let url = Url::parse(magic_link.trim()).ok()?;
    let mut nested = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "oobCode" if !value.is_empty() => return Some(value.into_owned()),
            "link" => nested = Some(value.into_owned()),
            _ => {}
        }
    }

    let inner = Url::parse(&nested?).ok()?;
    inner
        .query_pairs()
        .find(|(key, value)| key == "oobCode" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

impl DataAccess for NexusClient {
    fn region_events(&self, region: String) -> BoxFuture<'static, AccessResult<Value>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .fetch_path(&format!("regionSummaries/{region}/events"))
                .await
                .map_err(Into::into)
        })
    }

    fn list_regions(&self) -> BoxFuture<'static, AccessResult<Vec<String>>> {
        let client = self.clone();
        Box::pin(async move {
            let listing = client
                .query_path("regionSummaries", &QueryOptions::shallow())
                .await?;
            let mut regions: Vec<String> = listing
                .as_object()
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_default();
            regions.sort();
            Ok(regions)
        })
    }

    fn team_scores_summary(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Vec<TeamScoreSummary>>> {
        let client = self.clone();
        Box::pin(async move {
            let teams = client.event_teams(&region, &event_id).await?;
            Ok(summarize_teams(&teams))
        })
    }

    fn event_sessions(
        &self,
        region: String,
        event_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .fetch_path(&format!("regions/{region}/events/{event_id}/games/sessions"))
                .await
                .map_err(Into::into)
        })
    }

    fn session_matches(
        &self,
        region: String,
        event_id: String,
        session_id: String,
    ) -> BoxFuture<'static, AccessResult<Value>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .fetch_path(&format!(
                    "regions/{region}/events/{event_id}/games/sessions/{session_id}/matches"
                ))
                .await
                .map_err(Into::into)
        })
    }

    fn request_login_challenge(&self, email: String) -> BoxFuture<'static, AccessResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.request_magic_link(&email).await.map_err(Into::into) })
    }

    fn complete_login(
        &self,
        email: String,
        magic_link: String,
    ) -> BoxFuture<'static, AccessResult<String>> {
        let client = self.clone();
        Box::pin(async move {
            let credential = client.sign_in_with_magic_link(&email, &magic_link).await?;
            Ok(credential.refresh_token)
        })
    }

    fn user_info(&self) -> BoxFuture<'static, AccessResult<UserInfo>> {
        let client = self.clone();
        Box::pin(async move {
            let raw = client.lookup_user().await?;
            Ok(UserInfo::from_lookup(&raw))
        })
    }

    fn reload_credential(&self) -> BoxFuture<'static, AccessResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.reload().await.map_err(Into::into) })
    }

    fn sign_out(&self) -> BoxFuture<'static, ()> {
        let client = self.clone();
        Box::pin(async move { client.clear_credential().await })
    }
}
