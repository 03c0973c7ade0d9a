//! Reddit API access with an application-only OAuth token.
//!
//! The token is fetched lazily and kept until Reddit rejects it.  A rejected request triggers a
//! single refresh and a single retry.

use crate::{config, log_internal};
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const API_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Status and body of a finished HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Application credentials registered with Reddit.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
}

/// The HTTP operations the session needs.  Transport-level failures (DNS, TLS, timeouts) are
/// errors; any HTTP status, including 4xx/5xx, is a response.
#[serenity::async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with the given headers.
    async fn get(&self, url: &str, headers: &[(&'static str, String)]) -> Result<RawResponse>;
    /// POST a client-credentials grant to `url`, authenticating with `credentials`.
    async fn post_token(
        &self,
        url: &str,
        credentials: &Credentials,
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse>;
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// The User-Agent is left to the session, which sends it with every request.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[serenity::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&'static str, String)]) -> Result<RawResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    async fn post_token(
        &self,
        url: &str,
        credentials: &Credentials,
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse> {
        let mut request = self
            .client
            .post(url)
            .basic_auth(&credentials.id, Some(&credentials.secret))
            .form(&[("grant_type", "client_credentials")]);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// A bearer token.  Expiry is not tracked; a 401 is what tells us it went stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditToken {
    pub value: String,
    pub obtained_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Could not obtain Reddit token: {cause}")]
pub struct AuthError {
    pub cause: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Reddit responded with HTTP {status}: {body}")]
pub struct HttpError {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RedditError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("Could not reach Reddit: {0:#}")]
    Transport(anyhow::Error),
    #[error("Reddit sent malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct RedditSession<T = ReqwestTransport> {
    transport: T,
    credentials: Credentials,
    user_agent: String,
    // Held across a refresh, so only one refresh is ever in flight.
    token: Mutex<Option<RedditToken>>,
}

impl RedditSession<ReqwestTransport> {
    pub fn from_config(cfg: &config::Reddit) -> Result<Self> {
        let transport =
            ReqwestTransport::new(Duration::from_secs(cfg.timeout_seconds))?;
        let credentials = Credentials {
            id: cfg.api_id.clone(),
            secret: cfg.api_secret.clone(),
        };
        Ok(Self::new(transport, credentials, cfg.user_agent.clone()))
    }
}

impl<T: Transport> RedditSession<T> {
    pub fn new(transport: T, credentials: Credentials, user_agent: String) -> Self {
        Self {
            transport,
            credentials,
            user_agent,
            token: Mutex::new(None),
        }
    }

    fn user_agent(&self) -> (&'static str, String) {
        ("User-Agent", self.user_agent.clone())
    }

    fn headers(&self, token: &RedditToken) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", format!("bearer {}", token.value)),
            self.user_agent(),
        ]
    }

    async fn fetch_token(&self) -> Result<RedditToken, AuthError> {
        log_internal!("Getting new Reddit token");
        let response = self
            .transport
            .post_token(TOKEN_URL, &self.credentials, &[self.user_agent()])
            .await
            .map_err(|e| AuthError {
                cause: format!("{:#}", e),
            })?;

        if !response.is_success() {
            return Err(AuthError {
                cause: format!("HTTP {}: {}", response.status, response.body),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| AuthError {
                cause: format!("unexpected token response: {}", e),
            })?;

        Ok(RedditToken {
            value: parsed.access_token,
            obtained_at: Instant::now(),
        })
    }

    /// Exchange the credentials for a new token.  On failure any cached token is kept.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let mut cached = self.token.lock().await;
        *cached = Some(self.fetch_token().await?);
        Ok(())
    }

    /// The cached token, fetching one first if there is none.
    async fn current_token(&self) -> Result<RedditToken, AuthError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Replace `stale` after a 401.  If another task already replaced it while we waited for the
    /// lock, use theirs instead of refreshing again.
    async fn replace_token(&self, stale: &RedditToken) -> Result<RedditToken, AuthError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token != stale {
                return Ok(token.clone());
            }
        }

        log_internal!(
            "Reddit token out of date after {}s, refreshing...",
            stale.obtained_at.elapsed().as_secs()
        );
        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn get(&self, url: &str, token: &RedditToken) -> Result<RawResponse, RedditError> {
        self.transport
            .get(url, &self.headers(token))
            .await
            .map_err(RedditError::Transport)
    }

    /// Authenticated GET of an API path such as `/r/headpats/random`.
    pub async fn request(&self, path: &str) -> Result<serde_json::Value, RedditError> {
        let url = format!("{}{}", API_BASE, path);
        log_internal!("Fetching reddit resource: {}", url);

        let token = self.current_token().await?;
        let mut response = self.get(&url, &token).await?;

        if response.status == 401 {
            let token = self.replace_token(&token).await?;
            response = self.get(&url, &token).await?;
        }

        if !response.is_success() {
            return Err(HttpError {
                status: response.status,
                body: response.body,
            }
            .into());
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex as StdMutex,
        },
    };

    /// Replays canned responses and records what was asked of it
    #[derive(Default)]
    struct Scripted {
        gets: StdMutex<VecDeque<RawResponse>>,
        tokens: StdMutex<VecDeque<RawResponse>>,
        seen_authorization: StdMutex<Vec<String>>,
        token_calls: AtomicUsize,
    }

    fn responses(list: &[(u16, &str)]) -> VecDeque<RawResponse> {
        list.iter()
            .map(|(status, body)| RawResponse {
                status: *status,
                body: body.to_string(),
            })
            .collect()
    }

    impl Scripted {
        fn new(gets: &[(u16, &str)], tokens: &[(u16, &str)]) -> Self {
            Self {
                gets: StdMutex::new(responses(gets)),
                tokens: StdMutex::new(responses(tokens)),
                ..Default::default()
            }
        }
    }

    #[serenity::async_trait]
    impl Transport for Scripted {
        async fn get(&self, url: &str, headers: &[(&'static str, String)]) -> Result<RawResponse> {
            assert!(url.starts_with(API_BASE));
            let auth = headers
                .iter()
                .find(|(name, _)| *name == "Authorization")
                .map(|(_, value)| value.clone())
                .ok_or(anyhow!("no Authorization header"))?;
            assert!(headers
                .iter()
                .any(|(name, value)| *name == "User-Agent" && value == "test-agent"));
            self.seen_authorization.lock().unwrap().push(auth);

            self.gets
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(anyhow!("unexpected GET"))
        }

        async fn post_token(
            &self,
            url: &str,
            credentials: &Credentials,
            headers: &[(&'static str, String)],
        ) -> Result<RawResponse> {
            assert_eq!(url, TOKEN_URL);
            assert_eq!(credentials.id, "id");
            assert_eq!(headers, [("User-Agent", "test-agent".to_owned())]);
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            self.tokens
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(anyhow!("unexpected token request"))
        }
    }

    fn session(gets: &[(u16, &str)], tokens: &[(u16, &str)]) -> RedditSession<Scripted> {
        RedditSession::new(
            Scripted::new(gets, tokens),
            Credentials {
                id: "id".to_owned(),
                secret: "secret".to_owned(),
            },
            "test-agent".to_owned(),
        )
    }

    fn token_calls(session: &RedditSession<Scripted>) -> usize {
        session.transport.token_calls.load(Ordering::SeqCst)
    }

    async fn cached_token(session: &RedditSession<Scripted>) -> Option<String> {
        session.token.lock().await.as_ref().map(|t| t.value.clone())
    }

    const TOKEN_A: &str = r#"{"access_token": "aaa", "expires_in": 3600}"#;
    const TOKEN_B: &str = r#"{"access_token": "bbb", "expires_in": 3600}"#;

    #[tokio::test]
    async fn first_request_fetches_a_token() {
        let session = session(&[(200, r#"{"ok": true}"#)], &[(200, TOKEN_A)]);

        let value = session.request("/r/headpats/random").await.unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(token_calls(&session), 1);
        assert_eq!(cached_token(&session).await.as_deref(), Some("aaa"));
        assert_eq!(
            *session.transport.seen_authorization.lock().unwrap(),
            ["bearer aaa"]
        );
    }

    #[tokio::test]
    async fn cached_token_is_reused() {
        let session = session(&[(200, "1"), (200, "2")], &[(200, TOKEN_A)]);

        assert_eq!(session.request("/a").await.unwrap(), 1);
        assert_eq!(session.request("/b").await.unwrap(), 2);
        assert_eq!(token_calls(&session), 1);
    }

    #[tokio::test]
    async fn unauthorized_then_ok_refreshes_once() {
        let session = session(
            &[(401, "expired"), (200, r#"{"n": 2}"#)],
            &[(200, TOKEN_A), (200, TOKEN_B)],
        );
        session.refresh().await.unwrap();
        assert_eq!(token_calls(&session), 1);

        let value = session.request("/r/headpats/random").await.unwrap();
        assert_eq!(value["n"], 2);
        // Exactly one refresh beyond the initial token
        assert_eq!(token_calls(&session), 2);
        assert_eq!(
            *session.transport.seen_authorization.lock().unwrap(),
            ["bearer aaa", "bearer bbb"]
        );
    }

    #[tokio::test]
    async fn unauthorized_twice_fails_without_looping() {
        let session = session(
            &[(401, "expired"), (401, "still no")],
            &[(200, TOKEN_A), (200, TOKEN_B)],
        );
        session.refresh().await.unwrap();

        let err = session.request("/r/headpats/random").await.unwrap_err();
        match err {
            RedditError::Http(HttpError { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "still no");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(token_calls(&session), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let session = session(&[(503, "down")], &[(200, TOKEN_A)]);

        let err = session.request("/r/headpats/random").await.unwrap_err();
        assert!(matches!(err, RedditError::Http(HttpError { status: 503, .. })));
        assert_eq!(token_calls(&session), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let session = session(&[(401, "expired")], &[(200, TOKEN_A), (500, "oops")]);
        session.refresh().await.unwrap();

        let err = session.request("/r/headpats/random").await.unwrap_err();
        assert!(matches!(err, RedditError::Auth(_)));
        assert_eq!(cached_token(&session).await.as_deref(), Some("aaa"));
    }

    #[tokio::test]
    async fn rejected_credentials_surface_as_auth_error() {
        let rejected = session(&[], &[(401, "bad credentials")]);
        let err = rejected.refresh().await.unwrap_err();
        assert!(err.cause.contains("401"));
        assert!(cached_token(&rejected).await.is_none());

        let garbled = session(&[], &[(200, "not json")]);
        assert!(matches!(
            garbled.request("/x").await.unwrap_err(),
            RedditError::Auth(_)
        ));
    }
}
