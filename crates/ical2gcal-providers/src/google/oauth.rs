//! OAuth 2.0 authorization for the Google Calendar API.
//!
//! Implements the authorization code flow with PKCE (RFC 7636) for a
//! desktop binary: the consent page opens in the user's browser and
//! Google redirects back to a short-lived listener on a loopback port.
//! The returned code is then exchanged for an access/refresh token pair.
//!
//! The listener binds 127.0.0.1 only, the PKCE challenge ties the
//! authorization code to this process, and a random `state` value guards
//! the redirect against CSRF.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;
use super::tokens::TokenSet;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Entropy (in bytes) behind the PKCE code verifier.
const VERIFIER_BYTES: usize = 32;

/// How long to wait for the user to finish the browser consent step.
const REDIRECT_WAIT: Duration = Duration::from_secs(300);

/// Drives the PKCE flow and token refresh against Google's OAuth
/// endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            credentials,
            http_client,
        }
    }

    /// Runs the interactive authorization flow.
    ///
    /// Binds a loopback listener, opens the browser on the consent URL
    /// and blocks until Google redirects back or [`REDIRECT_WAIT`]
    /// elapses.
    ///
    /// # Errors
    ///
    /// Fails when no port in `port_range` is free, when the user denies
    /// access or abandons the consent page, or when the code exchange is
    /// rejected.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenSet> {
        let pkce = PkceChallenge::new();
        let (listener, port) = Self::bind_redirect_listener(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let consent_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes);

        info!("opening browser for Google consent...");
        debug!("consent URL: {}", consent_url);
        if let Err(e) = open::that(&consent_url) {
            warn!("could not open a browser: {}", e);
            eprintln!("\nOpen this URL to authorize access:\n\n{}\n", consent_url);
        }

        let redirect = Self::recv_redirect(listener)?;
        if redirect.state != pkce.state {
            return Err(ProviderError::authentication(
                "state in OAuth redirect does not match the one we sent",
            ));
        }

        info!("authorization code received, exchanging for tokens...");
        let granted = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", &redirect.code),
                ("code_verifier", &pkce.verifier),
                ("grant_type", "authorization_code"),
                ("redirect_uri", &redirect_uri),
            ])
            .await?;

        info!("token exchange complete");
        Ok(TokenSet::new(
            granted.access_token,
            granted.refresh_token,
            granted.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Trades a refresh token for a fresh access token.
    ///
    /// Returns the token and its lifetime in seconds, when Google
    /// reports one.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> ProviderResult<(String, Option<i64>)> {
        let refreshed = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        debug!("access token refreshed");
        Ok((refreshed.access_token, refreshed.expires_in))
    }

    /// POSTs a form to the token endpoint and decodes the response.
    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("token response read failed: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("malformed token response: {}", e)))
    }

    /// Binds the first free loopback port in `range`.
    fn bind_redirect_listener(range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
        let (low, high) = range;
        for port in low..=high {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                debug!("redirect listener on port {}", port);
                return Ok((listener, port));
            }
        }
        Err(ProviderError::configuration(format!(
            "every port between {} and {} is taken",
            low, high
        )))
    }

    /// Accepts connections until one carries the OAuth redirect, with a
    /// deadline.
    fn recv_redirect(listener: TcpListener) -> ProviderResult<Redirect> {
        listener
            .set_nonblocking(false)
            .map_err(|e| ProviderError::internal(format!("listener setup failed: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        if let Some(outcome) = Self::answer_redirect(stream) {
                            let _ = tx.send(outcome);
                            return;
                        }
                    }
                    Err(e) => error!("accept failed on redirect listener: {}", e),
                }
            }
        });

        match rx.recv_timeout(REDIRECT_WAIT) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(
                "timed out waiting for the browser redirect",
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ProviderError::internal("redirect listener went away"))
            }
        }
    }

    /// Serves one HTTP request on the listener. Returns None for
    /// requests that are not the OAuth redirect (favicon fetches and the
    /// like), so the accept loop keeps going.
    fn answer_redirect(mut stream: TcpStream) -> Option<ProviderResult<Redirect>> {
        let mut request_line = String::new();
        if BufReader::new(&stream).read_line(&mut request_line).is_err() {
            return None;
        }

        // "GET /callback?code=...&state=... HTTP/1.1"
        let mut words = request_line.split_whitespace();
        let (method, target) = (words.next()?, words.next()?);
        if method != "GET" || !target.starts_with("/callback") {
            return None;
        }

        let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
        let mut code = None;
        let mut state = String::new();
        let mut denial = None;
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value).unwrap_or_default().into_owned();
            match key {
                "code" => code = Some(value),
                "state" => state = value,
                "error" => denial = Some(value),
                _ => {}
            }
        }

        let page = if denial.is_some() || code.is_none() {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
             <html><body><h1>Authorization failed</h1>\
             <p>Close this tab and check the terminal.</p></body></html>"
        } else {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
             <html><body><h1>Authorized</h1>\
             <p>Close this tab and head back to the terminal.</p></body></html>"
        };
        let _ = stream.write_all(page.as_bytes());
        let _ = stream.flush();

        Some(match (denial, code) {
            (Some(reason), _) => Err(ProviderError::authentication(format!(
                "authorization denied: {}",
                reason
            ))),
            (None, Some(code)) => Ok(Redirect { code, state }),
            (None, None) => Err(ProviderError::authentication(
                "redirect arrived without an authorization code",
            )),
        })
    }
}

/// The values Google appends to the redirect URI.
struct Redirect {
    code: String,
    state: String,
}

/// Per-attempt PKCE verifier/challenge pair plus the CSRF `state` value.
#[derive(Debug)]
pub struct PkceChallenge {
    /// High-entropy secret, sent only in the final token exchange.
    pub verifier: String,
    /// base64url(SHA-256(verifier)), sent in the consent URL.
    pub challenge: String,
    /// Random value Google echoes back in the redirect.
    pub state: String,
}

impl PkceChallenge {
    pub fn new() -> Self {
        let verifier = random_urlsafe(VERIFIER_BYTES);
        let challenge = Self::challenge_for(&verifier);
        let state = random_urlsafe(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// The S256 transformation from RFC 7636.
    fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Assembles the consent page URL for Google's authorization
    /// endpoint.
    ///
    /// `access_type=offline` plus `prompt=consent` makes Google hand out
    /// a refresh token, which later runs need to stay unattended.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        let query = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ]
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

        format!("{}?{}", GOOGLE_AUTH_URL, query)
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// `len` random bytes, base64url encoded without padding.
fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Token endpoint response body.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_urlsafe_chars() {
        let pkce = PkceChallenge::new();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(
            pkce.verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn challenge_matches_the_rfc_7636_vector() {
        // Appendix B of RFC 7636
        let challenge =
            PkceChallenge::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn each_attempt_gets_fresh_secrets() {
        let first = PkceChallenge::new();
        let second = PkceChallenge::new();
        assert_ne!(first.verifier, second.verifier);
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn consent_url_carries_the_pkce_parameters() {
        let pkce = PkceChallenge::new();
        let url = pkce.build_auth_url(
            "sync-client.apps.googleusercontent.com",
            "http://127.0.0.1:8085/callback",
            &["https://www.googleapis.com/auth/calendar".to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
        assert!(url.contains(&format!("state={}", pkce.state)));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8085%2Fcallback"));
    }
}
