use crate::auth::credentials::SecureSecret;
use crate::auth::token::Token;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Hard cancellation boundary for the one-shot authorization-code wait
pub const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const SUCCESS_PAGE: &str = "<html><body>\
<h2>Authorization complete</h2>\
<p>You can close this window and return to the trading application.</p>\
</body></html>";

const MISSING_CODE_PAGE: &str = "<html><body>\
<h2>Authorization failed</h2>\
<p>No authorization code was provided.</p>\
</body></html>";

/// OAuth2 authorization-code and refresh flows against the broker's
/// identity endpoints
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecureSecret,
    auth_url: String,
    token_url: String,
    redirect_uri: String,
    scope: String,
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl OAuthClient {
    pub fn new(
        client_id: String,
        client_secret: SecureSecret,
        auth_url: String,
        token_url: String,
        redirect_uri: String,
        scope: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            auth_url,
            token_url,
            redirect_uri,
            scope,
        }
    }

    /// The authorization URL the user must visit in a browser
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.auth_url, self.client_id, self.redirect_uri, self.scope
        )
    }

    /// Run the ephemeral local callback listener and block until it delivers
    /// exactly one authorization code, or the timeout elapses
    pub async fn wait_for_authorization_code(
        &self,
        wait_timeout: Duration,
    ) -> Result<String, AuthError> {
        let (host, port, path) = parse_redirect_addr(&self.redirect_uri)?;
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| AuthError::ListenerError(format!("bind {}:{}: {}", host, port, e)))?;
        info!(
            "Waiting for OAuth callback on {}:{}{} ({}s timeout)",
            host,
            port,
            path,
            wait_timeout.as_secs()
        );

        match timeout(wait_timeout, accept_callback(listener, &path)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout(wait_timeout.as_secs())),
        }
    }

    /// Exchange an authorization code for a token
    pub async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
        ];
        self.request_token(&params, None).await
    }

    /// Silently refresh using a refresh token; the previous refresh token is
    /// carried forward when the endpoint does not rotate it
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
        ];
        self.request_token(&params, Some(refresh_token)).await
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<Token, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeRejected(format!("{}: {}", status, body)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ParseError(e.to_string()))?;

        let expires_at =
            Utc::now().timestamp() + body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let refresh_token = body
            .refresh_token
            .or_else(|| previous_refresh.map(|s| s.to_string()));

        debug!("Token obtained, expires at epoch {}", expires_at);
        Ok(Token::new(body.access_token, refresh_token, expires_at))
    }
}

/// Accept connections until the expected callback path arrives; unrelated
/// requests (favicon probes and the like) get a 404 and are ignored
async fn accept_callback(listener: TcpListener, path: &str) -> Result<String, AuthError> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::ListenerError(e.to_string()))?;
        debug!("OAuth callback connection from {}", peer);

        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.is_err() {
            continue;
        }

        let target = match request_line.split_whitespace().nth(1) {
            Some(target) => target.to_string(),
            None => continue,
        };

        let (req_path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target.as_str(), None),
        };

        let mut stream = reader.into_inner();
        if req_path != path {
            let _ = write_response(&mut stream, "404 Not Found", "").await;
            continue;
        }

        match query.and_then(|q| query_param(q, "code")) {
            Some(code) if !code.is_empty() => {
                let _ = write_response(&mut stream, "200 OK", SUCCESS_PAGE).await;
                return Ok(code);
            }
            _ => {
                warn!("OAuth callback arrived without a code parameter");
                let _ = write_response(&mut stream, "400 Bad Request", MISSING_CODE_PAGE).await;
                return Err(AuthError::MissingCode);
            }
        }
    }
}

async fn write_response(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == name {
            Some(v.to_string())
        } else {
            None
        }
    })
}

/// Parse host, port and callback path out of the configured redirect URI
pub fn parse_redirect_addr(redirect_uri: &str) -> Result<(String, u16, String), AuthError> {
    let rest = redirect_uri
        .strip_prefix("http://")
        .or_else(|| redirect_uri.strip_prefix("https://"))
        .ok_or_else(|| AuthError::InvalidRedirectUri(redirect_uri.to_string()))?;

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx..].to_string()),
        None => (rest, "/".to_string()),
    };

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| AuthError::InvalidRedirectUri(redirect_uri.to_string()))?;
            (host.to_string(), port)
        }
        None => (authority.to_string(), 80),
    };

    if host.is_empty() {
        return Err(AuthError::InvalidRedirectUri(redirect_uri.to_string()));
    }
    Ok((host, port, path))
}

/// Authentication error
#[derive(Debug, Clone)]
pub enum AuthError {
    MissingCode,
    Timeout(u64),
    ListenerError(String),
    InvalidRedirectUri(String),
    ExchangeRejected(String),
    NetworkError(String),
    ParseError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCode => write!(f, "Authorization callback carried no code"),
            AuthError::Timeout(secs) => {
                write!(f, "No authorization code received within {}s", secs)
            }
            AuthError::ListenerError(msg) => write!(f, "Callback listener error: {}", msg),
            AuthError::InvalidRedirectUri(uri) => write!(f, "Invalid redirect URI: {}", uri),
            AuthError::ExchangeRejected(msg) => write!(f, "Token endpoint rejected request: {}", msg),
            AuthError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AuthError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
