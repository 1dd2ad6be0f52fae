use crate::shop::error::ShopError;
use crate::shop::models::{AuthRequest, AuthResponse, InfoResponse, SendCoinRequest};
use reqwest::{Client, Response, StatusCode};
use shopstress_macros::transaction;
use std::fmt;
use std::time::Duration;

/// Opaque bearer token issued by `/api/auth`.
///
/// The default token is empty; requests made with it are expected to be rejected.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Token(<empty>)")
        } else {
            write!(f, "Token(<redacted>)")
        }
    }
}

/// HTTP client for the coin-shop API. Every call is a transaction, checked against the status
/// the service returns on success.
#[derive(Debug, Clone)]
pub struct ShopClient {
    http: Client,
    base_url: String,
}

impl ShopClient {
    pub fn new(base_url: &str) -> Result<Self, ShopError> {
        Self::with_client(base_url, Client::new())
    }

    /// Client with a per-request timeout. `None` keeps reqwest's default of no timeout.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ShopError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(base_url, builder.build()?)
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self, ShopError> {
        let invalid = || ShopError::InvalidBaseUrl(base_url.to_string());
        let url = reqwest::Url::parse(base_url).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(invalid());
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Log in, registering the user on first use.
    #[transaction("auth")]
    pub async fn auth(&self, username: &str, password: &str) -> Result<Token, ShopError> {
        let res = self
            .http
            .post(self.url("/api/auth"))
            .json(&AuthRequest { username, password })
            .send()
            .await?;
        let body = expect_status(res, StatusCode::OK).await?.bytes().await?;

        let AuthResponse { token } = serde_json::from_slice(&body)?;
        if token.is_empty() {
            return Err(ShopError::EmptyToken);
        }
        Ok(Token(token))
    }

    #[transaction("send_coin")]
    pub async fn send_coin(
        &self,
        token: &Token,
        to_user: &str,
        amount: u32,
    ) -> Result<(), ShopError> {
        let res = self
            .http
            .post(self.url("/api/sendCoin"))
            .bearer_auth(token.as_str())
            .json(&SendCoinRequest { to_user, amount })
            .send()
            .await?;
        expect_status(res, StatusCode::OK).await?;
        Ok(())
    }

    #[transaction("info")]
    pub async fn info(&self, token: &Token) -> Result<InfoResponse, ShopError> {
        let res = self
            .http
            .get(self.url("/api/info"))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let body = expect_status(res, StatusCode::OK).await?.bytes().await?;
        let info: InfoResponse = serde_json::from_slice(&body)?;
        Ok(info)
    }

    #[transaction("buy")]
    pub async fn buy(&self, token: &Token, item: &str) -> Result<(), ShopError> {
        let res = self
            .http
            .get(self.url(&format!("/api/buy/{item}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        expect_status(res, StatusCode::OK).await?;
        Ok(())
    }
}

async fn expect_status(res: Response, expected: StatusCode) -> Result<Response, ShopError> {
    let actual = res.status();
    if actual == expected {
        Ok(res)
    } else {
        let body = res.text().await.unwrap_or_default();
        Err(ShopError::UnexpectedStatus {
            expected,
            actual,
            body,
        })
    }
}
