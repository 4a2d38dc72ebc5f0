//! Google OAuth2 out-of-band flow.
//!
//! The user opens the consent URL in a browser and pastes the code
//! Google shows them back into the chat. No redirect endpoint needed.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};

const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct GoogleAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
}

impl GoogleAuth {
    pub fn new(config: &Config) -> Self {
        GoogleAuth {
            client: Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            scopes: config.google_auth_scopes.clone(),
        }
    }

    /// Consent URL the user visits to get an authorization code.
    pub fn auth_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(OOB_REDIRECT_URI),
            urlencoding::encode(&self.scopes.join(" ")),
        )
    }

    /// Exchange a pasted authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokens> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", OOB_REDIRECT_URI),
            ("grant_type", "authorization_code"),
        ];
        self.request_tokens(&params).await
    }

    /// Trade a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<GoogleTokens> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let mut tokens = self.request_tokens(&params).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<GoogleTokens> {
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = response.json().await?;
        Ok(GoogleTokens {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expiry: data.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        })
    }
}
