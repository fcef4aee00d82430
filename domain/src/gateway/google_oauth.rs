//! Google OAuth2 client.
//!
//! Covers the three provider interactions of the authorization-code flow:
//! building the consent URL, exchanging the code for an access token and
//! reading the signed-in user's profile.

use crate::error::Error;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service::config::Config;
use std::time::Duration;

const SCOPES: &str = "openid profile email";

/// OAuth token response from Google
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// User info from Google
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Request to exchange authorization code for tokens
#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

/// Configuration for Google OAuth URLs
#[derive(Debug, Clone)]
pub struct GoogleOAuthUrls {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleOAuthUrls {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth_url: config.google_auth_url().to_string(),
            token_url: config.google_token_url().to_string(),
            userinfo_url: config.google_userinfo_url().to_string(),
        }
    }
}

/// Google OAuth client for the authorization-code flow
pub struct GoogleOAuthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    urls: GoogleOAuthUrls,
}

impl GoogleOAuthClient {
    /// Create a new Google OAuth client with configurable URLs. Every request
    /// made through it gives up after `timeout`.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        urls: GoogleOAuthUrls,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: SecretString::new(client_secret.to_string()),
            redirect_uri: redirect_uri.to_string(),
            urls,
        })
    }

    /// Builds the client from `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
    /// `GOOGLE_REDIRECT_URI`, failing with a config error when any is missing.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let (Some(client_id), Some(client_secret), Some(redirect_uri)) = (
            config.google_client_id(),
            config.google_client_secret(),
            config.google_redirect_uri(),
        ) else {
            error!("Google OAuth client id, secret and redirect URI must all be configured");
            return Err(Error::config());
        };

        Self::new(
            &client_id,
            &client_secret,
            &redirect_uri,
            GoogleOAuthUrls::from_config(config),
            Duration::from_secs(config.oauth_http_timeout_secs),
        )
    }

    /// Generate the OAuth authorization URL for user consent
    pub fn get_authorization_url(&self) -> String {
        format!(
            "{}?\
            client_id={}&\
            redirect_uri={}&\
            response_type=code&\
            scope={}",
            self.urls.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
        )
    }

    /// Exchange an authorization code for an access token. A response without
    /// a non-empty `access_token` is treated as a failed exchange.
    pub async fn exchange_code(&self, code: &str) -> Result<String, Error> {
        let request = TokenExchangeRequest {
            code,
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            redirect_uri: &self.redirect_uri,
            grant_type: "authorization_code",
        };

        debug!("Exchanging Google OAuth code for an access token");

        let response = self
            .client
            .post(&self.urls.token_url)
            .form(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to exchange Google OAuth code: {:?}", e);
                Error::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Google OAuth token error {}: {}", status, error_text);
            return Err(Error::external(format!(
                "Google token endpoint returned {status}"
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse Google token response: {:?}", e);
            Error::external("Invalid response from Google OAuth")
        })?;

        match tokens.access_token.filter(|token| !token.is_empty()) {
            Some(access_token) => {
                info!("Successfully exchanged Google OAuth code for an access token");
                Ok(access_token)
            }
            None => {
                warn!("Google token response carried no access_token");
                Err(Error::external("Google token response carried no access token"))
            }
        }
    }

    /// Get user info using the access token
    pub async fn get_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, Error> {
        let response = self
            .client
            .get(&self.urls.userinfo_url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to get Google user info: {:?}", e);
                Error::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Google user info error {}: {}", status, error_text);
            return Err(Error::external(format!(
                "Google user info endpoint returned {status}"
            )));
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse Google user info: {:?}", e);
            Error::external("Invalid response from Google")
        })
    }
}
