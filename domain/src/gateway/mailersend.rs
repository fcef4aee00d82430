use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use email_address::EmailAddress;
use log::*;
use serde::{Deserialize, Serialize};
use service::config::Config;

/// MailerSend API client for sending transactional emails
pub struct MailerSendClient {
    client: reqwest::Client,
    base_url: String,
}

/// Email recipient with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Email sender with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSender {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request payload for sending an email via MailerSend
#[derive(Debug, Serialize)]
pub struct SendEmailRequest {
    pub from: EmailSender,
    pub to: Vec<EmailRecipient>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Response from MailerSend API
#[derive(Debug, Deserialize)]
pub struct SendEmailResponse {
    pub message_id: Option<String>,
}

impl MailerSendClient {
    /// Create a new MailerSend client with authentication
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = build_client(config)?;

        Ok(Self {
            client,
            base_url: config.mailersend_base_url().to_string(),
        })
    }

    /// Sends `request` through `POST {base_url}/email`. MailerSend answers
    /// 202 with the message id in a header and no body.
    pub async fn send_email(&self, request: SendEmailRequest) -> Result<SendEmailResponse, Error> {
        let addresses = std::iter::once(request.from.email.as_str())
            .chain(request.to.iter().map(|recipient| recipient.email.as_str()));
        for address in addresses {
            if !is_valid_email(address) {
                warn!("Refusing to send email with invalid address: {address}");
                return Err(Error {
                    source: None,
                    error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                        "Invalid email address: {address}"
                    ))),
                });
            }
        }

        debug!(
            "Sending \"{}\" to {} recipient(s)",
            request.subject,
            request.to.len()
        );

        let response = self
            .client
            .post(format!("{}/email", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                warn!("MailerSend request failed: {err:?}");
                Error::from(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("MailerSend rejected the email: {status} {body}");
            return Err(Error::external(format!("MailerSend answered {status}")));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        info!("Email accepted by MailerSend, message_id: {message_id:?}");

        Ok(SendEmailResponse { message_id })
    }
}

/// Build HTTP client with MailerSend authentication
fn build_client(config: &Config) -> Result<reqwest::Client, Error> {
    let headers = build_auth_headers(config)?;

    Ok(reqwest::Client::builder()
        .use_rustls_tls()
        .default_headers(headers)
        .build()?)
}

/// Build authentication headers for MailerSend API
fn build_auth_headers(config: &Config) -> Result<reqwest::header::HeaderMap, Error> {
    let api_key = config.mailersend_api_key().ok_or_else(|| {
        warn!("Failed to get MailerSend API key from config");
        Error::config()
    })?;

    let mut headers = reqwest::header::HeaderMap::new();
    let auth_value = format!("Bearer {}", api_key);
    let mut auth_header = reqwest::header::HeaderValue::from_str(&auth_value).map_err(|err| {
        warn!("Failed to create authorization header value: {err:?}");
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to create authorization header value".to_string(),
            )),
        }
    })?;
    auth_header.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, auth_header);

    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    Ok(headers)
}

fn is_valid_email(email: &str) -> bool {
    EmailAddress::is_valid(email)
}
