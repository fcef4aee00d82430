//! Sign-in through Google's OAuth2 authorization-code flow.

use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::form::normalize_email;
use crate::gateway::google_oauth::{GoogleOAuthClient, GoogleUserInfo};
use crate::profile::{MAX_IMAGE_REF_LENGTH, MAX_NAME_LENGTH};
use crate::{profiles, sex::Sex, users, Id};
use chrono::Utc;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;

/// The account a Google sign-in resolved to.
#[derive(Debug)]
pub struct FederatedSignIn {
    pub user: users::Model,
    /// True when this sign-in created the account.
    pub created: bool,
}

/// Where to send the browser to ask Google for consent.
pub fn google_authorization_url(config: &Config) -> Result<String, Error> {
    Ok(GoogleOAuthClient::from_config(config)?.get_authorization_url())
}

/// Completes the flow for the authorization `code` Google redirected back with.
///
/// The email Google reports identifies the account. A first sign-in creates a
/// user that can only sign in through Google, plus a profile built from the
/// Google names and picture; later sign-ins reuse the account untouched.
pub async fn sign_in_with_google(
    db: &DatabaseConnection,
    config: &Config,
    code: &str,
) -> Result<FederatedSignIn, Error> {
    let client = GoogleOAuthClient::from_config(config)?;
    let access_token = client.exchange_code(code).await?;
    let user_info = client.get_user_info(&access_token).await?;

    let Some(email) = user_info
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(normalize_email)
    else {
        warn!("Google user info carried no email");
        return Err(Error::external("Google did not share an email address"));
    };

    let (user, created) =
        entity_api::user::get_or_create_with_profile(db, &email, profile_from(&user_info))
            .await?;

    if created {
        info!("Created account {} from a Google sign-in", user.id);
    } else if user.has_usable_password() {
        warn!(
            "Google sign-in for {} linked to existing account {} that also has a password",
            email, user.id
        );
    }

    if !user.is_active {
        info!("Rejecting Google sign-in for inactive account {}", user.id);
        return Err(Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Unauthenticated,
            )),
        });
    }

    Ok(FederatedSignIn { user, created })
}

fn profile_from(user_info: &GoogleUserInfo) -> profiles::Model {
    let now = Utc::now();
    profiles::Model {
        id: Id::nil(),
        user_id: Id::nil(),
        first_name: truncate(user_info.given_name.as_deref(), MAX_NAME_LENGTH),
        last_name: truncate(user_info.family_name.as_deref(), MAX_NAME_LENGTH),
        sex: Sex::default(),
        bio: String::new(),
        birthdate: None,
        avatar: user_info
            .picture
            .as_deref()
            .filter(|picture| !picture.is_empty() && picture.len() <= MAX_IMAGE_REF_LENGTH)
            .map(str::to_string),
        cover_image: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

fn truncate(value: Option<&str>, max_chars: usize) -> String {
    value
        .unwrap_or_default()
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}
