//! Password reset by emailed, signed, time-limited links.
//!
//! A link has the shape `/reset/{uidb64}/{token}`. `uidb64` is the user id in
//! unpadded URL-safe base64. The token is `{timestamp}-{signature}` where the
//! timestamp is seconds since the Unix epoch in base 36 and the signature is
//! the hex HMAC-SHA256 of the user id, the stored password hash and that
//! timestamp. Signing over the hash makes every outstanding link unusable
//! once the password changes.

use crate::emails;
use crate::error::Error;
use crate::form::{clean_email, clean_new_password, FieldErrors, Validate, Validated};
use crate::{users, Id};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use service::config::Config;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const EMAIL_NOT_REGISTERED: &str = "This email address is not registered.";

// Domain separation for the signature.
const KEY_SALT: &str = "social_app.password_reset";

/// Issues and checks the tokens embedded in reset links.
pub struct PasswordResetTokenGenerator {
    secret: SecretString,
    timeout_secs: u64,
}

impl PasswordResetTokenGenerator {
    pub fn new(secret: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            timeout_secs,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret = config.secret_key().ok_or_else(|| {
            error!("SECRET_KEY is not configured, password reset links cannot be signed");
            Error::config()
        })?;

        Ok(Self::new(secret, config.password_reset_timeout_secs))
    }

    pub fn make_token(&self, user: &users::Model, now: DateTime<Utc>) -> Result<String, Error> {
        let timestamp = u64::try_from(now.timestamp()).map_err(|_| Error::invalid_token())?;
        let signature = self.mac(user, timestamp)?.finalize().into_bytes();

        Ok(format!("{}-{}", to_base36(timestamp), hex::encode(signature)))
    }

    /// True when `token` was issued for `user` in its current state and has not expired.
    pub fn check_token(&self, user: &users::Model, token: &str, now: DateTime<Utc>) -> bool {
        if !user.is_active || !user.has_usable_password() {
            return false;
        }

        let Some((timestamp, signature)) = token.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(timestamp) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let signature_matches = match self.mac(user, timestamp) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        };
        if !signature_matches {
            return false;
        }

        let Ok(now) = u64::try_from(now.timestamp()) else {
            return false;
        };
        now.saturating_sub(timestamp) <= self.timeout_secs
    }

    fn mac(&self, user: &users::Model, timestamp: u64) -> Result<HmacSha256, Error> {
        let key = format!("{KEY_SALT}{}", self.secret.expose_secret());
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|err| {
            warn!("Failed to key the reset token signature: {err:?}");
            Error::config()
        })?;
        mac.update(user.id.as_bytes());
        mac.update(user.password.as_bytes());
        mac.update(timestamp.to_string().as_bytes());
        Ok(mac)
    }
}

pub fn encode_uid(id: Id) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<Id> {
    let decoded = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.parse().ok()
}

/// Absolute link sent to the user.
pub fn reset_link(config: &Config, user: &users::Model, token: &str) -> String {
    format!(
        "{}/reset/{}/{}",
        config.site_base_url(),
        encode_uid(user.id),
        token
    )
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn from_base36(value: &str) -> Option<u64> {
    // 13 base 36 digits already exceed u64.
    if value.is_empty() || value.len() > 13 {
        return None;
    }
    u64::from_str_radix(value, 36).ok()
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct PasswordResetForm {
    pub email: String,
}

impl Validate for PasswordResetForm {
    type Output = String;

    fn validate(&self) -> Validated<String> {
        let mut errors = FieldErrors::new();
        match clean_email(&mut errors, "email", &self.email) {
            Some(email) => Ok(email),
            None => Err(errors),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
}

impl SetPasswordForm {
    /// Validates the new password, checking its similarity against `email`.
    pub fn validate_for(&self, email: &str) -> Validated<String> {
        let mut errors = FieldErrors::new();
        clean_new_password(
            &mut errors,
            ("new_password1", &self.new_password1),
            ("new_password2", &self.new_password2),
            Some(email),
        )
        .ok_or(errors)
    }
}

/// Emails a reset link to the account registered under the submitted email.
///
/// Unknown emails are reported as a field error. Federated-only and inactive
/// accounts pass validation but receive no email.
pub async fn request_reset(
    db: &DatabaseConnection,
    config: &Config,
    form: &PasswordResetForm,
    now: DateTime<Utc>,
) -> Result<Validated<()>, Error> {
    let email = match form.validate() {
        Ok(email) => email,
        Err(errors) => return Ok(Err(errors)),
    };

    let Some(user) = entity_api::user::find_by_email(db, &email).await? else {
        debug!("Password reset requested for unregistered email");
        return Ok(Err(FieldErrors::single("email", EMAIL_NOT_REGISTERED)));
    };

    if !user.is_active || !user.has_usable_password() {
        info!(
            "Not sending a password reset email to user {}, it cannot sign in with a password",
            user.id
        );
        return Ok(Ok(()));
    }

    let generator = PasswordResetTokenGenerator::from_config(config)?;
    let token = generator.make_token(&user, now)?;
    emails::send_password_reset_email(config, &user, &reset_link(config, &user, &token)).await?;

    Ok(Ok(()))
}

/// Resolves the user a reset link was issued for, failing with an
/// invalid-token error for any link that may not be used.
pub async fn check_link(
    db: &DatabaseConnection,
    config: &Config,
    uidb64: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<users::Model, Error> {
    let Some(user_id) = decode_uid(uidb64) else {
        debug!("Reset link carries an undecodable uid");
        return Err(Error::invalid_token());
    };

    let user = match entity_api::user::find_by_id(db, user_id).await {
        Ok(user) => user,
        Err(err) => {
            let err = Error::from(err);
            if err.is_not_found() {
                return Err(Error::invalid_token());
            }
            return Err(err);
        }
    };

    let generator = PasswordResetTokenGenerator::from_config(config)?;
    if !generator.check_token(&user, token, now) {
        debug!("Reset token rejected for user {}", user.id);
        return Err(Error::invalid_token());
    }

    Ok(user)
}

/// Stores the new password for the user a valid link was issued for.
pub async fn confirm_reset(
    db: &DatabaseConnection,
    config: &Config,
    (uidb64, token): (&str, &str),
    form: &SetPasswordForm,
    now: DateTime<Utc>,
) -> Result<Validated<users::Model>, Error> {
    let user = check_link(db, config, uidb64, token, now).await?;

    let new_password = match form.validate_for(&user.email) {
        Ok(password) => password,
        Err(errors) => return Ok(Err(errors)),
    };

    let user = entity_api::user::set_password(db, user, new_password).await?;
    info!("Password reset completed for user {}", user.id);

    Ok(Ok(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const TIMEOUT: u64 = 60 * 60 * 6;

    fn user() -> users::Model {
        let now = Utc::now();
        users::Model {
            id: Id::new_v4(),
            email: "ada@example.com".to_string(),
            password: "$argon2id$v=19$first".to_string(),
            is_staff: false,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn generator() -> PasswordResetTokenGenerator {
        PasswordResetTokenGenerator::new("test-secret", TIMEOUT)
    }

    #[test]
    fn token_is_valid_until_the_timeout() {
        let user = user();
        let token = generator().make_token(&user, issued_at()).unwrap();

        assert!(generator().check_token(&user, &token, issued_at()));
        assert!(generator().check_token(
            &user,
            &token,
            issued_at() + Duration::seconds(TIMEOUT as i64)
        ));
        assert!(!generator().check_token(
            &user,
            &token,
            issued_at() + Duration::seconds(TIMEOUT as i64 + 1)
        ));
    }

    #[test]
    fn changing_the_password_invalidates_the_token() {
        let user = user();
        let token = generator().make_token(&user, issued_at()).unwrap();
        let changed = users::Model {
            password: "$argon2id$v=19$second".to_string(),
            ..user
        };

        assert!(!generator().check_token(&changed, &token, issued_at()));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let user = user();
        let token = generator().make_token(&user, issued_at()).unwrap();
        let (timestamp, signature) = token.split_once('-').unwrap();
        let later = to_base36(from_base36(timestamp).unwrap() + TIMEOUT);

        assert!(!generator().check_token(&user, &format!("{later}-{signature}"), issued_at()));
        assert!(!generator().check_token(&user, &format!("{timestamp}-00{signature}"), issued_at()));
        assert!(!generator().check_token(&user, "not-a-token", issued_at()));
        assert!(!generator().check_token(&user, "", issued_at()));
        assert!(!PasswordResetTokenGenerator::new("other-secret", TIMEOUT)
            .check_token(&user, &token, issued_at()));
    }

    #[test]
    fn federated_and_inactive_accounts_never_validate() {
        let federated = users::Model {
            password: "!b9f0c2".to_string(),
            ..user()
        };
        let inactive = users::Model {
            is_active: false,
            ..user()
        };

        for user in [federated, inactive] {
            let token = generator().make_token(&user, issued_at()).unwrap();
            assert!(!generator().check_token(&user, &token, issued_at()));
        }
    }

    #[test]
    fn uid_survives_the_url() {
        let id = Id::new_v4();
        let uidb64 = encode_uid(id);

        assert!(!uidb64.contains('='));
        assert_eq!(decode_uid(&uidb64), Some(id));
        assert_eq!(decode_uid("%%%"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("not-a-uuid")), None);
    }

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("10"), Some(36));
        assert_eq!(from_base36("zzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn set_password_form_uses_the_shared_validators() {
        let form = SetPasswordForm {
            new_password1: "12345678".to_string(),
            new_password2: "12345678".to_string(),
        };

        let errors = form.validate_for("ada@example.com").unwrap_err();

        assert!(errors.contains("new_password2"));
    }

    #[cfg(feature = "mock")]
    mod mock {
        use super::*;
        use clap::Parser;
        use sea_orm::{DatabaseBackend, MockDatabase};

        fn config(mailersend_url: &str) -> Config {
            Config::try_parse_from([
                "social_app",
                "--secret-key",
                "test-secret",
                "--mailersend-base-url",
                mailersend_url,
                "--mailersend-api-key",
                "test_api_key",
                "--site-base-url",
                "https://social.example",
            ])
            .unwrap()
        }

        fn form(email: &str) -> PasswordResetForm {
            PasswordResetForm {
                email: email.to_string(),
            }
        }

        #[tokio::test]
        async fn unregistered_email_is_a_field_error() -> Result<(), Error> {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<users::Model>::new()])
                .into_connection();

            let errors = request_reset(&db, &config("http://unused"), &form("who@x.com"), issued_at())
                .await?
                .unwrap_err();

            assert_eq!(errors.get("email"), [EMAIL_NOT_REGISTERED]);
            Ok(())
        }

        #[tokio::test]
        async fn registered_user_receives_a_reset_link() -> Result<(), Error> {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("POST", "/email")
                .match_header("authorization", "Bearer test_api_key")
                .match_body(mockito::Matcher::Regex(
                    "https://social.example/reset/".to_string(),
                ))
                .with_status(202)
                .create_async()
                .await;
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user()]])
                .into_connection();

            request_reset(&db, &config(&server.url()), &form("ada@example.com"), issued_at())
                .await?
                .unwrap();

            mock.assert_async().await;
            Ok(())
        }

        #[tokio::test]
        async fn federated_only_user_receives_no_email() -> Result<(), Error> {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("POST", "/email")
                .expect(0)
                .create_async()
                .await;
            let federated = users::Model {
                password: "!b9f0c2".to_string(),
                ..user()
            };
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[federated]])
                .into_connection();

            request_reset(&db, &config(&server.url()), &form("ada@example.com"), issued_at())
                .await?
                .unwrap();

            mock.assert_async().await;
            Ok(())
        }

        #[tokio::test]
        async fn confirm_reset_rejects_an_expired_link() {
            let user = user();
            let config = config("http://unused");
            let token = PasswordResetTokenGenerator::from_config(&config)
                .unwrap()
                .make_token(&user, issued_at())
                .unwrap();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection();
            let form = SetPasswordForm {
                new_password1: "N3w-Secret!".to_string(),
                new_password2: "N3w-Secret!".to_string(),
            };

            let result = confirm_reset(
                &db,
                &config,
                (&encode_uid(user.id), &token),
                &form,
                issued_at() + Duration::days(1),
            )
            .await;

            assert_eq!(
                result.unwrap_err().error_kind,
                crate::error::DomainErrorKind::Internal(
                    crate::error::InternalErrorKind::InvalidToken
                )
            );
        }

        #[tokio::test]
        async fn confirm_reset_stores_the_new_password() -> Result<(), Error> {
            let user = user();
            let config = config("http://unused");
            let token = PasswordResetTokenGenerator::from_config(&config)?
                .make_token(&user, issued_at())?;
            let saved = users::Model {
                password: "$argon2id$v=19$new".to_string(),
                ..user.clone()
            };
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .append_query_results([[saved.clone()]])
                .into_connection();
            let form = SetPasswordForm {
                new_password1: "N3w-Secret!".to_string(),
                new_password2: "N3w-Secret!".to_string(),
            };

            let updated = confirm_reset(
                &db,
                &config,
                (&encode_uid(user.id), &token),
                &form,
                issued_at() + Duration::hours(1),
            )
            .await?
            .unwrap();

            assert_eq!(updated.id, user.id);
            Ok(())
        }
    }
}
