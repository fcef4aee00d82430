use crate::{
    error::Error,
    gateway::mailersend::{EmailRecipient, EmailSender, MailerSendClient, SendEmailRequest},
    users,
};

use log::*;
use service::config::Config;

pub fn password_reset_subject(config: &Config) -> String {
    format!("Password reset on {}", config.site_name())
}

pub fn password_reset_text(config: &Config, user: &users::Model, link: &str) -> String {
    format!(
        "You're receiving this email because you requested a password reset for your user account at {site}.\n\
         \n\
         Please go to the following page and choose a new password:\n\
         \n\
         {link}\n\
         \n\
         Your username, in case you've forgotten: {email}\n\
         \n\
         Thanks for using our site!\n\
         \n\
         The {site} team\n",
        site = config.site_name(),
        email = user.email,
    )
}

/// Send the password reset link to `user`
pub async fn send_password_reset_email(
    config: &Config,
    user: &users::Model,
    link: &str,
) -> Result<(), Error> {
    info!("Initiating password reset email for user {}", user.id);

    let mailersend_client = MailerSendClient::new(config)?;

    let email_request = SendEmailRequest {
        from: EmailSender {
            email: config.default_from_email().to_string(),
            name: Some(config.site_name().to_string()),
        },
        to: vec![EmailRecipient {
            email: user.email.clone(),
            name: None,
        }],
        subject: password_reset_subject(config),
        text: Some(password_reset_text(config, user, link)),
        html: None,
    };
    debug!("Password reset email request created for user {}", user.id);

    mailersend_client.send_email(email_request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Id;
    use clap::Parser;

    fn user() -> users::Model {
        users::Model {
            id: Id::new_v4(),
            email: "ada@example.com".to_string(),
            password: "hashed_password".to_string(),
            is_staff: false,
            is_active: true,
            created_at: chrono::Utc::now().fixed_offset(),
            updated_at: chrono::Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn body_contains_link_and_username() {
        let config = Config::try_parse_from(["social_app"]).unwrap();

        let text = password_reset_text(&config, &user(), "https://social.example/reset/abc/def");

        assert!(text.contains("https://social.example/reset/abc/def"));
        assert!(text.contains("ada@example.com"));
        assert_eq!(password_reset_subject(&config), "Password reset on Social_app");
    }

    #[tokio::test]
    async fn send_fails_without_mailersend_api_key() {
        let config = Config::try_parse_from(["social_app"]).unwrap();

        let result = send_password_reset_email(&config, &user(), "https://x/reset/a/b").await;

        assert!(result.is_err());
    }
}
