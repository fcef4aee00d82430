use crate::error::Error;
use crate::form::{clean_email, FieldErrors, Validate, Validated, REQUIRED};
use crate::{users, Id};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

pub use entity_api::user::{AuthSession, Backend, Credentials};

/// Shown when the submitted credentials don't match an account that may sign in.
pub const WRONG_CREDENTIALS: &str = "Wrong email or password";
/// Shown when the login form itself is malformed.
pub const INVALID_LOGIN_FORM: &str = "Form is not valid";

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<users::Model, Error> {
    Ok(entity_api::user::find_by_id(db, id).await?)
}

pub async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<users::Model>, Error> {
    Ok(entity_api::user::find_by_email(db, email).await?)
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

impl Validate for LoginForm {
    type Output = Credentials;

    fn validate(&self) -> Validated<Credentials> {
        let mut errors = FieldErrors::new();
        let email = clean_email(&mut errors, "email", &self.email);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        match email {
            Some(email) if errors.is_empty() => Ok(Credentials {
                email,
                password: self.password.clone(),
                next: self.next.as_deref().and_then(local_redirect).map(str::to_string),
            }),
            _ => Err(errors),
        }
    }
}

/// Returns `next` when it is a path on this site, rejecting absolute and
/// protocol-relative URLs that would send the user elsewhere.
pub fn local_redirect(next: &str) -> Option<&str> {
    let next = next.trim();
    if next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && next.chars().all(|c| c.is_ascii_graphic())
    {
        Some(next)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_login_form_yields_credentials() {
        let form = LoginForm {
            email: "ada@Example.com".to_string(),
            password: "Secret123!".to_string(),
            next: Some("/profile".to_string()),
        };

        let credentials = form.validate().unwrap();

        assert_eq!(credentials.email, "ada@example.com");
        assert_eq!(credentials.password, "Secret123!");
        assert_eq!(credentials.next.as_deref(), Some("/profile"));
    }

    #[test]
    fn missing_fields_are_reported() {
        let errors = LoginForm::default().validate().unwrap_err();

        assert_eq!(errors.get("email"), [REQUIRED]);
        assert_eq!(errors.get("password"), [REQUIRED]);
    }

    #[test]
    fn off_site_next_is_dropped() {
        let form = LoginForm {
            email: "ada@example.com".to_string(),
            password: "Secret123!".to_string(),
            next: Some("//evil.example/".to_string()),
        };

        assert_eq!(form.validate().unwrap().next, None);
        assert_eq!(local_redirect("https://evil.example"), None);
        assert_eq!(local_redirect("/home"), Some("/home"));
        assert_eq!(local_redirect("/a\nb"), None);
        assert_eq!(local_redirect("/a b"), None);
        assert_eq!(local_redirect("/caf\u{e9}"), None);
    }
}
