//! HTML templates, compiled into the binary and rendered with Tera.

use domain::error::{DomainErrorKind, Error as DomainError, InternalErrorKind};
use domain::form::FieldErrors;
use domain::{sex::Sex, users};
use log::*;
use service::config::Config;
use tera::{Context, Tera};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    (
        "users/_login_form.html",
        include_str!("../templates/users/_login_form.html"),
    ),
    (
        "users/register.html",
        include_str!("../templates/users/register.html"),
    ),
    (
        "users/_register_form.html",
        include_str!("../templates/users/_register_form.html"),
    ),
    (
        "users/register_success.html",
        include_str!("../templates/users/register_success.html"),
    ),
    (
        "users/password_reset.html",
        include_str!("../templates/users/password_reset.html"),
    ),
    (
        "users/_password_reset_form.html",
        include_str!("../templates/users/_password_reset_form.html"),
    ),
    (
        "users/password_reset_done.html",
        include_str!("../templates/users/password_reset_done.html"),
    ),
    (
        "users/password_reset_confirm.html",
        include_str!("../templates/users/password_reset_confirm.html"),
    ),
    (
        "users/_password_reset_confirm_form.html",
        include_str!("../templates/users/_password_reset_confirm_form.html"),
    ),
    (
        "users/password_reset_complete.html",
        include_str!("../templates/users/password_reset_complete.html"),
    ),
    (
        "profiles/profile.html",
        include_str!("../templates/profiles/profile.html"),
    ),
    (
        "profiles/update.html",
        include_str!("../templates/profiles/update.html"),
    ),
    (
        "profiles/_update_form.html",
        include_str!("../templates/profiles/_update_form.html"),
    ),
];

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        debug!("Loaded {} templates", TEMPLATES.len());

        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String, DomainError> {
        self.tera.render(template, context).map_err(|err| {
            error!("Failed to render {template}: {err:?}");
            DomainError {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                    "Failed to render template {template}"
                ))),
            }
        })
    }
}

/// Values every page needs: the site name for the title bar and whether
/// someone is signed in for the navigation links.
pub fn page_context(config: &Config, current_user: Option<&users::Model>) -> Context {
    let mut context = Context::new();
    context.insert("site_name", config.site_name());
    context.insert("current_user", &current_user.map(|user| &user.email));
    context.insert("errors", &FieldErrors::new());
    context.insert(
        "sex_choices",
        &Sex::choices().map(|sex| sex.to_string()),
    );
    context
}
