use crate::error::Result as WebResult;
use crate::response::{Outcome, RequestMode};
use crate::templates::page_context;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Form,
};
use chrono::Utc;
use domain::form::FieldErrors;
use domain::password_reset::{self as PasswordResetApi, PasswordResetForm, SetPasswordForm};
use log::*;
use tera::Context;

const RESET_PAGE: &str = "users/password_reset.html";
const RESET_FORM: &str = "users/_password_reset_form.html";
const CONFIRM_PAGE: &str = "users/password_reset_confirm.html";
const CONFIRM_FORM: &str = "users/_password_reset_confirm_form.html";

fn reset_context(app_state: &AppState, form: &PasswordResetForm, errors: &FieldErrors) -> Context {
    let mut context = page_context(app_state.config(), None);
    context.insert("form", form);
    context.insert("errors", errors);
    context
}

fn confirm_context(
    app_state: &AppState,
    (uidb64, token): (&str, &str),
    validlink: bool,
    errors: &FieldErrors,
) -> Context {
    let mut context = page_context(app_state.config(), None);
    context.insert("validlink", &validlink);
    context.insert("action", &format!("/reset/{uidb64}/{token}"));
    context.insert("errors", errors);
    context
}

/// GET the page asking for the email to send a reset link to
#[utoipa::path(
    get,
    path = "/password_reset",
    responses(
        (status = 200, description = "Password reset request form", body = String, content_type = "text/html"),
    )
)]
pub async fn new(State(app_state): State<AppState>, mode: RequestMode) -> WebResult<Response> {
    let context = reset_context(&app_state, &PasswordResetForm::default(), &FieldErrors::new());
    mode.respond(app_state.templates(), Outcome::page(RESET_PAGE, context))
}

/// Emails a password reset link to a registered address
#[utoipa::path(
    post,
    path = "/password_reset",
    request_body(content = PasswordResetForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Reset link sent, redirects to /password_reset/done"),
        (status = 400, description = "Invalid or unregistered email"),
        (status = 502, description = "The email could not be sent"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    mode: RequestMode,
    Form(form): Form<PasswordResetForm>,
) -> WebResult<Response> {
    let outcome = match PasswordResetApi::request_reset(
        app_state.db_conn_ref(),
        app_state.config(),
        &form,
        Utc::now(),
    )
    .await?
    {
        Ok(()) => Outcome::redirect("/password_reset/done"),
        Err(errors) => Outcome::Invalid {
            page: RESET_PAGE,
            fragment: RESET_FORM,
            context: reset_context(&app_state, &form, &errors),
        },
    };

    mode.respond(app_state.templates(), outcome)
}

/// GET the confirmation that a reset link was sent
#[utoipa::path(
    get,
    path = "/password_reset/done",
    responses(
        (status = 200, description = "Reset link sent", body = String, content_type = "text/html"),
    )
)]
pub async fn done(State(app_state): State<AppState>, mode: RequestMode) -> WebResult<Response> {
    mode.respond(
        app_state.templates(),
        Outcome::page(
            "users/password_reset_done.html",
            page_context(app_state.config(), None),
        ),
    )
}

/// GET the form for choosing a new password, when the reset link is valid
#[utoipa::path(
    get,
    path = "/reset/{uidb64}/{token}",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Password reset token"),
    ),
    responses(
        (status = 200, description = "Set password form, or an explanation that the link is invalid", body = String, content_type = "text/html"),
    )
)]
pub async fn edit(
    State(app_state): State<AppState>,
    mode: RequestMode,
    Path((uidb64, token)): Path<(String, String)>,
) -> WebResult<Response> {
    let validlink = match PasswordResetApi::check_link(
        app_state.db_conn_ref(),
        app_state.config(),
        &uidb64,
        &token,
        Utc::now(),
    )
    .await
    {
        Ok(_user) => true,
        Err(err) if err.is_invalid_token() => false,
        Err(err) => return Err(err.into()),
    };

    let context = confirm_context(&app_state, (&uidb64, &token), validlink, &FieldErrors::new());
    mode.respond(app_state.templates(), Outcome::page(CONFIRM_PAGE, context))
}

/// Stores a new password for the account a valid reset link was issued for
#[utoipa::path(
    post,
    path = "/reset/{uidb64}/{token}",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Password reset token"),
    ),
    request_body(content = SetPasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Password changed, redirects to /reset/done"),
        (status = 400, description = "Invalid password or an invalid reset link"),
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    mode: RequestMode,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<SetPasswordForm>,
) -> WebResult<Response> {
    let link = (uidb64.as_str(), token.as_str());
    let outcome = match PasswordResetApi::confirm_reset(
        app_state.db_conn_ref(),
        app_state.config(),
        link,
        &form,
        Utc::now(),
    )
    .await
    {
        Ok(Ok(user)) => {
            info!("User {} chose a new password", user.id);
            Outcome::redirect("/reset/done")
        }
        Ok(Err(errors)) => Outcome::Invalid {
            page: CONFIRM_PAGE,
            fragment: CONFIRM_FORM,
            context: confirm_context(&app_state, link, true, &errors),
        },
        Err(err) if err.is_invalid_token() => {
            debug!("Rejected a password change through an invalid reset link");
            Outcome::Page {
                status: StatusCode::BAD_REQUEST,
                template: CONFIRM_PAGE,
                context: confirm_context(&app_state, link, false, &FieldErrors::new()),
            }
        }
        Err(err) => return Err(err.into()),
    };

    mode.respond(app_state.templates(), outcome)
}

/// GET the confirmation that the password was changed
#[utoipa::path(
    get,
    path = "/reset/done",
    responses(
        (status = 200, description = "Password changed", body = String, content_type = "text/html"),
    )
)]
pub async fn complete(State(app_state): State<AppState>, mode: RequestMode) -> WebResult<Response> {
    mode.respond(
        app_state.templates(),
        Outcome::page(
            "users/password_reset_complete.html",
            page_context(app_state.config(), None),
        ),
    )
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use crate::test_support::*;
    use axum::http::{header::LOCATION, StatusCode};
    use chrono::Utc;
    use domain::password_reset::{encode_uid, PasswordResetTokenGenerator};
    use domain::users;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn valid_link(user: &users::Model) -> String {
        let config = config();
        let token = PasswordResetTokenGenerator::from_config(&config)
            .unwrap()
            .make_token(user, Utc::now())
            .unwrap();
        format!("/reset/{}/{token}", encode_uid(user.id))
    }

    #[tokio::test]
    async fn unregistered_email_is_a_field_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let app = app(db, config());

        let response = send(
            &app,
            form_post("/password_reset", "email=nobody%40example.com", false),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("This email address is not registered."));
    }

    #[tokio::test]
    async fn tampered_link_shows_the_invalid_link_page() {
        let ada = user("ada@example.com");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[ada.clone()]])
            .into_connection();
        let app = app(db, config());

        let response = send(&app, get(&format!("/reset/{}/1-deadbeef", encode_uid(ada.id)))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Password reset unsuccessful"));
    }

    #[tokio::test]
    async fn undecodable_uid_shows_the_invalid_link_page() {
        let app = app(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            config(),
        );

        let response = send(&app, get("/reset/%21%21/1-deadbeef")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Password reset unsuccessful"));
    }

    #[tokio::test]
    async fn valid_link_shows_the_set_password_form() {
        let ada = user("ada@example.com");
        let link = valid_link(&ada);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[ada]])
            .into_connection();
        let app = app(db, config());

        let response = send(&app, get(&link)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(r#"name="new_password1""#));
        // Tera escapes `/` inside attribute values.
        assert!(body.contains(&format!(r#"action="{}""#, link.replace('/', "&#x2F;"))));
    }

    #[tokio::test]
    async fn valid_link_and_password_change_the_password() {
        let ada = user("ada@example.com");
        let link = valid_link(&ada);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[ada.clone()]])
            .append_query_results([[ada]])
            .into_connection();
        let app = app(db, config());

        let response = send(
            &app,
            form_post(
                &link,
                "new_password1=Quiet-Harbor-71&new_password2=Quiet-Harbor-71",
                false,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/reset/done");
    }

    #[tokio::test]
    async fn posting_through_an_invalid_link_is_rejected() {
        let ada = user("ada@example.com");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[ada.clone()]])
            .into_connection();
        let app = app(db, config());

        let response = send(
            &app,
            form_post(
                &format!("/reset/{}/1-deadbeef", encode_uid(ada.id)),
                "new_password1=Quiet-Harbor-71&new_password2=Quiet-Harbor-71",
                false,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("Password reset unsuccessful"));
    }
}
