use crate::error::{Error as WebError, Result as WebResult};
use crate::params::user_session::LoginPageParams;
use crate::response::{Outcome, RequestMode};
use crate::templates::page_context;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::Response,
    Form,
};
use domain::form::{FieldErrors, Validate};
use domain::user::{AuthSession, LoginForm, INVALID_LOGIN_FORM, WRONG_CREDENTIALS};
use log::*;
use serde_json::json;
use tera::Context;

const LOGIN_PAGE: &str = "users/login.html";
const LOGIN_FORM: &str = "users/_login_form.html";

pub(crate) const OAUTH_FAILED: &str = "Google sign-in failed. Please try again.";

fn login_context(
    app_state: &AppState,
    form: &LoginForm,
    errors: &FieldErrors,
    error: Option<&str>,
) -> Context {
    let mut context = page_context(app_state.config(), None);
    // The password is never echoed back.
    context.insert("form", &json!({ "email": form.email, "next": form.next }));
    context.insert("errors", errors);
    context.insert("error", &error);
    context
}

/// GET the login page
#[utoipa::path(
    get,
    path = "/login",
    params(LoginPageParams),
    responses(
        (status = 200, description = "Login form", body = String, content_type = "text/html"),
    )
)]
pub async fn login_page(
    State(app_state): State<AppState>,
    mode: RequestMode,
    Query(params): Query<LoginPageParams>,
) -> WebResult<Response> {
    let form = LoginForm {
        next: params
            .next
            .as_deref()
            .and_then(domain::user::local_redirect)
            .map(str::to_string),
        ..Default::default()
    };
    let error = params.error.as_deref().map(|_| OAUTH_FAILED);

    mode.respond(
        app_state.templates(),
        Outcome::page(
            LOGIN_PAGE,
            login_context(&app_state, &form, &FieldErrors::new(), error),
        ),
    )
}

/// Logs the user in and redirects to `next` or the home page.
///
/// Successful login sets a session cookie, e.g.:
/// set-cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df; HttpOnly; SameSite=Lax; Path=/; Max-Age=86399
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = domain::user::Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, redirects to the requested page"),
        (status = 200, description = "Logged in from an htmx request, see the HX-Redirect header"),
        (status = 400, description = "Malformed form or wrong email or password"),
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    mode: RequestMode,
    mut auth_session: AuthSession,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    let templates = app_state.templates();
    let rejected = |errors: FieldErrors, message: &str| Outcome::Invalid {
        page: LOGIN_PAGE,
        fragment: LOGIN_FORM,
        context: login_context(&app_state, &form, &errors, Some(message)),
    };

    let creds = match form.validate() {
        Ok(creds) => creds,
        Err(errors) => {
            debug!("Login form rejected: {errors:?}");
            return mode.respond(templates, rejected(errors, INVALID_LOGIN_FORM));
        }
    };

    let user = match auth_session.authenticate(creds.clone()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Authentication failed for {}", creds.email);
            return mode.respond(templates, rejected(FieldErrors::new(), WRONG_CREDENTIALS));
        }
        Err(auth_error) => {
            error!("Authentication failed with error: {auth_error:?}");
            return Err(WebError::internal("Authentication failed", auth_error));
        }
    };

    auth_session.login(&user).await.map_err(|login_error| {
        warn!("Session login failed: {login_error:?}");
        WebError::internal("Session login failed", login_error)
    })?;

    info!("User {} logged in", user.id);

    mode.respond(
        templates,
        Outcome::redirect(creds.next.as_deref().unwrap_or("/")),
    )
}

/// Logs the user out by destroying their session.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Logged out, redirects to the login page"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn logout(mode: RequestMode, mut auth_session: AuthSession) -> WebResult<Response> {
    trace!("UserSessionController::logout()");
    if let Some(user) = auth_session
        .logout()
        .await
        .map_err(|err| WebError::internal("Logout failed", err))?
    {
        info!("User {} logged out", user.id);
    }

    mode.redirect("/login")
}
