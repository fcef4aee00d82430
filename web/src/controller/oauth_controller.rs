//! Controller for signing in with Google.
//!
//! Both endpoints are reached through browser redirects, so they never see an
//! htmx request and always answer with plain redirects.

use crate::error::{Error as WebError, Result as WebResult};
use crate::params::oauth::CallbackParams;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use domain::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
use domain::oauth as OAuthApi;
use domain::user::AuthSession;
use log::*;

const LOGIN_REJECTED: &str = "/login?error=oauth";

/// GET /login/google
///
/// Sends the browser to Google's consent screen.
#[utoipa::path(
    get,
    path = "/login/google",
    responses(
        (status = 307, description = "Redirect to Google OAuth"),
        (status = 303, description = "Google sign-in is not configured, redirects back to the login page"),
    )
)]
pub async fn authorize(State(app_state): State<AppState>) -> Response {
    match OAuthApi::google_authorization_url(app_state.config()) {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(err) => {
            error!("Cannot start Google sign-in: {err:?}");
            Redirect::to(LOGIN_REJECTED).into_response()
        }
    }
}

/// GET /oauth2callback
///
/// Completes a Google sign-in: exchanges the code, resolves or creates the
/// account and starts a session.
#[utoipa::path(
    get,
    path = "/oauth2callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Signed in, redirects to /; on failure redirects to /login?error=oauth"),
    )
)]
pub async fn callback(
    State(app_state): State<AppState>,
    mut auth_session: AuthSession,
    Query(params): Query<CallbackParams>,
) -> WebResult<Response> {
    if let Some(error) = params.error.as_deref() {
        info!("Google sign-in was not granted: {error}");
        return Ok(Redirect::to(LOGIN_REJECTED).into_response());
    }

    let Some(code) = params.code.as_deref().filter(|code| !code.is_empty()) else {
        warn!("Google redirected back without an authorization code");
        return Ok(Redirect::to(LOGIN_REJECTED).into_response());
    };

    let sign_in = match OAuthApi::sign_in_with_google(
        app_state.db_conn_ref(),
        app_state.config(),
        code,
    )
    .await
    {
        Ok(sign_in) => sign_in,
        Err(err) => match err.error_kind {
            DomainErrorKind::External(_)
            | DomainErrorKind::Internal(InternalErrorKind::Config)
            | DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Unauthenticated,
            )) => {
                warn!("Google sign-in rejected: {err:?}");
                return Ok(Redirect::to(LOGIN_REJECTED).into_response());
            }
            _ => return Err(err.into()),
        },
    };

    auth_session.login(&sign_in.user).await.map_err(|login_error| {
        warn!("Session login failed: {login_error:?}");
        WebError::internal("Session login failed", login_error)
    })?;

    info!(
        "User {} signed in with Google{}",
        sign_in.user.id,
        if sign_in.created { " for the first time" } else { "" }
    );

    Ok(Redirect::to("/").into_response())
}
