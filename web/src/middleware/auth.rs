use crate::response::RequestMode;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_login::AuthSession;
use log::*;

/// Where an anonymous visitor of `path` is sent to sign in first.
pub(crate) fn login_url(path_and_query: &str) -> String {
    format!("/login?next={}", urlencoding::encode(path_and_query))
}

/// Sends anonymous visitors to the login page, remembering the page they asked for.
pub(crate) fn redirect_to_login(mode: RequestMode, path_and_query: &str) -> Response {
    match mode.redirect(&login_url(path_and_query)) {
        Ok(response) => response,
        Err(err) => {
            error!("Failed to build login redirect: {err:?}");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

/// Lets signed-in users through to login-required pages.
pub async fn require_auth(
    auth_session: AuthSession<domain::user::Backend>,
    mode: RequestMode,
    request: Request,
    next: Next,
) -> Response {
    match auth_session.user {
        Some(_user) => next.run(request).await,
        None => {
            let path_and_query = request
                .uri()
                .path_and_query()
                .map(|path| path.as_str())
                .unwrap_or("/");
            debug!("Anonymous request for {path_and_query}, redirecting to login");
            redirect_to_login(mode, path_and_query)
        }
    }
}
