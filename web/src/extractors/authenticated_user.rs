use crate::middleware::auth::redirect_to_login;
use crate::response::RequestMode;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use axum_login::AuthSession;
use domain::users;
use log::*;
use tower_sessions::Session;

/// The signed-in user of a login-required page.
pub(crate) struct AuthenticatedUser(pub users::Model);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    // Wraps axum-login's AuthSession. Anonymous requests are redirected to the
    // login page. Every successful extraction touches the session so that an
    // active user's inactivity expiry keeps moving forward.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session: domain::user::AuthSession = AuthSession::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()).into_response())?;

        if let Ok(tower_session) = Session::from_request_parts(parts, state).await {
            if let Err(e) = tower_session.save().await {
                warn!("Failed to touch session for activity renewal: {:?}", e);
            } else {
                trace!("Session touched successfully for activity renewal");
            }
        }

        match session.user {
            Some(user) => Ok(AuthenticatedUser(user)),
            None => {
                let mode = RequestMode::from_headers(&parts.headers);
                let path_and_query = parts
                    .uri
                    .path_and_query()
                    .map(|path| path.as_str())
                    .unwrap_or("/");
                Err(redirect_to_login(mode, path_and_query))
            }
        }
    }
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::test_support::get;
    use axum::{http::header::LOCATION, routing::get as get_route, Router};
    use axum_login::{
        tower_sessions::{Expiry, MemoryStore, SessionManagerLayer},
        AuthManagerLayerBuilder,
    };
    use domain::user::Backend;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;
    use time::Duration;
    use tower::ServiceExt;

    async fn whoami(AuthenticatedUser(user): AuthenticatedUser) -> String {
        user.email
    }

    #[tokio::test]
    async fn anonymous_extraction_redirects_with_next() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let session_layer = SessionManagerLayer::new(MemoryStore::default())
            .with_secure(false)
            .with_expiry(Expiry::OnInactivity(Duration::days(1)));
        let auth_layer = AuthManagerLayerBuilder::new(Backend::new(&db), session_layer).build();
        let app = Router::new()
            .route("/whoami", get_route(whoami))
            .layer(auth_layer);

        let response = app.oneshot(get("/whoami")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login?next=%2Fwhoami");
    }
}
