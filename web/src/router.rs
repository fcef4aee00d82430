use crate::{middleware::auth::require_auth, AppState};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::controller::{
    health_check_controller, home_controller, oauth_controller, password_reset_controller,
    profile_controller, registration_controller, user_session_controller,
};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Social App"
        ),
        paths(
            health_check_controller::health_check,
            home_controller::index,
            oauth_controller::authorize,
            oauth_controller::callback,
            password_reset_controller::new,
            password_reset_controller::create,
            password_reset_controller::done,
            password_reset_controller::edit,
            password_reset_controller::update,
            password_reset_controller::complete,
            profile_controller::show_own,
            profile_controller::show,
            profile_controller::edit,
            profile_controller::update,
            registration_controller::new,
            registration_controller::create,
            user_session_controller::login_page,
            user_session_controller::login,
            user_session_controller::logout,
        ),
        components(
            schemas(
                domain::profiles::Model,
                domain::users::Model,
                domain::user::Credentials,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "social_app", description = "Accounts, sign-in and profiles")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our cookie session based authentication requirement for the
// login-required pages in OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "id",
                    "Session id value returned from successful login via Set-Cookie header",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(home_routes(app_state.clone()))
        .merge(oauth_routes(app_state.clone()))
        .merge(password_reset_routes(app_state.clone()))
        .merge(profile_routes(app_state.clone()))
        .merge(registration_routes(app_state.clone()))
        .merge(user_session_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .merge(static_routes())
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn home_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(home_controller::index))
        .route("/home", get(home_controller::index))
        .with_state(app_state)
}

fn oauth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/login/google", get(oauth_controller::authorize))
        .route("/oauth2callback", get(oauth_controller::callback))
        .with_state(app_state)
}

fn password_reset_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/password_reset",
            get(password_reset_controller::new).post(password_reset_controller::create),
        )
        .route("/password_reset/done", get(password_reset_controller::done))
        .route(
            "/reset/:uidb64/:token",
            get(password_reset_controller::edit).post(password_reset_controller::update),
        )
        .route("/reset/done", get(password_reset_controller::complete))
        .with_state(app_state)
}

fn profile_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/profile", get(profile_controller::show_own))
        .route(
            "/profile/update",
            get(profile_controller::edit).post(profile_controller::update),
        )
        .route("/profile/:id", get(profile_controller::show))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

fn registration_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/register",
            get(registration_controller::new).post(registration_controller::create),
        )
        .with_state(app_state)
}

fn user_session_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/login",
            get(user_session_controller::login_page).post(user_session_controller::login),
        )
        .route(
            "/logout",
            get(user_session_controller::logout).post(user_session_controller::logout),
        )
        .with_state(app_state)
}

// Serves the client-side scripts under /static from the crate's static directory.
fn static_routes() -> Router {
    Router::new().nest_service(
        "/static",
        ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_page() {
        let doc = ApiDoc::openapi();

        for path in [
            "/login",
            "/logout",
            "/register",
            "/password_reset",
            "/reset/{uidb64}/{token}",
            "/oauth2callback",
            "/profile/{id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn form_posts_document_an_urlencoded_body() {
        let doc = ApiDoc::openapi();

        for path in [
            "/login",
            "/register",
            "/password_reset",
            "/reset/{uidb64}/{token}",
            "/profile/update",
        ] {
            let body = doc.paths.paths[path]
                .post
                .as_ref()
                .and_then(|operation| operation.request_body.as_ref())
                .unwrap_or_else(|| panic!("no request body for {path}"));
            assert!(
                body.content
                    .contains_key("application/x-www-form-urlencoded"),
                "{path} does not take a form body"
            );
        }
    }
}
