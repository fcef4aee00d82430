use crate::error::Result as WebResult;
use crate::response::{Outcome, RequestMode};
use crate::templates::page_context;
use crate::AppState;
use axum::extract::State;
use axum::response::Response;
use domain::profile as ProfileApi;
use domain::user::AuthSession;
use log::*;

/// GET the landing page
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page", body = String, content_type = "text/html"),
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    mode: RequestMode,
    auth_session: AuthSession,
) -> WebResult<Response> {
    let user = auth_session.user;
    let mut context = page_context(app_state.config(), user.as_ref());

    if let Some(user) = &user {
        let display_name =
            match ProfileApi::find_by_user_id(app_state.db_conn_ref(), user.id).await {
                Ok(profile) => profile.full_name(),
                Err(err) if err.is_not_found() => {
                    warn!("User {} has no profile", user.id);
                    user.email.clone()
                }
                Err(err) => return Err(err.into()),
            };
        context.insert("display_name", display_name.trim());
    }

    mode.respond(app_state.templates(), Outcome::page("home.html", context))
}
