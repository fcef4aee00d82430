use crate::error::Result as WebResult;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::response::{Outcome, RequestMode};
use crate::templates::page_context;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use domain::form::FieldErrors;
use domain::profile::{self as ProfileApi, ProfileUpdateForm};
use domain::{profiles, users, Id};
use log::*;
use tera::Context;

const UPDATE_PAGE: &str = "profiles/update.html";
const UPDATE_FORM: &str = "profiles/_update_form.html";

fn profile_context(app_state: &AppState, user: &users::Model, profile: &profiles::Model) -> Context {
    let mut context = page_context(app_state.config(), Some(user));
    context.insert("profile", profile);
    context.insert("is_owner", &(profile.user_id == user.id));
    context
}

fn update_context(
    app_state: &AppState,
    user: &users::Model,
    form: &ProfileUpdateForm,
    errors: &FieldErrors,
) -> Context {
    let mut context = page_context(app_state.config(), Some(user));
    context.insert("form", form);
    context.insert("errors", errors);
    context
}

/// GET the signed-in user's profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile page", body = String, content_type = "text/html"),
        (status = 303, description = "Not signed in, redirects to the login page"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn show_own(
    State(app_state): State<AppState>,
    mode: RequestMode,
    AuthenticatedUser(user): AuthenticatedUser,
) -> WebResult<Response> {
    let profile = ProfileApi::find_by_user_id(app_state.db_conn_ref(), user.id).await?;

    mode.respond(
        app_state.templates(),
        Outcome::page(
            "profiles/profile.html",
            profile_context(&app_state, &user, &profile),
        ),
    )
}

/// GET a profile by its id
#[utoipa::path(
    get,
    path = "/profile/{id}",
    params(
        ("id" = String, Path, description = "Profile id (UUID)"),
    ),
    responses(
        (status = 200, description = "Profile page", body = String, content_type = "text/html"),
        (status = 404, description = "No such profile"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn show(
    State(app_state): State<AppState>,
    mode: RequestMode,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Id>,
) -> WebResult<Response> {
    debug!("GET profile by id: {id}");
    let profile = ProfileApi::find_by_id(app_state.db_conn_ref(), id).await?;

    mode.respond(
        app_state.templates(),
        Outcome::page(
            "profiles/profile.html",
            profile_context(&app_state, &user, &profile),
        ),
    )
}

/// GET the form for editing the signed-in user's profile
#[utoipa::path(
    get,
    path = "/profile/update",
    responses(
        (status = 200, description = "Profile edit form", body = String, content_type = "text/html"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn edit(
    State(app_state): State<AppState>,
    mode: RequestMode,
    AuthenticatedUser(user): AuthenticatedUser,
) -> WebResult<Response> {
    let profile = ProfileApi::find_by_user_id(app_state.db_conn_ref(), user.id).await?;
    let form = ProfileUpdateForm::from_model(&profile);

    mode.respond(
        app_state.templates(),
        Outcome::page(
            UPDATE_PAGE,
            update_context(&app_state, &user, &form, &FieldErrors::new()),
        ),
    )
}

/// UPDATE the signed-in user's profile
#[utoipa::path(
    post,
    path = "/profile/update",
    request_body(content = ProfileUpdateForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Profile saved, redirects to /profile"),
        (status = 400, description = "Invalid fields"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    mode: RequestMode,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProfileUpdateForm>,
) -> WebResult<Response> {
    let outcome = match ProfileApi::update(app_state.db_conn_ref(), user.id, &form).await? {
        Ok(profile) => {
            info!("Profile {} updated", profile.id);
            Outcome::redirect("/profile")
        }
        Err(errors) => Outcome::Invalid {
            page: UPDATE_PAGE,
            fragment: UPDATE_FORM,
            context: update_context(&app_state, &user, &form, &errors),
        },
    };

    mode.respond(app_state.templates(), outcome)
}
