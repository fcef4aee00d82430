use crate::error::Result as WebResult;
use crate::params::registration::RegisterParams;
use crate::response::{Outcome, RequestMode};
use crate::templates::page_context;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Response, Form};
use domain::form::FieldErrors;
use domain::registration as RegistrationApi;
use log::*;
use serde_json::json;
use tera::Context;

const REGISTER_PAGE: &str = "users/register.html";
const REGISTER_FORM: &str = "users/_register_form.html";

fn register_context(app_state: &AppState, params: &RegisterParams, errors: &FieldErrors) -> Context {
    let mut context = page_context(app_state.config(), None);
    context.insert("account", &json!({ "email": params.account.email }));
    context.insert("profile", &params.profile);
    context.insert("errors", errors);
    context
}

/// GET the registration page
#[utoipa::path(
    get,
    path = "/register",
    responses(
        (status = 200, description = "Registration form", body = String, content_type = "text/html"),
    )
)]
pub async fn new(State(app_state): State<AppState>, mode: RequestMode) -> WebResult<Response> {
    let context = register_context(&app_state, &RegisterParams::default(), &FieldErrors::new());
    mode.respond(app_state.templates(), Outcome::page(REGISTER_PAGE, context))
}

/// CREATE a new account together with its profile
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterParams, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Account and profile created", body = String, content_type = "text/html"),
        (status = 400, description = "Invalid fields or an already registered email"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    mode: RequestMode,
    Form(params): Form<RegisterParams>,
) -> WebResult<Response> {
    let outcome =
        match RegistrationApi::register(app_state.db_conn_ref(), &params.account, &params.profile)
            .await?
        {
            Ok((user, _profile)) => {
                let mut context = page_context(app_state.config(), None);
                context.insert("email", &user.email);
                Outcome::Page {
                    status: StatusCode::CREATED,
                    template: "users/register_success.html",
                    context,
                }
            }
            Err(errors) => {
                debug!("Registration rejected: {errors:?}");
                Outcome::Invalid {
                    page: REGISTER_PAGE,
                    fragment: REGISTER_FORM,
                    context: register_context(&app_state, &params, &errors),
                }
            }
        };

    mode.respond(app_state.templates(), outcome)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use crate::test_support::*;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use chrono::{NaiveDate, Utc};
    use domain::{profiles, sex::Sex, Id};
    use sea_orm::{DatabaseBackend, MockDatabase};

    const VALID_BODY: &str = "email=grace%40example.com&password1=Tidal-Compass-88&password2=Tidal-Compass-88\
        &first_name=Grace&last_name=Hopper&sex=Female&birthdate=1906-12-09";

    #[tokio::test]
    async fn registration_page_renders_both_forms() {
        let app = app(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            config(),
        );

        let response = send(&app, get("/register")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(r#"name="password2""#));
        assert!(body.contains(r#"name="birthdate""#));
    }

    #[tokio::test]
    async fn valid_registration_is_created() {
        let grace = user("grace@example.com");
        let profile = profiles::Model {
            id: Id::new_v4(),
            user_id: grace.id,
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            sex: Sex::Female,
            bio: String::new(),
            birthdate: NaiveDate::from_ymd_opt(1906, 12, 9),
            avatar: None,
            cover_image: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // email is not registered yet
            .append_query_results([Vec::<domain::users::Model>::new()])
            .append_query_results([[grace]])
            .append_query_results([[profile]])
            .into_connection();
        let app = app(db, config());

        let response = send(&app, form_post("/register", VALID_BODY, false)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_text(response).await.contains("grace@example.com"));
    }

    #[tokio::test]
    async fn invalid_htmx_registration_returns_every_field_error() {
        let app = app(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            config(),
        );

        let response = send(
            &app,
            form_post(
                "/register",
                "email=grace%40example.com&password1=12345678&password2=12345679&first_name=Grace",
                true,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        let html = body["html"].as_str().unwrap();
        assert!(html.contains("The two password fields didn"));
        assert!(html.contains("This field is required."));
        assert!(html.contains(r#"value="Grace""#));
        assert!(!html.contains("12345678"));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_field_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user("grace@example.com")]])
            .into_connection();
        let app = app(db, config());

        let response = send(&app, form_post("/register", VALID_BODY, false)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("User with this Email already exists."));
    }
}
