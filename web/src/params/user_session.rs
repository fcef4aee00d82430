use serde::Deserialize;
use utoipa::IntoParams;

/// Query string of `GET /login`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct LoginPageParams {
    /// Local path to return to after signing in.
    pub next: Option<String>,
    /// Set to `oauth` when a Google sign-in was rejected.
    pub error: Option<String>,
}
