use serde::Deserialize;
use utoipa::IntoParams;

/// Query string Google appends when redirecting back to `/oauth2callback`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct CallbackParams {
    pub code: Option<String>,
    /// Present instead of `code` when the user denied consent.
    pub error: Option<String>,
}
