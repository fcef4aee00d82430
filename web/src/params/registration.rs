use domain::registration::{AccountForm, ProfileForm};
use serde::Deserialize;
use utoipa::ToSchema;

/// The registration page posts both sub-forms as one body.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterParams {
    #[serde(flatten)]
    pub account: AccountForm,
    #[serde(flatten)]
    pub profile: ProfileForm,
}
