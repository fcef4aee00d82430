pub(crate) mod health_check_controller;
pub(crate) mod home_controller;
pub(crate) mod oauth_controller;
pub(crate) mod password_reset_controller;
pub(crate) mod profile_controller;
pub(crate) mod registration_controller;
pub(crate) mod user_session_controller;
