//! Typed inputs for endpoints whose query strings or bodies don't map onto a
//! single domain form.
//!
//! Form bodies that do map onto one domain form (`LoginForm`,
//! `PasswordResetForm`, `SetPasswordForm`, `ProfileUpdateForm`) are
//! extracted as that form directly.

pub(crate) mod oauth;
pub(crate) mod registration;
pub(crate) mod user_session;
