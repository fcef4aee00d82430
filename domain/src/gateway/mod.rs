//! HTTP clients for the third-party services the domain talks to.

pub mod google_oauth;
pub mod mailersend;
