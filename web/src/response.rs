//! Chooses between a full page and an htmx partial response.
//!
//! Handlers decide *what* happened and describe it with an [`Outcome`]; the
//! [`RequestMode`] of the request decides *how* it is sent back.

use crate::error::{Error, Result};
use crate::templates::Templates;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::LOCATION, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::convert::Infallible;
use tera::Context;

pub const HX_REQUEST: &str = "hx-request";
pub const HX_REDIRECT: &str = "hx-redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// A regular browser navigation or form post.
    Full,
    /// A request issued by htmx, which swaps fragments into the current page.
    Partial,
}

/// What a handler produced, independent of how it will be sent.
#[derive(Debug)]
pub enum Outcome {
    Redirect(String),
    Page {
        status: StatusCode,
        template: &'static str,
        context: Context,
    },
    /// A rejected form. Full requests get `page` back with 400, partial ones
    /// get `fragment` wrapped as `{"html": ...}` with 400.
    Invalid {
        page: &'static str,
        fragment: &'static str,
        context: Context,
    },
}

impl Outcome {
    pub fn redirect(to: impl Into<String>) -> Self {
        Outcome::Redirect(to.into())
    }

    pub fn page(template: &'static str, context: Context) -> Self {
        Outcome::Page {
            status: StatusCode::OK,
            template,
            context,
        }
    }
}

impl RequestMode {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(HX_REQUEST) {
            Some(value) if !value.is_empty() => RequestMode::Partial,
            _ => RequestMode::Full,
        }
    }

    pub fn is_partial(self) -> bool {
        self == RequestMode::Partial
    }

    pub fn respond(self, templates: &Templates, outcome: Outcome) -> Result<Response> {
        match outcome {
            Outcome::Redirect(to) => self.redirect(&to),
            Outcome::Page {
                status,
                template,
                context,
            } => Ok((status, Html(templates.render(template, &context)?)).into_response()),
            Outcome::Invalid {
                page,
                fragment,
                context,
            } => match self {
                RequestMode::Full => {
                    Ok((StatusCode::BAD_REQUEST, Html(templates.render(page, &context)?))
                        .into_response())
                }
                RequestMode::Partial => {
                    let html = templates.render(fragment, &context)?;
                    Ok((StatusCode::BAD_REQUEST, Json(json!({ "html": html }))).into_response())
                }
            },
        }
    }

    /// htmx follows `HX-Redirect` on a 200; browsers follow a 303 `Location`.
    pub fn redirect(self, to: &str) -> Result<Response> {
        let location = HeaderValue::from_str(to)
            .map_err(|err| Error::internal("Redirect target is not a valid header value", err))?;
        match self {
            RequestMode::Full => Ok((StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()),
            RequestMode::Partial => Ok((StatusCode::OK, [(HX_REDIRECT, location)]).into_response()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMode
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> core::result::Result<Self, Self::Rejection> {
        Ok(RequestMode::from_headers(&parts.headers))
    }
}
