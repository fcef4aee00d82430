use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl Error {
    /// Wraps a failure of the web layer itself, such as a session store error.
    pub fn internal(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self(DomainError {
            source: Some(Box::new(source)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(message.into())),
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => StatusCode::NOT_FOUND,
                    EntityErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                    EntityErrorKind::Conflict => StatusCode::CONFLICT,
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                InternalErrorKind::InvalidToken => StatusCode::BAD_REQUEST,
                InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Network | ExternalErrorKind::Other(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn domain_error(&self) -> &DomainError {
        &self.0
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {status}: {:?}", self.0);
        } else {
            warn!("Request rejected with {status}: {:?}", self.0.error_kind);
        }

        let reason = status.canonical_reason().unwrap_or("ERROR").to_uppercase();
        (status, reason).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
