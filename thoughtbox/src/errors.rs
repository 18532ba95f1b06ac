use std::sync::{Arc, OnceLock};

use crate::{config, crypto::CryptoError, error_responses};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use schemars::{
    schema::{Schema, SchemaObject, SubschemaValidation},
    schema_for, JsonSchema,
};
use serde::Serialize;
use serde_json::Value;

pub use response::{ErrorResponse, ErrorResponseDocs};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),
    #[error("conflict")]
    Conflict(String),

    // auth
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,

    // validation
    #[error("validation")]
    Validation(String),
    #[error("validation")]
    JsonValidation(#[from] JsonRejection),
    #[error("validation")]
    QueryValidation(#[from] QueryRejection),
    #[error("validation")]
    PathValidation(#[from] PathRejection),

    #[error(transparent)]
    DB(crate::db::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("configuration: {0}")]
    Config(String),

    // other
    #[error(transparent)]
    /// An application-specific error.
    App(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("unexpected")]
    Unexpected(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<crate::db::Error> for Error {
    fn from(error: crate::db::Error) -> Self {
        match error {
            crate::db::Error::NotFound(msg) => Self::NotFound(msg),
            crate::db::Error::Conflict(msg) => Self::Conflict(msg),
            error => Self::DB(error),
        }
    }
}

impl From<envy::Error> for Error {
    fn from(error: envy::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::App(error.into())
    }
}

// Response

error_responses! {
    not_found: 404,
    conflict: 409,
    validation: 400,
    path_validation: 400,
    query_validation: 400,
    json_validation: 400,
    unauthorized: 401,
    forbidden: 403,
    unexpected: 500
}

/// Distinct HTTP statuses an [`Error`] can render as, ascending.
pub fn error_statuses() -> Vec<u16> {
    let mut statuses = errors().all().iter().map(|response| response.status).collect::<Vec<_>>();
    statuses.sort_unstable();
    statuses.dedup();
    statuses
}

/// Internal details are only exposed in development.
fn internal_message(error: &dyn std::fmt::Display) -> String {
    if config().is_development() {
        error.to_string()
    } else {
        "Internal server error".into()
    }
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let errors = errors();
        match error {
            Error::NotFound(message) => errors.not_found.with_message(message),
            Error::Conflict(message) => errors.conflict.with_message(message),
            Error::Unauthorized => errors.unauthorized.with_message("Unauthorized"),
            Error::Forbidden => errors.forbidden.with_message("Forbidden"),
            Error::Validation(message) => errors.validation.with_message(message),
            Error::JsonValidation(error) => errors.json_validation.with_message(error.body_text()),
            Error::QueryValidation(error) => errors.query_validation.with_message(error.body_text()),
            Error::PathValidation(error) => errors.path_validation.with_message(error.body_text()),
            Error::DB(error) => errors.unexpected.with_message(internal_message(error)),
            Error::Crypto(error) => errors.unexpected.with_message(internal_message(error)),
            Error::App(error) => errors.unexpected.with_message(internal_message(error)),
            Error::Unexpected(message) => errors.unexpected.with_message(internal_message(message)),
            Error::Config(message) => errors.unexpected.with_message(internal_message(message)),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let error = Arc::new(self);

        let error_res = ErrorResponse::from(error.clone().as_ref());
        let status = error_res.status;

        let mut res = axum::Json(error_res).into_response();
        res.extensions_mut().insert(error);

        *res.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        res
    }
}

pub async fn on_error(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let error = response.extensions().get::<Arc<Error>>().map(Arc::as_ref);
    match error {
        Some(error) if response.status().is_server_error() => tracing::error!("{:?}", error),
        Some(error) => tracing::debug!("{:?}", error),
        None => {}
    }

    response
}

mod response {
    use serde_json::Map;

    use super::*;

    #[derive(Debug, Serialize, Clone, Default, JsonSchema)]
    pub struct ErrorResponse {
        pub error: String,
        pub message: Option<String>,
        pub status: u16,
        pub details: Option<Map<String, Value>>,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>, status: u16) -> Self {
            Self {
                error: error.into(),
                status,
                ..Default::default()
            }
        }

        pub fn with_message(&self, message: impl Into<String>) -> Self {
            let mut res = self.clone();
            res.message = Some(message.into());
            res
        }
    }

    pub struct ErrorResponseDocs;

    impl JsonSchema for ErrorResponseDocs {
        fn schema_name() -> String {
            String::from("ErrorResponse")
        }

        fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> Schema {
            let error_schemas = errors()
                .all()
                .into_iter()
                .map(|response| {
                    let mut schema = schema_for!(ErrorResponse).schema;
                    let obj = schema.object();
                    if let Some(Schema::Object(status)) = obj.properties.get_mut("status") {
                        status.enum_values = Some(vec![Value::from(response.status)]);
                    }
                    if let Some(Schema::Object(error)) = obj.properties.get_mut("error") {
                        error.enum_values = Some(vec![Value::from(response.error.clone())]);
                    }

                    Schema::from(schema)
                })
                .collect::<Vec<_>>();

            let schema = SchemaObject {
                subschemas: Some(Box::new(SubschemaValidation {
                    one_of: Some(error_schemas),
                    ..Default::default()
                })),
                ..Default::default()
            };

            schema.into()
        }
    }

    /// Typed responses with a custom JSON schema
    /// ```rust,ignore
    /// error_responses! {
    ///     not_found: 404,
    ///     unexpected: 500
    /// }
    ///
    /// impl From<&Error> for ErrorResponse {
    ///     fn from(error: &Error) -> Self {
    ///     let errors = errors(); // <- from macro
    ///     match error {
    ///         Error::NotFound(message) => errors.not_found.with_message(message),
    ///         Error::Unexpected(message) => errors.unexpected.with_message(message),
    ///     }
    /// }
    /// ```
    #[macro_export]
    macro_rules! error_responses {
        (
            $($name:ident: $code:expr),* $(,)?
        ) => {
            #[derive(Debug, Clone, Serialize)]
            struct Responses {
                $(
                    $name: ErrorResponse,
                )*
            }

            impl Responses {
                fn all(&self) -> Vec<&ErrorResponse> {
                    vec![$(&self.$name,)*]
                }
            }

            static ERRORS: OnceLock<Responses> = OnceLock::new();

            fn errors() -> &'static Responses {
                ERRORS.get_or_init(|| Responses {
                    $(
                        $name: ErrorResponse::new(stringify!($name), $code),
                    )*
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let cases = [
            (Error::NotFound("x".into()), 404),
            (Error::Conflict("x".into()), 409),
            (Error::validation("x"), 400),
            (Error::Unauthorized, 401),
            (Error::Forbidden, 403),
            (Error::Unexpected("x".into()), 500),
        ];

        for (error, status) in cases {
            assert_eq!(ErrorResponse::from(&error).status, status);
            assert_eq!(error.into_response().status().as_u16(), status);
        }
    }

    #[test]
    fn db_errors_keep_their_kind() {
        assert!(matches!(
            Error::from(crate::db::Error::Conflict("dup".into())),
            Error::Conflict(message) if message == "dup"
        ));
        assert!(matches!(
            Error::from(crate::db::Error::NotFound("gone".into())),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn documented_statuses() {
        assert_eq!(error_statuses(), [400, 401, 403, 404, 409, 500]);
    }
}
