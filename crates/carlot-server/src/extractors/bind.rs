//! JSON body extractor that answers binding failures with a plain 400

use axum::{
    async_trait,
    body::HttpBody,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::error;

/// Like [`Json`], but every rejection becomes `400 Bind: <reason>`
///
/// A body known to be empty binds nothing and yields `T::default()`.
pub struct Bind<T>(pub T);

/// Binding error response
#[derive(Debug)]
pub struct BindError {
    pub message: String,
}

impl IntoResponse for BindError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, format!("Bind: {}", self.message)).into_response()
    }
}

impl From<JsonRejection> for BindError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            message: rejection.body_text(),
        }
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for Bind<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = BindError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.body().size_hint().exact() == Some(0) {
            return Ok(Bind(T::default()));
        }

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Bind(value)),
            Err(rejection) => {
                let err = BindError::from(rejection);
                error!("Bind: {}", err.message);
                Err(err)
            }
        }
    }
}
