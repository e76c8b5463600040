use abi::errors::Error;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
};

pub struct JsonExtractor<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonExtractor<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            // convert the errors from `axum::Json` into whatever we want
            Err(rejection) => Err(Error::body_parsing(rejection.body_text())),
        }
    }
}
