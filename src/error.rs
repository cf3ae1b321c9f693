use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures a statistics call can surface. Empty data is never an error
/// (every metric has a defined zero/empty result); only a store failure
/// or a virtual-host URL that cannot be parsed reaches the caller.
#[derive(Debug)]
pub enum StatsError {
    Sql(sqlx::Error),
    MalformedUrl(String),
}

impl From<sqlx::Error> for StatsError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sql(e)
    }
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(e) => write!(f, "SQL Error: {e}"),
            Self::MalformedUrl(url) => write!(f, "Malformed virtual-host URL: {url}"),
        }
    }
}

impl std::error::Error for StatsError {}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Sql(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, self.to_string()).into_response()
    }
}
