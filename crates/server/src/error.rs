use std::convert::Infallible;

use log::{error, warn};
use serde_json::json;
use trading_pit_core::errors::CoreError;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

const INTERNAL_MESSAGE: &str = "Internal server error";

/// A core error carried through warp's rejection path.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl Reject for ApiError {}

pub fn reject(e: CoreError) -> Rejection {
    warp::reject::custom(ApiError(e))
}

/// HTTP status for a core error. Anything not caused by the client is a 500.
pub fn status_for(e: &CoreError) -> StatusCode {
    match e {
        CoreError::ValidationError(_)
        | CoreError::InsufficientFunds { .. }
        | CoreError::InsufficientHoldings { .. } => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::NotFound(_) | CoreError::QuoteUnavailable(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

/// Turn every rejection into a `{"error": ...}` JSON body.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(ApiError(e)) = err.find::<ApiError>() {
        let status = status_for(e);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {e}");
            return Ok(error_reply(status, INTERNAL_MESSAGE));
        }
        return Ok(error_reply(status, &e.to_string()));
    }

    if err.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, "Route not found"));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            &format!("Invalid request body: {e}"),
        ));
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(error_reply(StatusCode::LENGTH_REQUIRED, "Content-Length required"));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"));
    }
    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(error_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON body",
        ));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    warn!("Unhandled rejection: {err:?}");
    Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE))
}
