//! HTTP surface: `GET /` serves the page, `POST /weather` runs the aggregation.

use std::{convert::Infallible, sync::Arc};

use futures_util::{Stream, TryStreamExt, pin_mut};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use warp::{
    Filter, Rejection, Reply,
    http::StatusCode,
    hyper::body::{Buf, Bytes},
    reject::Reject,
    reply::Response,
};
use weather_core::WeatherAggregator;

const INDEX_HTML: &str = include_str!("../static/index.html");

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Debug)]
struct BodyTooLarge;

impl Reject for BodyTooLarge {}

#[derive(Debug)]
struct BodyUnreadable;

impl Reject for BodyUnreadable {}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub fn routes(
    aggregator: Arc<WeatherAggregator>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let weather = warp::path("weather")
        .and(warp::path::end())
        .and(warp::post())
        .and(limited_body())
        .and(warp::any().map(move || aggregator.clone()))
        .then(handle_weather);

    index
        .or(weather)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

/// Request body capped at [`MAX_BODY_BYTES`]. The cap is enforced while
/// reading, so chunked requests without `Content-Length` are accepted too.
fn limited_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::stream().and_then(collect_body)
}

async fn collect_body<S, B>(stream: S) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    pin_mut!(stream);
    let mut body = Vec::new();

    while let Some(mut chunk) = stream
        .try_next()
        .await
        .map_err(|_| warp::reject::custom(BodyUnreadable))?
    {
        if body.len() + chunk.remaining() > MAX_BODY_BYTES {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        let part = chunk.copy_to_bytes(chunk.remaining());
        body.extend_from_slice(&part);
    }

    Ok(Bytes::from(body))
}

async fn handle_weather(body: Bytes, aggregator: Arc<WeatherAggregator>) -> Response {
    let city = city_from_body(&body);

    match aggregator.aggregate(&city).await {
        Ok(result) => {
            info!(city = %result.current.name, days = result.forecast.len(), "weather served");
            warp::reply::json(&result).into_response()
        }
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_reply(&err.to_string(), status)
        }
    }
}

/// Pull `city` out of the request body. Anything that is not a JSON object
/// with a string `city` yields an empty name, which validation rejects.
fn city_from_body(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("city").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

fn error_reply(message: &str, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<BodyTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<BodyUnreadable>().is_some() {
        (StatusCode::BAD_REQUEST, "Could not read request body")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error")
    };

    Ok(error_reply(message, status))
}
