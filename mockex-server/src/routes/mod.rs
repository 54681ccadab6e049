use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use mockex_exchange::proxy::{UpstreamError, UpstreamReply};
use std::collections::BTreeMap;
use tracing::error;

pub mod bittrex;
pub mod pages;
pub mod poloniex;

/// Replay an upstream public-endpoint reply verbatim: status and JSON body.
pub(crate) fn passthrough(reply: Result<UpstreamReply, UpstreamError>) -> Response {
    match reply {
        Ok(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                reply.body,
            )
                .into_response()
        }
        Err(error) => {
            error!(%error, "upstream proxy failure");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn param<'a>(params: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str)
}

/// Parameters as logged next to a business error, with the credential redacted.
pub(crate) fn sanitized(params: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut params = params.clone();
    if let Some(api_key) = params.get_mut("apikey") {
        *api_key = "<redacted>".to_owned();
    }
    params
}
