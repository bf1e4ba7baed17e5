// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! JSON-over-HTTPS helpers shared by the REST-based providers (GCE, Scaleway).

use crate::errors::ControllerError;
use crate::http_errors::{classify_status, classify_transport};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Append path segments to a base endpoint, tolerating a trailing slash on the base.
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> Result<Url, ControllerError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ControllerError::Terminal(format!("endpoint {base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse a configured endpoint.
pub(crate) fn parse_endpoint(endpoint: &str) -> anyhow::Result<Url> {
    Url::parse(endpoint).map_err(|e| anyhow::anyhow!("invalid endpoint '{endpoint}': {e}"))
}

/// Send `request` and decode a JSON body, classifying every failure.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    operation: &str,
) -> Result<T, ControllerError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(operation, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(operation, status = %status, body = %body, "cloud API request failed");
        return Err(classify_status(status, operation, &body));
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_transport(operation, &e))?;
    debug!(operation, status = %status, response_len = body.len(), "cloud API request successful");

    serde_json::from_str(&body).map_err(|e| {
        ControllerError::Ambiguous(format!("{operation} returned an unexpected body: {e}"))
    })
}
