//! Remote embedding service invocation.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{EmbeddingConfig, EmbeddingError};

// Shared HTTP client with connection pooling. Per-request timeouts come from
// the config; these are the transport-level bounds.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(32)
        .build()
        .expect("failed to build HTTP client")
});

/// One round trip to the embedding endpoint for a batch of texts. Returns one
/// vector per input, in order. Dimension checking happens in the caller so a
/// partial-batch mismatch can be reported per index.
pub(crate) async fn request_embeddings(
    texts: &[String],
    cfg: &EmbeddingConfig,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let url = cfg
        .api_url
        .as_deref()
        .ok_or_else(|| EmbeddingError::InvalidConfig("api_url is required for api mode".into()))?;

    let payload = json!({
        "model": cfg.model_id,
        "inputs": texts,
    });

    let mut request = HTTP_CLIENT
        .post(url)
        .timeout(Duration::from_secs(cfg.api_timeout_secs))
        .json(&payload);
    if let Some(auth) = &cfg.api_auth_header {
        request = request.header(reqwest::header::AUTHORIZATION, auth);
    }

    let response = request.send().await.map_err(|err| {
        EmbeddingError::UpstreamUnavailable(format!("request failed: {err}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|err| EmbeddingError::UpstreamUnavailable(format!("invalid response body: {err}")))?;

    let vectors = parse_embeddings(body)?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::UpstreamUnavailable(format!(
            "endpoint returned {} embeddings for {} inputs",
            vectors.len(),
            texts.len()
        )));
    }
    Ok(vectors)
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> EmbeddingError {
    let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
    match status.as_u16() {
        400 | 413 | 422 => EmbeddingError::InputInvalid(detail),
        401 | 403 => EmbeddingError::InvalidConfig(detail),
        _ => EmbeddingError::UpstreamUnavailable(detail),
    }
}

/// Accepts the two common response shapes: a bare array of vectors, or an
/// object wrapping them under `embeddings` / OpenAI-style `data[].embedding`.
fn parse_embeddings(body: Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => {
            if let Some(Value::Array(rows)) = map.remove("embeddings") {
                rows
            } else if let Some(Value::Array(items)) = map.remove("data") {
                items
                    .into_iter()
                    .map(|item| item.get("embedding").cloned().unwrap_or(Value::Null))
                    .collect()
            } else {
                return Err(EmbeddingError::UpstreamUnavailable(
                    "unrecognized embedding response shape".into(),
                ));
            }
        }
        _ => {
            return Err(EmbeddingError::UpstreamUnavailable(
                "unrecognized embedding response shape".into(),
            ))
        }
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Array(values) => values
                .into_iter()
                .map(|v| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        EmbeddingError::UpstreamUnavailable("non-numeric embedding value".into())
                    })
                })
                .collect(),
            _ => Err(EmbeddingError::UpstreamUnavailable(
                "embedding row is not an array".into(),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_shape() {
        let body = json!([[0.1, 0.2], [0.3, 0.4]]);
        let vectors = parse_embeddings(body).unwrap();
        assert_eq!(vectors, vec![vec![0.1f32, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn parses_embeddings_object_shape() {
        let body = json!({ "embeddings": [[1.0, 0.0]] });
        let vectors = parse_embeddings(body).unwrap();
        assert_eq!(vectors, vec![vec![1.0f32, 0.0]]);
    }

    #[test]
    fn parses_data_object_shape() {
        let body = json!({ "data": [ { "embedding": [0.5, 0.5] } ] });
        let vectors = parse_embeddings(body).unwrap();
        assert_eq!(vectors, vec![vec![0.5f32, 0.5]]);
    }

    #[test]
    fn rejects_unknown_shape() {
        assert!(parse_embeddings(json!({"vectors": []})).is_err());
        assert!(parse_embeddings(json!("nope")).is_err());
    }

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            EmbeddingError::InputInvalid(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            EmbeddingError::InvalidConfig(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            EmbeddingError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            EmbeddingError::UpstreamUnavailable(_)
        ));
    }
}
