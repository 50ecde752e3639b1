//! Food photo detection client
//!
//! Posts image bytes to an external detection service and turns its answer
//! into detected food names plus component counts.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::nutrition::ComponentMultipliers;

/// Detection client errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Detection request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Detection service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid detection response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw service response
#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    foods: Vec<Value>,
    /// Either an array of `{name: count}` objects or one flat object
    #[serde(default)]
    components: Value,
}

/// What the service saw in a photo
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub food_names: Vec<String>,
    pub multipliers: ComponentMultipliers,
}

impl Detection {
    /// Parse a service response body
    pub fn from_json(body: &str) -> Result<Self, DetectionError> {
        let response: DetectionResponse = serde_json::from_str(body)?;

        // Entries are plain names or objects with a "name" field
        let mut food_names: Vec<String> = Vec::new();
        for entry in &response.foods {
            let name = match entry {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("name").and_then(Value::as_str),
                _ => None,
            };
            if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
                if !food_names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    food_names.push(name.to_string());
                }
            }
        }

        Ok(Self {
            food_names,
            multipliers: ComponentMultipliers::from_value(&response.components),
        })
    }
}

/// HTTP client for the detection service
#[derive(Clone)]
pub struct DetectionClient {
    http: Client,
    endpoint: String,
}

impl DetectionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DetectionError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Send an image file and parse the detection result
    pub async fn detect(&self, image_path: &Path) -> Result<Detection, DetectionError> {
        let bytes = tokio::fs::read(image_path).await?;
        debug!(path = %image_path.display(), bytes = bytes.len(), "Sending image for detection");

        let resp = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DetectionError::Status { status, body });
        }

        let body = resp.text().await?;
        let detection = Detection::from_json(&body)?;

        info!(
            foods = detection.food_names.len(),
            components = detection.multipliers.len(),
            "Photo detection complete"
        );

        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component_passes() {
        let detection = Detection::from_json(
            r#"{"foods": ["Fried Rice"], "components": [{"egg": 1}, {"Egg": 1, "shrimp": 3}]}"#,
        )
        .unwrap();
        assert_eq!(detection.food_names, vec!["Fried Rice"]);
        assert_eq!(detection.multipliers.count("egg"), 2.0);
        assert_eq!(detection.multipliers.count("shrimp"), 3.0);
    }

    #[test]
    fn test_parse_flat_components_and_named_foods() {
        let detection = Detection::from_json(
            r#"{"foods": [{"name": "Pad Thai", "confidence": 0.9}, "pad thai", " "], "components": {"egg": "2"}}"#,
        )
        .unwrap();
        assert_eq!(detection.food_names, vec!["Pad Thai"]);
        assert_eq!(detection.multipliers.factor("egg"), 2.0);
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let detection = Detection::from_json("{}").unwrap();
        assert!(detection.food_names.is_empty());
        assert!(detection.multipliers.is_empty());
    }

    #[test]
    fn test_invalid_body_is_an_error() {
        assert!(matches!(
            Detection::from_json("not json"),
            Err(DetectionError::Json(_))
        ));
    }

    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}/detect", addr)
    }

    async fn write_image(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("nutrilog-{}-{}.jpg", std::process::id(), name));
        tokio::fs::write(&path, b"fake").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_detect_posts_image_bytes() {
        // Reports one egg per byte received
        let app = axum::Router::new().route(
            "/detect",
            axum::routing::post(|body: axum::body::Bytes| async move {
                format!(r#"{{"foods": ["Fried Rice"], "components": {{"egg": {}}}}}"#, body.len())
            }),
        );
        let client = DetectionClient::new(serve(app).await, Duration::from_secs(5)).unwrap();
        let image = write_image("ok").await;

        let detection = client.detect(&image).await.unwrap();
        let _ = tokio::fs::remove_file(&image).await;

        assert_eq!(detection.food_names, vec!["Fried Rice"]);
        assert_eq!(detection.multipliers.count("egg"), 4.0);
    }

    #[tokio::test]
    async fn test_detect_reports_error_status() {
        let app = axum::Router::new().route(
            "/detect",
            axum::routing::post(|| async {
                (axum::http::StatusCode::SERVICE_UNAVAILABLE, "model loading")
            }),
        );
        let client = DetectionClient::new(serve(app).await, Duration::from_secs(5)).unwrap();
        let image = write_image("unavailable").await;

        let result = client.detect(&image).await;
        let _ = tokio::fs::remove_file(&image).await;

        match result {
            Err(DetectionError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model loading");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_image_is_io_error() {
        let client = DetectionClient::new("http://127.0.0.1:9/detect", Duration::from_secs(1)).unwrap();
        let result = client.detect(Path::new("/nonexistent/photo.jpg")).await;
        assert!(matches!(result, Err(DetectionError::Io(_))));
    }
}
