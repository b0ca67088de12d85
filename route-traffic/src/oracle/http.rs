use crate::oracle::{OracleError, PredictionOracle};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use geo::Point;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

const PREDICT_PATH: &str = "api/predict";

#[derive(Serialize)]
struct PredictRequest {
    latitude: f64,
    longitude: f64,
    timestamp: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    prediction: Option<f64>,
}

impl From<reqwest::Error> for OracleError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            OracleError::Timeout
        } else if value.is_decode() {
            OracleError::InvalidResponse(value.to_string())
        } else {
            OracleError::Transport(value.to_string())
        }
    }
}

/// A prediction oracle reached over HTTP.
///
/// Sends `POST {base_url}/api/predict` with a JSON body of
/// `{"latitude", "longitude", "timestamp"}` (RFC 3339),
/// and expects `{"prediction": <number>}` back.
pub struct HttpOracle {
    client: Client,
    endpoint: Url,
}

impl HttpOracle {
    /// Creates a client for the oracle at `base_url` (ex: `http://localhost:5001`).
    ///
    /// The base may carry a path (ex: `http://host/traffic`); it is treated as a directory,
    /// so requests go to `http://host/traffic/api/predict` with or without a trailing slash.
    ///
    /// `request_timeout` is enforced by the HTTP client itself,
    /// in addition to any bound the caller places on each call.
    ///
    /// # Errors
    ///
    /// Fails if the URL can't be parsed or the HTTP client can't be constructed.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, OracleError> {
        let endpoint = Url::parse(base_url)
            .and_then(|mut base| {
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                base.join(PREDICT_PATH)
            })
            .map_err(|e| OracleError::Configuration(format!("invalid oracle URL {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| OracleError::Configuration(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PredictionOracle for HttpOracle {
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        let body = PredictRequest {
            latitude: point.y(),
            longitude: point.x(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        trace!(lat = body.latitude, lng = body.longitude, "Querying prediction oracle");

        let response = self.client.post(self.endpoint.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let PredictResponse { prediction } = response.json().await?;
        let Some(value) = prediction else {
            return Err(OracleError::InvalidResponse(
                "response has no prediction".to_string(),
            ));
        };
        if !value.is_finite() {
            return Err(OracleError::InvalidResponse(format!(
                "prediction {value} is not a finite number"
            )));
        }

        // The model occasionally overshoots its nominal range.
        Ok(value.clamp(0.0, 100.0))
    }
}
