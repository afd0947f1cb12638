//! HTTP collaborators on the training backend.

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

use crate::error::ClientError;
use crate::protocol::{
    AlgorithmInfo, EnvironmentInfo, StartResponse, StatusAck, TrainingConfig, TrainingStatus,
};
use crate::settings::BackendConfig;

/// The backend's request surface, behind a seam so tests can substitute a
/// scripted double for the real server.
#[async_trait]
pub trait TrainingApi: Send + Sync {
    /// Ask the backend to create and start a training session.
    async fn start_training(&self, config: &TrainingConfig) -> Result<StartResponse, ClientError>;

    /// Ask the backend to stop a running session.
    async fn stop_training(&self, session_id: &str) -> Result<StatusAck, ClientError>;

    /// Fetch the live status of a session.
    async fn training_status(&self, session_id: &str) -> Result<TrainingStatus, ClientError>;

    /// Delete a session on the backend.
    async fn delete_session(&self, session_id: &str) -> Result<StatusAck, ClientError>;

    /// List the environments the backend can simulate.
    async fn environments(&self) -> Result<Vec<EnvironmentInfo>, ClientError>;

    /// Fetch one environment's catalog entry.
    async fn environment(&self, env_id: &str) -> Result<EnvironmentInfo, ClientError>;

    /// List the algorithms the backend can train with.
    async fn algorithms(&self) -> Result<Vec<AlgorithmInfo>, ClientError>;

    /// Fetch one algorithm's catalog entry.
    async fn algorithm(&self, algorithm_id: &str) -> Result<AlgorithmInfo, ClientError>;
}

/// `reqwest`-backed implementation of [`TrainingApi`].
pub struct HttpTrainingApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrainingApi {
    pub fn new(backend: &BackendConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(backend.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: backend.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Decode a JSON body, turning non-success statuses into typed errors with
/// the backend's detail text preserved.
async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_else(|_| String::new());
        return Err(ClientError::Backend {
            status: status.as_u16(),
            detail,
        });
    }
    Ok(response.json::<T>().await?)
}

#[async_trait]
impl TrainingApi for HttpTrainingApi {
    #[instrument(skip(self, config), fields(environment = %config.environment, algorithm = %config.algorithm))]
    async fn start_training(&self, config: &TrainingConfig) -> Result<StartResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint("training/start"))
            .json(config)
            .send()
            .await?;
        expect_json(response).await
    }

    #[instrument(skip(self))]
    async fn stop_training(&self, session_id: &str) -> Result<StatusAck, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&format!("training/{session_id}/stop")))
            .send()
            .await?;
        expect_json(response).await
    }

    async fn training_status(&self, session_id: &str) -> Result<TrainingStatus, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&format!("training/{session_id}/status")))
            .send()
            .await?;
        expect_json(response).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<StatusAck, ClientError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("training/{session_id}")))
            .send()
            .await?;
        expect_json(response).await
    }

    async fn environments(&self) -> Result<Vec<EnvironmentInfo>, ClientError> {
        let response = self.client.get(self.endpoint("environments")).send().await?;
        expect_json(response).await
    }

    async fn environment(&self, env_id: &str) -> Result<EnvironmentInfo, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&format!("environments/{env_id}")))
            .send()
            .await?;
        expect_json(response).await
    }

    async fn algorithms(&self) -> Result<Vec<AlgorithmInfo>, ClientError> {
        let response = self.client.get(self.endpoint("algorithms")).send().await?;
        expect_json(response).await
    }

    async fn algorithm(&self, algorithm_id: &str) -> Result<AlgorithmInfo, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&format!("algorithms/{algorithm_id}")))
            .send()
            .await?;
        expect_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::BackendConfig;

    #[test]
    fn endpoint_join_tolerates_trailing_and_leading_slashes() {
        let api = HttpTrainingApi::new(&BackendConfig {
            api_url: "http://localhost:8000/api/v1/".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();

        assert_eq!(
            api.endpoint("/training/start"),
            "http://localhost:8000/api/v1/training/start"
        );
        assert_eq!(
            api.endpoint("environments"),
            "http://localhost:8000/api/v1/environments"
        );
    }
}
