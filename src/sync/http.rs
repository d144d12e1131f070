use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{ApplyOutcome, ApplyRequest, SyncApplier};
use crate::error::AppError;
use crate::settings::AppSettings;

/// 通过 HTTP 调用 Apply 后端
pub struct HttpSyncApplier {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ApplyResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    results: Vec<ApplyOutcome>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl HttpSyncApplier {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("tool-sync/1.0")
            .build()
            .map_err(|e| {
                AppError::localized(
                    "sync.client_create_failed",
                    format!("创建 HTTP 客户端失败: {e}"),
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, AppError> {
        Self::new(&settings.sync_endpoint, settings.request_timeout_secs)
    }

    fn url_for(&self, request: &ApplyRequest) -> String {
        format!("{}/api/sync/{}", self.endpoint, request.kind.as_str())
    }

    fn parse_body(text: &str) -> Result<Vec<ApplyOutcome>, AppError> {
        let body: ApplyResponse = serde_json::from_str(text)
            .map_err(|e| AppError::Transport(format!("无法解析同步响应: {e}")))?;
        if !body.success {
            return Err(AppError::Transport(
                body.error.unwrap_or_else(|| "同步服务返回失败".to_string()),
            ));
        }
        Ok(body.results)
    }
}

#[async_trait]
impl SyncApplier for HttpSyncApplier {
    async fn apply(&self, request: ApplyRequest) -> Result<Vec<ApplyOutcome>, AppError> {
        let url = self.url_for(&request);
        log::debug!("POST {url} tool={:?} source={}", request.tool_id, request.source_id);

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                let message = if err.is_timeout() {
                    "请求超时".to_string()
                } else if err.is_connect() {
                    "连接失败".to_string()
                } else {
                    err.to_string()
                };
                AppError::Transport(format!("{url}: {message}"))
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("读取同步响应失败: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApplyResponse>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(text);
            return Err(AppError::Transport(format!("HTTP {}: {detail}", status.as_u16())));
        }
        Self::parse_body(&text)
    }
}
