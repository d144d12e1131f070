//! 同步扇出：把一次同步请求展开为多个 (工具, 类型) 操作，并发调用 Apply，汇总报告。

mod http;
mod orchestrator;
mod report;

pub use http::HttpSyncApplier;
pub use orchestrator::{SyncOrchestrator, SyncRequest};
pub use report::{SyncReport, SyncReportEntry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::selection::SyncStrategy;

/// 通配目标在报告中的显示
pub const WILDCARD_TOOL_ID: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Rules,
    Mcp,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Rules => "rules",
            SyncKind::Mcp => "mcp",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    Rules,
    Mcp,
    #[default]
    All,
}

impl SyncScope {
    pub fn includes(&self, kind: SyncKind) -> bool {
        match self {
            SyncScope::All => true,
            SyncScope::Rules => kind == SyncKind::Rules,
            SyncScope::Mcp => kind == SyncKind::Mcp,
        }
    }
}

/// 操作目标：某个工具，或交给 Apply 解释为"所有已安装工具"的通配
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncTarget {
    AllInstalled,
    Tool(String),
}

impl SyncTarget {
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            SyncTarget::AllInstalled => None,
            SyncTarget::Tool(id) => Some(id),
        }
    }

    pub fn label(&self) -> &str {
        self.tool_id().unwrap_or(WILDCARD_TOOL_ID)
    }
}

/// 展开后的单个同步操作（临时对象）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOperation {
    pub target: SyncTarget,
    pub kind: SyncKind,
    pub source_id: String,
    pub strategy: SyncStrategy,
}

/// 一次 Apply 调用的参数
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub kind: SyncKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub source_id: String,
    pub strategy: SyncStrategy,
    pub is_global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Success,
    Error,
    Skipped,
}

/// Apply 对单个工具的处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub tool_id: String,
    pub status: ApplyStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
}

/// 把规则或 MCP 集合按策略写入工具原生配置的外部能力。
///
/// 返回 `Err` 表示调用本身失败（整批失败）；单个工具的失败以 `ApplyStatus::Error` 返回。
/// 同一请求重复调用是安全的。
#[async_trait]
pub trait SyncApplier: Send + Sync {
    async fn apply(&self, request: ApplyRequest) -> Result<Vec<ApplyOutcome>, AppError>;
}
