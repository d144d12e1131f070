use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ApplyOutcome, ApplyStatus, SyncKind, SyncOperation};

/// 报告中的单条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReportEntry {
    pub tool_id: String,
    pub kind: SyncKind,
    pub status: ApplyStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
}

/// 一次同步的汇总结果，展示后即丢弃
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub entries: Vec<SyncReportEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    /// 记录一个操作的返回；空结果记为该目标的 Skipped
    pub(crate) fn record(&mut self, op: &SyncOperation, outcomes: Vec<ApplyOutcome>) {
        if outcomes.is_empty() {
            self.entries.push(SyncReportEntry {
                tool_id: op.target.label().to_string(),
                kind: op.kind,
                status: ApplyStatus::Skipped,
                message: "没有可同步的工具".to_string(),
                path: None,
                servers: None,
            });
            return;
        }
        self.entries
            .extend(outcomes.into_iter().map(|outcome| SyncReportEntry {
                tool_id: outcome.tool_id,
                kind: op.kind,
                status: outcome.status,
                message: outcome.message,
                path: outcome.path,
                servers: outcome.servers,
            }));
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    fn count(&self, status: ApplyStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(ApplyStatus::Success)
    }

    pub fn error_count(&self) -> usize {
        self.count(ApplyStatus::Error)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(ApplyStatus::Skipped)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "成功 {}，失败 {}，跳过 {}",
            self.success_count(),
            self.error_count(),
            self.skipped_count()
        )
    }
}
