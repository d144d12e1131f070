use std::sync::Arc;

use crate::error::AppError;
use crate::selection::can_sync;
use crate::settings::get_settings;
use crate::store::AppState;
use crate::sync::{SyncApplier, SyncOrchestrator, SyncReport, SyncRequest};

/// 一次同步调用的结果
#[derive(Debug)]
pub enum SyncOutcome {
    /// `can_sync` 为假，未发出任何调用
    Blocked,
    Completed(SyncReport),
    /// 前置条件或传输失败；不产生报告，也不记录成功选择
    Failed(AppError),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// 面向用户的失败信息，语言取自设置
    pub fn failure_message(&self) -> Option<String> {
        let language = get_settings().language;
        self.failure_message_in(language.as_deref())
    }

    pub fn failure_message_in(&self, language: Option<&str>) -> Option<String> {
        match self {
            SyncOutcome::Failed(err) => Some(err.message_for(language)),
            _ => None,
        }
    }
}

pub struct SyncService;

impl SyncService {
    pub fn can_sync(state: &AppState) -> bool {
        can_sync(
            &state.selection(),
            state.is_sync_in_flight(),
            state.tool_catalog.is_loading(),
        )
    }

    /// 调用方入口：在此保证同一时间只有一次同步
    pub async fn sync(
        state: &AppState,
        applier: Arc<dyn SyncApplier>,
        request: SyncRequest,
    ) -> SyncOutcome {
        if !Self::can_sync(state) {
            log::debug!("当前不可同步，忽略请求");
            return SyncOutcome::Blocked;
        }
        let Some(_guard) = state.begin_sync() else {
            return SyncOutcome::Blocked;
        };

        match SyncOrchestrator::new(applier).run(state, request).await {
            Ok(report) => SyncOutcome::Completed(report),
            Err(err) => {
                log::warn!("同步失败: {err}");
                SyncOutcome::Failed(err)
            }
        }
    }
}
