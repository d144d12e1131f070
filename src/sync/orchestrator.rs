use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

use super::{
    ApplyRequest, SyncApplier, SyncKind, SyncOperation, SyncReport, SyncScope, SyncTarget,
};
use crate::error::AppError;
use crate::selection::{SelectionState, SyncMode, ToolSelection};
use crate::store::AppState;
use crate::tools::ToolDescriptor;

/// 一次同步请求
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRequest {
    pub scope: SyncScope,
    /// 忽略选中工具，直接以通配目标同步所有已安装工具
    pub force_all_tools: bool,
}

/// 扇出编排器。不负责串行化并发调用，由调用方通过 `can_sync` 保证同一时间只有一次同步
pub struct SyncOrchestrator {
    applier: Arc<dyn SyncApplier>,
}

impl SyncOrchestrator {
    pub fn new(applier: Arc<dyn SyncApplier>) -> Self {
        Self { applier }
    }

    /// 按选择状态展开操作；任一前置条件不满足时不产生任何操作
    pub fn plan(
        selection: &SelectionState,
        tools: &[ToolDescriptor],
        request: &SyncRequest,
    ) -> Result<Vec<SyncOperation>, AppError> {
        if selection.mode == SyncMode::ProjectScoped && selection.project_path.is_none() {
            return Err(AppError::localized(
                "sync.project_not_selected",
                "项目模式下未选择项目",
                "No project selected for project-scoped sync",
            ));
        }
        if !selection.has_any_selection() {
            return Err(AppError::localized(
                "sync.nothing_selected",
                "请至少选择一个规则或 MCP 集合",
                "Select a rule or an MCP set before syncing",
            ));
        }
        if request.scope == SyncScope::Rules && selection.selected_rule_id.is_none() {
            return Err(AppError::localized(
                "sync.rule_not_selected",
                "未选择要同步的规则",
                "No rule selected to sync",
            ));
        }
        if request.scope == SyncScope::Mcp && selection.selected_mcp_set_id.is_none() {
            return Err(AppError::localized(
                "sync.mcp_not_selected",
                "未选择要同步的 MCP 集合",
                "No MCP set selected to sync",
            ));
        }

        let targets = Self::resolve_targets(selection, tools, request.force_all_tools);
        if targets.is_empty() {
            return Err(AppError::localized(
                "sync.no_tools",
                "所选工具均未安装",
                "None of the selected tools are installed",
            ));
        }

        let sources = [
            (SyncKind::Rules, selection.selected_rule_id.as_ref()),
            (SyncKind::Mcp, selection.selected_mcp_set_id.as_ref()),
        ];
        let mut ops = Vec::new();
        for target in &targets {
            for (kind, source) in sources {
                let Some(source_id) = source else { continue };
                if !request.scope.includes(kind) {
                    continue;
                }
                ops.push(SyncOperation {
                    target: target.clone(),
                    kind,
                    source_id: source_id.clone(),
                    strategy: selection.strategy,
                });
            }
        }
        Ok(ops)
    }

    fn resolve_targets(
        selection: &SelectionState,
        tools: &[ToolDescriptor],
        force_all_tools: bool,
    ) -> Vec<SyncTarget> {
        if force_all_tools || selection.selected_tool_ids.is_all() {
            return vec![SyncTarget::AllInstalled];
        }
        let ToolSelection::Ids(ids) = &selection.selected_tool_ids else {
            return vec![SyncTarget::AllInstalled];
        };

        let mut targets: Vec<SyncTarget> = Vec::with_capacity(ids.len());
        for id in ids {
            let installed = tools.iter().any(|t| &t.id == id && t.installed);
            let target = SyncTarget::Tool(id.clone());
            if installed && !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    fn request_for(op: &SyncOperation, selection: &SelectionState) -> ApplyRequest {
        let is_global = selection.is_global();
        ApplyRequest {
            kind: op.kind,
            tool_id: op.target.tool_id().map(str::to_string),
            source_id: op.source_id.clone(),
            strategy: op.strategy,
            is_global,
            project_path: if is_global {
                None
            } else {
                selection.project_path.clone()
            },
        }
    }

    /// 并发派发全部操作并等待全部结束。
    /// 任一调用返回 `Err` 或任务异常终止时整批失败，不保留部分报告；
    /// 单个工具的 `Error` 状态只记入报告。
    pub async fn dispatch(
        &self,
        selection: &SelectionState,
        ops: Vec<SyncOperation>,
    ) -> Result<SyncReport, AppError> {
        let started_at = Utc::now();
        log::info!("开始同步: {} 个操作", ops.len());

        let handles = ops.into_iter().map(|op| {
            let applier = Arc::clone(&self.applier);
            let request = Self::request_for(&op, selection);
            tokio::spawn(async move {
                let result = applier.apply(request).await;
                (op, result)
            })
        });
        let settled = join_all(handles).await;

        let mut report = SyncReport::new(started_at);
        let mut failure: Option<AppError> = None;
        for joined in settled {
            match joined {
                Ok((op, Ok(outcomes))) => report.record(&op, outcomes),
                Ok((op, Err(err))) => {
                    log::error!(
                        "同步调用失败: {} {} -> {err}",
                        op.kind,
                        op.target.label()
                    );
                    failure.get_or_insert(err);
                }
                Err(join_err) => {
                    log::error!("同步任务异常终止: {join_err}");
                    failure.get_or_insert(AppError::Transport(format!(
                        "同步任务异常终止: {join_err}"
                    )));
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(report.finish())
    }

    /// 读取注入的状态，展开、派发并在成功后刷新工具目录、记录本分组最近一次成功选择
    pub async fn run(&self, state: &AppState, request: SyncRequest) -> Result<SyncReport, AppError> {
        let selection = state.selection();
        let catalog = state.tool_catalog.snapshot();

        let ops = Self::plan(&selection, catalog.items(), &request)?;
        let report = self.dispatch(&selection, ops).await?;
        log::info!("同步完成: {}", report.summary());

        if let Err(err) = state.refresh_tool_catalog() {
            log::warn!("刷新工具目录失败: {err}");
        }
        if let Err(err) = state.db.merge_last_success(
            &selection.active_group_id,
            selection.selected_rule_id.clone(),
            selection.selected_mcp_set_id.clone(),
        ) {
            log::error!("记录最近一次成功同步失败: {err}");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SyncStrategy;
    use crate::tools::ToolCategory;

    fn tool(id: &str, installed: bool) -> ToolDescriptor {
        ToolDescriptor {
            id: id.into(),
            name: id.into(),
            category: ToolCategory::Cli,
            config_path: String::new(),
            installed,
            supports_mcp: true,
        }
    }

    fn selection(rule: Option<&str>, mcp: Option<&str>, tools: ToolSelection) -> SelectionState {
        let mut state = SelectionState::default();
        state.select_rule(rule.map(str::to_string));
        state.select_mcp_set(mcp.map(str::to_string));
        state.set_selected_tools(tools);
        state
    }

    fn key(err: AppError) -> &'static str {
        match err {
            AppError::Localized { key, .. } => key,
            other => panic!("expected localized validation error, got {other:?}"),
        }
    }

    #[test]
    fn plan_emits_one_op_per_target_and_kind() {
        let tools = vec![tool("t1", true), tool("t2", true), tool("t3", false)];
        let state = selection(
            Some("r1"),
            Some("m1"),
            ToolSelection::Ids(vec!["t1".into(), "t3".into(), "t2".into()]),
        );

        let ops = SyncOrchestrator::plan(&state, &tools, &SyncRequest::default()).unwrap();

        let summary: Vec<(Option<&str>, SyncKind, &str)> = ops
            .iter()
            .map(|op| (op.target.tool_id(), op.kind, op.source_id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some("t1"), SyncKind::Rules, "r1"),
                (Some("t1"), SyncKind::Mcp, "m1"),
                (Some("t2"), SyncKind::Rules, "r1"),
                (Some("t2"), SyncKind::Mcp, "m1"),
            ]
        );
        assert!(ops.iter().all(|op| op.strategy == SyncStrategy::SmartUpdate));
    }

    #[test]
    fn plan_uses_wildcard_for_all_or_forced() {
        let tools = vec![tool("t1", true)];
        let state = selection(Some("r1"), None, ToolSelection::All);
        let ops = SyncOrchestrator::plan(&state, &tools, &SyncRequest::default()).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].target, SyncTarget::AllInstalled);

        let state = selection(Some("r1"), None, ToolSelection::Ids(vec![]));
        let forced = SyncRequest {
            force_all_tools: true,
            ..SyncRequest::default()
        };
        let ops = SyncOrchestrator::plan(&state, &tools, &forced).unwrap();
        assert_eq!(ops[0].target, SyncTarget::AllInstalled);
    }

    #[test]
    fn plan_respects_scope() {
        let tools = vec![tool("t1", true)];
        let state = selection(Some("r1"), Some("m1"), ToolSelection::Ids(vec!["t1".into()]));
        let request = SyncRequest {
            scope: SyncScope::Mcp,
            ..SyncRequest::default()
        };
        let ops = SyncOrchestrator::plan(&state, &tools, &request).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, SyncKind::Mcp);
    }

    #[test]
    fn plan_rejects_unmet_preconditions() {
        let tools = vec![tool("t1", true), tool("t2", false)];
        let ids = || ToolSelection::Ids(vec!["t1".into()]);

        let mut project = selection(Some("r1"), None, ids());
        project.set_mode(SyncMode::ProjectScoped);
        assert_eq!(
            key(SyncOrchestrator::plan(&project, &tools, &SyncRequest::default()).unwrap_err()),
            "sync.project_not_selected"
        );

        let empty = selection(None, None, ids());
        assert_eq!(
            key(SyncOrchestrator::plan(&empty, &tools, &SyncRequest::default()).unwrap_err()),
            "sync.nothing_selected"
        );

        let mcp_only = selection(None, Some("m1"), ids());
        let rules = SyncRequest {
            scope: SyncScope::Rules,
            ..SyncRequest::default()
        };
        let err = SyncOrchestrator::plan(&mcp_only, &tools, &rules).unwrap_err();
        assert!(err.english().contains("rule"));
        assert_eq!(key(err), "sync.rule_not_selected");

        let rule_only = selection(Some("r1"), None, ids());
        let mcp = SyncRequest {
            scope: SyncScope::Mcp,
            ..SyncRequest::default()
        };
        assert_eq!(
            key(SyncOrchestrator::plan(&rule_only, &tools, &mcp).unwrap_err()),
            "sync.mcp_not_selected"
        );

        let uninstalled = selection(Some("r1"), None, ToolSelection::Ids(vec!["t2".into()]));
        assert_eq!(
            key(SyncOrchestrator::plan(&uninstalled, &tools, &SyncRequest::default()).unwrap_err()),
            "sync.no_tools"
        );
    }

    #[test]
    fn project_path_only_sent_in_project_mode() {
        let op = SyncOperation {
            target: SyncTarget::Tool("t1".into()),
            kind: SyncKind::Rules,
            source_id: "r1".into(),
            strategy: SyncStrategy::Append,
        };
        let mut state = SelectionState::default();
        state.set_project_path(Some("/work/app".into()));
        let request = SyncOrchestrator::request_for(&op, &state);
        assert!(request.is_global);
        assert_eq!(request.project_path, None);

        state.set_mode(SyncMode::ProjectScoped);
        let request = SyncOrchestrator::request_for(&op, &state);
        assert!(!request.is_global);
        assert_eq!(request.project_path.as_deref(), Some("/work/app"));
        assert_eq!(request.tool_id.as_deref(), Some("t1"));
    }
}
