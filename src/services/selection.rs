use crate::error::AppError;
use crate::groups::{resolve_groups, ToolGroup};
use crate::reconcile::{reconcile, McpSet, ReconcileInput, RuleSummary, ToolSyncStatus};
use crate::selection::{SelectionState, SyncMode, SyncStrategy, ToolSelection};
use crate::store::AppState;
use crate::tools::Catalog;

/// 宿主在刷新时提供的外部目录快照
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshots {
    pub rules: Catalog<RuleSummary>,
    pub mcp_sets: Catalog<McpSet>,
    /// `None` 表示仍在加载
    pub status: Option<ToolSyncStatus>,
}

/// 选择状态相关业务：每次修改即持久化
pub struct SelectionService;

impl SelectionService {
    pub fn load(state: &AppState) -> SelectionState {
        state.selection()
    }

    /// 任意修改，变化时写回
    pub fn update<F>(state: &AppState, mutate: F) -> Result<SelectionState, AppError>
    where
        F: FnOnce(&mut SelectionState),
    {
        state.update_selection(mutate)
    }

    pub fn set_mode(
        state: &AppState,
        mode: SyncMode,
        project_path: Option<String>,
    ) -> Result<SelectionState, AppError> {
        state.update_selection(|s| {
            s.set_mode(mode);
            s.set_project_path(project_path);
        })
    }

    pub fn set_strategy(
        state: &AppState,
        strategy: SyncStrategy,
    ) -> Result<SelectionState, AppError> {
        state.update_selection(|s| s.set_strategy(strategy))
    }

    pub fn select_rule(
        state: &AppState,
        rule_id: Option<String>,
    ) -> Result<SelectionState, AppError> {
        state.update_selection(|s| s.select_rule(rule_id))
    }

    pub fn select_mcp_set(
        state: &AppState,
        mcp_set_id: Option<String>,
    ) -> Result<SelectionState, AppError> {
        state.update_selection(|s| s.select_mcp_set(mcp_set_id))
    }

    pub fn select_tools(
        state: &AppState,
        tools: ToolSelection,
    ) -> Result<SelectionState, AppError> {
        state.update_selection(|s| s.set_selected_tools(tools))
    }

    /// 内置分组 + 数据库中的自定义分组，基于当前工具目录
    pub fn groups(state: &AppState) -> Result<Vec<ToolGroup>, AppError> {
        let catalog = state.tool_catalog.snapshot();
        let custom = state.db.get_custom_groups()?;
        Ok(resolve_groups(catalog.items(), &custom))
    }

    /// 切换活动分组并重新投影选中的工具
    pub fn activate_group(state: &AppState, group_id: &str) -> Result<SelectionState, AppError> {
        let group = Self::groups(state)?
            .into_iter()
            .find(|g| g.id == group_id)
            .ok_or_else(|| {
                AppError::localized(
                    "groups.not_found",
                    format!("分组不存在: {group_id}"),
                    format!("Tool group not found: {group_id}"),
                )
            })?;
        let catalog = state.tool_catalog.snapshot();
        state.update_selection(|s| s.set_active_group(&group, catalog.items()))
    }

    /// 运行一次调和并按实时目录重新投影活动分组；仅在状态变化时写回。返回是否有变化。
    /// 调和在选择状态的写锁内进行，不会覆盖期间的用户修改
    pub fn refresh(state: &AppState, snapshots: &CatalogSnapshots) -> Result<bool, AppError> {
        let tools = state.tool_catalog.snapshot();
        let groups = resolve_groups(tools.items(), &state.db.get_custom_groups()?);
        let last_success = state.db.get_last_success_map()?;
        let input = ReconcileInput {
            tools: &tools,
            groups: &groups,
            rules: &snapshots.rules,
            mcp_sets: &snapshots.mcp_sets,
            status: snapshots.status.as_ref(),
            last_success: &last_success,
        };

        let mut changed = false;
        state.update_selection(|s| {
            let mut next = reconcile(s, &input);
            if !tools.is_loading() {
                next.reproject_active_group(&groups, tools.items());
            }
            changed = next != *s;
            *s = next;
        })?;
        Ok(changed)
    }
}
