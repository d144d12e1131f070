use chrono::Utc;

use crate::error::AppError;
use crate::groups::{is_builtin_group_id, ToolGroup, GROUP_ALL};
use crate::services::selection::SelectionService;
use crate::store::AppState;

/// 自定义工具分组业务
pub struct GroupService;

impl GroupService {
    pub fn list(state: &AppState) -> Result<Vec<ToolGroup>, AppError> {
        SelectionService::groups(state)
    }

    fn validate_name(name: &str) -> Result<String, AppError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::localized(
                "groups.empty_name",
                "分组名称不能为空",
                "Group name must not be empty",
            ));
        }
        Ok(trimmed.to_string())
    }

    fn validate_members(state: &AppState, members: &[String]) -> Result<(), AppError> {
        if let Some(unknown) = members.iter().find(|id| !state.registry.contains(id)) {
            return Err(AppError::localized(
                "groups.unknown_tool",
                format!("未知的工具 ID: '{unknown}'"),
                format!("Unknown tool id: '{unknown}'"),
            ));
        }
        Ok(())
    }

    fn require_custom(state: &AppState, id: &str) -> Result<ToolGroup, AppError> {
        if is_builtin_group_id(id) {
            return Err(AppError::localized(
                "groups.builtin_readonly",
                format!("内置分组不可修改: {id}"),
                format!("Built-in group cannot be modified: {id}"),
            ));
        }
        state.db.get_custom_group(id)?.ok_or_else(|| {
            AppError::localized(
                "groups.not_found",
                format!("分组不存在: {id}"),
                format!("Tool group not found: {id}"),
            )
        })
    }

    pub fn create(
        state: &AppState,
        name: &str,
        members: Vec<String>,
    ) -> Result<ToolGroup, AppError> {
        let name = Self::validate_name(name)?;
        Self::validate_members(state, &members)?;

        let mut id = format!("custom-{}", Utc::now().timestamp_millis());
        let mut suffix = 1;
        while state.db.get_custom_group(&id)?.is_some() {
            id = format!("custom-{}-{suffix}", Utc::now().timestamp_millis());
            suffix += 1;
        }

        let group = ToolGroup::custom(id, name, members);
        state.db.save_custom_group(&group)?;
        log::info!("已创建工具分组 '{}' ({})", group.name, group.id);
        Ok(group)
    }

    pub fn rename(state: &AppState, id: &str, name: &str) -> Result<ToolGroup, AppError> {
        let mut group = Self::require_custom(state, id)?;
        group.name = Self::validate_name(name)?;
        state.db.save_custom_group(&group)?;
        Ok(group)
    }

    /// 更新成员；若为活动分组则重新投影选中的工具
    pub fn set_members(
        state: &AppState,
        id: &str,
        members: Vec<String>,
    ) -> Result<ToolGroup, AppError> {
        let current = Self::require_custom(state, id)?;
        Self::validate_members(state, &members)?;
        let group = ToolGroup::custom(current.id, current.name, members);
        state.db.save_custom_group(&group)?;

        if state.selection().active_group_id == group.id {
            SelectionService::activate_group(state, &group.id)?;
        }
        Ok(group)
    }

    /// 删除活动分组时回退到 `all`
    pub fn delete(state: &AppState, id: &str) -> Result<bool, AppError> {
        if is_builtin_group_id(id) {
            return Err(AppError::localized(
                "groups.builtin_readonly",
                format!("内置分组不可删除: {id}"),
                format!("Built-in group cannot be deleted: {id}"),
            ));
        }
        let existed = state.db.delete_custom_group(id)?;
        if existed && state.selection().active_group_id == id {
            log::info!("活动分组 {id} 已删除，切换回 {GROUP_ALL}");
            SelectionService::activate_group(state, GROUP_ALL)?;
        }
        Ok(existed)
    }
}
