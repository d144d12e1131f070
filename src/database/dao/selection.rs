use chrono::Utc;

use crate::database::{to_json_string, Database};
use crate::error::AppError;
use crate::reconcile::{LastSyncMap, LastSyncSelection};
use crate::selection::SelectionState;

const SELECTION_KEY: &str = "sync_selection";
const LAST_SUCCESS_KEY: &str = "sync_last_success";

impl Database {
    /// 读取持久化的选择状态；缺失或损坏时返回默认状态
    pub fn load_selection(&self) -> Result<SelectionState, AppError> {
        let Some(raw) = self.get_setting(SELECTION_KEY)? else {
            return Ok(SelectionState::default());
        };
        match serde_json::from_str::<SelectionState>(&raw) {
            Ok(state) => Ok(state),
            Err(err) => {
                log::warn!("解析数据库中 {SELECTION_KEY} 失败，使用默认选择: {err}");
                Ok(SelectionState::default())
            }
        }
    }

    pub fn save_selection(&self, state: &SelectionState) -> Result<(), AppError> {
        self.set_setting(SELECTION_KEY, &to_json_string(state)?)
    }

    /// 分组 id -> 最近一次成功同步的选择
    pub fn get_last_success_map(&self) -> Result<LastSyncMap, AppError> {
        let Some(raw) = self.get_setting(LAST_SUCCESS_KEY)? else {
            return Ok(LastSyncMap::new());
        };
        match serde_json::from_str::<LastSyncMap>(&raw) {
            Ok(map) => Ok(map),
            Err(err) => {
                log::warn!("解析数据库中 {LAST_SUCCESS_KEY} 失败，视为空: {err}");
                Ok(LastSyncMap::new())
            }
        }
    }

    /// 合并写入：只覆盖指定分组的条目，其他分组保持不变。
    /// 读-改-写假定单一写入方，多会话并发写入可能丢失更新。
    pub fn merge_last_success(
        &self,
        group_id: &str,
        rule_id: Option<String>,
        mcp_id: Option<String>,
    ) -> Result<(), AppError> {
        let mut map = self.get_last_success_map()?;
        map.insert(
            group_id.to_string(),
            LastSyncSelection {
                rule_id,
                mcp_id,
                synced_at: Utc::now().timestamp_millis(),
            },
        );
        self.set_setting(LAST_SUCCESS_KEY, &to_json_string(&map)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{SyncMode, ToolSelection};

    #[test]
    fn selection_round_trips_through_settings() {
        let db = Database::memory().expect("memory db");
        assert_eq!(db.load_selection().unwrap(), SelectionState::default());

        let mut state = SelectionState::default();
        state.set_mode(SyncMode::ProjectScoped);
        state.set_project_path(Some("/work/app".into()));
        state.select_rule(Some("r1".into()));
        state.set_selected_tools(ToolSelection::Ids(vec!["codex".into()]));
        db.save_selection(&state).unwrap();

        assert_eq!(db.load_selection().unwrap(), state);
    }

    #[test]
    fn corrupt_selection_falls_back_to_default() {
        let db = Database::memory().expect("memory db");
        db.set_setting(SELECTION_KEY, "{broken").unwrap();
        assert_eq!(db.load_selection().unwrap(), SelectionState::default());
    }

    #[test]
    fn merge_last_success_keeps_other_groups() {
        let db = Database::memory().expect("memory db");
        db.merge_last_success("cli", Some("r0".into()), None).unwrap();
        db.merge_last_success("all", Some("r1".into()), Some("m1".into()))
            .unwrap();
        db.merge_last_success("all", Some("r2".into()), None).unwrap();

        let map = db.get_last_success_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["cli"].rule_id.as_deref(), Some("r0"));
        assert_eq!(map["all"].rule_id.as_deref(), Some("r2"));
        assert_eq!(map["all"].mcp_id, None);
        assert!(map["all"].synced_at > 0);
    }
}
