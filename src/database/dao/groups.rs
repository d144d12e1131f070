use chrono::Utc;
use rusqlite::params;

use crate::database::{lock_conn, to_json_string, Database};
use crate::error::AppError;
use crate::groups::ToolGroup;

impl Database {
    pub fn get_custom_groups(&self) -> Result<Vec<ToolGroup>, AppError> {
        let conn = lock_conn!(self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, name, members FROM tool_groups
                 ORDER BY sort_index ASC, created_at ASC, id ASC",
            )
            .map_err(|e| AppError::Database(e.to_string()))?;

        let group_iter = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let name: String = row.get(1)?;
                let members_str: String = row.get(2)?;
                Ok((id, name, members_str))
            })
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut groups = Vec::new();
        for group_res in group_iter {
            let (id, name, members_str) =
                group_res.map_err(|e| AppError::Database(e.to_string()))?;
            let members: Vec<String> = serde_json::from_str(&members_str).unwrap_or_else(|e| {
                log::warn!("分组 '{id}' 的成员列表损坏，按空处理: {e}");
                Vec::new()
            });
            groups.push(ToolGroup::custom(id, name, members));
        }
        Ok(groups)
    }

    pub fn get_custom_group(&self, id: &str) -> Result<Option<ToolGroup>, AppError> {
        Ok(self.get_custom_groups()?.into_iter().find(|g| g.id == id))
    }

    /// 新增或更新；更新时保留原有排序与创建时间
    pub fn save_custom_group(&self, group: &ToolGroup) -> Result<(), AppError> {
        let members = to_json_string(&group.member_tool_ids)?;
        let conn = lock_conn!(self.conn);
        let next_index: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_index), -1) + 1 FROM tool_groups",
                [],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO tool_groups (id, name, members, sort_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, members = excluded.members",
            params![
                group.id,
                group.name,
                members,
                next_index,
                Utc::now().timestamp_millis()
            ],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn delete_custom_group(&self, id: &str) -> Result<bool, AppError> {
        let conn = lock_conn!(self.conn);
        let affected = conn
            .execute("DELETE FROM tool_groups WHERE id = ?1", params![id])
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(affected > 0)
    }
}
