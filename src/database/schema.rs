use crate::error::AppError;
use rusqlite::Connection;

use super::{lock_conn, Database};

const SCHEMA_VERSION: i32 = 1;

impl Database {
    pub(super) fn create_tables(&self) -> Result<(), AppError> {
        let conn = lock_conn!(self.conn);
        Self::create_tables_on_conn(&conn)
    }

    pub(crate) fn create_tables_on_conn(conn: &Connection) -> Result<(), AppError> {
        // 1. Settings table (key-value, JSON payloads)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT
            )",
            [],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

        // 2. Custom tool groups
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tool_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                members TEXT NOT NULL DEFAULT '[]',
                sort_index INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER
            )",
            [],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub(super) fn apply_schema_migrations(&self) -> Result<(), AppError> {
        let conn = lock_conn!(self.conn);
        let version: i32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|e| AppError::Database(e.to_string()))?;

        if version > SCHEMA_VERSION {
            return Err(AppError::Database(format!(
                "数据库版本 {version} 高于当前支持的版本 {SCHEMA_VERSION}，请升级应用"
            )));
        }

        if version < SCHEMA_VERSION {
            log::info!("数据库 schema 升级: {version} -> {SCHEMA_VERSION}");
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }
}
