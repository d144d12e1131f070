use crate::error::AppError;
use rusqlite::Connection;
use std::sync::Mutex;

mod schema;
pub mod dao;

/// Safe JSON serialization helper
pub(crate) fn to_json_string<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Config(format!("JSON serialization failed: {e}")))
}

/// Safe Mutex lock helper - used across the database module
macro_rules! lock_conn {
    ($mutex:expr) => {
        $mutex
            .lock()
            .map_err(|e| AppError::Database(format!("Mutex lock failed: {}", e)))?
    };
}

pub(crate) use lock_conn;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Initialize database connection and create tables
    pub fn init() -> Result<Self, AppError> {
        let db_path = crate::config::get_database_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }

        let conn = Connection::open(&db_path).map_err(|e| AppError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing)
    pub fn memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| AppError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(|e| AppError::Database(e.to_string()))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        db.apply_schema_migrations()?;
        Ok(db)
    }
}
