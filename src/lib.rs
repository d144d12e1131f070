mod config;
mod database;
mod enablement;
mod error;
mod groups;
mod reconcile;
mod selection;
mod services;
mod settings;
mod store;
mod sync;
mod tools;

pub use config::{
    atomic_write, get_app_config_dir, get_app_settings_path, get_database_path,
    get_enablement_path, write_json_file, CONFIG_DIR_ENV,
};
pub use database::Database;
pub use enablement::{EnablementMap, EnablementRecord, McpEnablementStore};
pub use error::AppError;
pub use groups::{
    builtin_groups, is_builtin_group_id, resolve_groups, ToolGroup, BUILTIN_GROUP_IDS, GROUP_ALL,
    GROUP_CLI, GROUP_DESKTOP, GROUP_IDE,
};
pub use reconcile::{
    reconcile, LastSyncMap, LastSyncSelection, McpSet, McpSetItem, ReconcileInput, RuleSummary,
    ToolMcpStatus, ToolSyncStatus,
};
pub use selection::{can_sync, SelectionState, SyncMode, SyncStrategy, ToolSelection};
pub use services::{CatalogSnapshots, GroupService, SelectionService, SyncOutcome, SyncService};
pub use settings::{
    get_settings, reload_settings, update_settings, AppSettings, DEFAULT_SYNC_ENDPOINT,
};
pub use store::{AppState, SyncGuard, ToolCatalogCache};
pub use sync::{
    ApplyOutcome, ApplyRequest, ApplyStatus, HttpSyncApplier, SyncApplier, SyncKind,
    SyncOperation, SyncOrchestrator, SyncReport, SyncReportEntry, SyncRequest, SyncScope,
    SyncTarget, WILDCARD_TOOL_ID,
};
pub use tools::{Catalog, ToolCategory, ToolDescriptor, ToolRegistry};

use std::sync::Arc;

/// 启动时的初始化：加载设置、打开数据库、扫描一次工具目录
pub fn bootstrap() -> Result<Arc<AppState>, AppError> {
    let settings = get_settings();
    log::info!(
        "配置目录: {}，同步服务: {}",
        get_app_config_dir().display(),
        settings.sync_endpoint
    );

    let state = AppState::init()?;
    if let Err(err) = state.refresh_tool_catalog() {
        log::warn!("初始化工具目录失败: {err}");
    }
    Ok(Arc::new(state))
}

/// 使用设置中的端点与超时构造默认的同步执行器
pub fn default_applier() -> Result<Arc<dyn SyncApplier>, AppError> {
    let applier = HttpSyncApplier::from_settings(&get_settings())?;
    Ok(Arc::new(applier))
}
