#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tool_sync_lib::{
    update_settings, AppError, AppSettings, AppState, ApplyOutcome, ApplyRequest, ApplyStatus,
    Database, SyncApplier, ToolCategory, ToolDescriptor, ToolRegistry,
};

/// 为测试设置隔离的 HOME 目录，避免污染真实用户数据。
pub fn ensure_test_home() -> &'static Path {
    static HOME: OnceLock<PathBuf> = OnceLock::new();
    HOME.get_or_init(|| {
        let base = std::env::temp_dir().join("tool-sync-test-home");
        if base.exists() {
            let _ = std::fs::remove_dir_all(&base);
        }
        std::fs::create_dir_all(&base).expect("create test home");
        std::env::set_var("HOME", &base);
        #[cfg(windows)]
        std::env::set_var("USERPROFILE", &base);
        base
    })
    .as_path()
}

/// 清理测试目录中生成的配置文件与缓存。
pub fn reset_test_fs() {
    let home = ensure_test_home();
    let path = home.join(".tool-sync");
    if path.exists() {
        if let Err(err) = std::fs::remove_dir_all(&path) {
            eprintln!("failed to clean {}: {}", path.display(), err);
        }
    }

    // 重置内存中的设置缓存，确保测试环境不受上一次调用影响
    let _ = update_settings(AppSettings::default());
}

/// 全局互斥锁，避免多测试并发写入相同的 HOME 目录。
pub fn test_mutex() -> &'static Mutex<()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX.get_or_init(|| Mutex::new(()))
}

pub fn tool(id: &str, category: ToolCategory, installed: bool, supports_mcp: bool) -> ToolDescriptor {
    ToolDescriptor {
        id: id.to_string(),
        name: id.to_uppercase(),
        category,
        config_path: format!("/virtual/{id}"),
        installed,
        supports_mcp,
    }
}

/// t1 已安装（CLI），t2 未安装（IDE），t3 已安装但不支持 MCP（CLI）
pub fn sample_tools() -> Vec<ToolDescriptor> {
    vec![
        tool("t1", ToolCategory::Cli, true, true),
        tool("t2", ToolCategory::Ide, false, true),
        tool("t3", ToolCategory::Cli, true, false),
    ]
}

/// 创建测试用的 AppState：内存数据库 + 给定工具目录（已加载）
pub fn create_test_state(tools: Vec<ToolDescriptor>) -> Result<AppState, AppError> {
    let db = Database::memory()?;
    let state = AppState::new(Arc::new(db), ToolRegistry::from_tools(tools))?;
    state.refresh_tool_catalog()?;
    Ok(state)
}

/// 记录收到的请求；`fail_tool` 命中时返回传输错误，`error_tool` 命中时返回 Error 状态
#[derive(Default)]
pub struct RecordingApplier {
    pub requests: Mutex<Vec<ApplyRequest>>,
    pub fail_tool: Option<String>,
    pub error_tool: Option<String>,
}

impl RecordingApplier {
    pub fn calls(&self) -> Vec<ApplyRequest> {
        self.requests.lock().expect("lock requests").clone()
    }
}

#[async_trait]
impl SyncApplier for RecordingApplier {
    async fn apply(&self, request: ApplyRequest) -> Result<Vec<ApplyOutcome>, AppError> {
        self.requests
            .lock()
            .expect("lock requests")
            .push(request.clone());

        let tool_id = request.tool_id.clone().unwrap_or_else(|| "*".to_string());
        if self.fail_tool.as_deref() == Some(tool_id.as_str()) {
            return Err(AppError::Transport("connection refused".into()));
        }
        let status = if self.error_tool.as_deref() == Some(tool_id.as_str()) {
            ApplyStatus::Error
        } else {
            ApplyStatus::Success
        };
        Ok(vec![ApplyOutcome {
            tool_id,
            status,
            message: format!("{} {}", request.kind, request.source_id),
            path: None,
            servers: None,
        }])
    }
}
