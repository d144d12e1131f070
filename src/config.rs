use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// 应用目录覆盖（主要供测试与便携部署使用）
pub const CONFIG_DIR_ENV: &str = "TOOL_SYNC_CONFIG_DIR";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// 展开 `~` / `~/` 前缀，其余路径原样返回
pub fn resolve_home_path(raw: &str) -> PathBuf {
    if raw == "~" {
        return home_dir();
    }
    if let Some(stripped) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return home_dir().join(stripped);
    }
    PathBuf::from(raw)
}

/// 获取应用配置目录路径 (~/.tool-sync)
pub fn get_app_config_dir() -> PathBuf {
    if let Ok(custom) = std::env::var(CONFIG_DIR_ENV) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return resolve_home_path(trimmed);
        }
    }
    home_dir().join(".tool-sync")
}

/// 应用设置文件
pub fn get_app_settings_path() -> PathBuf {
    get_app_config_dir().join("settings.json")
}

/// 各工具 MCP 启用状态记录
pub fn get_enablement_path() -> PathBuf {
    get_app_config_dir().join("mcp-tools.json")
}

pub fn get_database_path() -> PathBuf {
    get_app_config_dir().join("tool-sync.db")
}

/// 写入 JSON 配置文件
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), AppError> {
    let json =
        serde_json::to_string_pretty(data).map_err(|e| AppError::JsonSerialize { source: e })?;
    atomic_write(path, json.as_bytes())
}

/// 原子写入：写入临时文件后 rename 替换，避免半写状态
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Config("无效的路径".to_string()))?;
    fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Config("无效的文件名".to_string()))?
        .to_string_lossy()
        .to_string();
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp = parent.join(format!("{file_name}.tmp.{ts}"));

    {
        let mut f = fs::File::create(&tmp).map_err(|e| AppError::io(&tmp, e))?;
        f.write_all(data).map_err(|e| AppError::io(&tmp, e))?;
        f.flush().map_err(|e| AppError::io(&tmp, e))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            let perm = meta.permissions().mode();
            let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(perm));
        }
    }

    #[cfg(windows)]
    {
        // Windows 上 rename 目标存在会失败，先移除再重命名
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }

    fs::rename(&tmp, path).map_err(|e| AppError::IoContext {
        context: format!("原子替换失败: {} -> {}", tmp.display(), path.display()),
        source: e,
    })?;
    Ok(())
}
