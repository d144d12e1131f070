use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

use crate::config::{get_app_settings_path, resolve_home_path, write_json_file};
use crate::error::AppError;

pub const DEFAULT_SYNC_ENDPOINT: &str = "http://127.0.0.1:3456";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MIN_TIMEOUT_SECS: u64 = 2;
const MAX_TIMEOUT_SECS: u64 = 120;

/// 应用设置结构，允许覆盖各工具的配置目录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// 工具 id -> 自定义配置目录
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tool_config_dirs: HashMap<String, String>,
    /// Apply 后端地址
    #[serde(default = "default_sync_endpoint")]
    pub sync_endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_sync_endpoint() -> String {
    DEFAULT_SYNC_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tool_config_dirs: HashMap::new(),
            sync_endpoint: default_sync_endpoint(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            language: None,
        }
    }
}

impl AppSettings {
    fn normalize(&mut self) {
        self.tool_config_dirs = self
            .tool_config_dirs
            .drain()
            .filter_map(|(id, dir)| {
                let id = id.trim().to_string();
                let dir = dir.trim().to_string();
                (!id.is_empty() && !dir.is_empty()).then_some((id, dir))
            })
            .collect();

        let endpoint = self.sync_endpoint.trim().trim_end_matches('/');
        self.sync_endpoint = if endpoint.is_empty() {
            default_sync_endpoint()
        } else {
            endpoint.to_string()
        };

        self.request_timeout_secs = self
            .request_timeout_secs
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        self.language = self
            .language
            .as_ref()
            .map(|s| s.trim())
            .filter(|s| matches!(*s, "en" | "zh"))
            .map(|s| s.to_string());
    }

    fn load_from_file() -> Self {
        let path = get_app_settings_path();
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<AppSettings>(&content) {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(err) => {
                log::warn!(
                    "解析设置文件失败，将使用默认设置。路径: {}, 错误: {}",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// 工具配置目录覆盖（已展开 `~`）
    pub fn tool_config_override(&self, tool_id: &str) -> Option<PathBuf> {
        self.tool_config_dirs
            .get(tool_id)
            .map(|raw| resolve_home_path(raw))
    }
}

static SETTINGS_STORE: OnceLock<RwLock<AppSettings>> = OnceLock::new();

fn settings_store() -> &'static RwLock<AppSettings> {
    SETTINGS_STORE.get_or_init(|| RwLock::new(AppSettings::load_from_file()))
}

pub fn get_settings() -> AppSettings {
    match settings_store().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn update_settings(mut new_settings: AppSettings) -> Result<(), AppError> {
    new_settings.normalize();
    write_json_file(&get_app_settings_path(), &new_settings)?;

    let mut guard = settings_store().write()?;
    *guard = new_settings;
    Ok(())
}

/// 从磁盘重新加载设置到内存缓存
pub fn reload_settings() -> Result<(), AppError> {
    let fresh = AppSettings::load_from_file();
    let mut guard = settings_store().write()?;
    *guard = fresh;
    Ok(())
}

pub fn get_tool_config_override(tool_id: &str) -> Option<PathBuf> {
    let settings = settings_store().read().ok()?;
    settings.tool_config_override(tool_id)
}
