//! 各工具 MCP 启用状态的持久化。
//!
//! 存储文件历经多个版本：早期把整张表包在 `tools` 键下，当前版本为扁平的
//! `toolId -> {enabled, servers}`。读取时一次性判定形态并规范化为 [`EnablementRecord`]，
//! 下游逻辑只面对规范结构。读取从不失败，缺失或损坏的内容退化为默认值。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::write_json_file;
use crate::error::AppError;
use crate::tools::ToolRegistry;

/// 旧版包裹整张表的顶层键
const LEGACY_WRAPPER_KEY: &str = "tools";

/// 单个工具的 MCP 启用状态；`servers == None` 表示使用全部服务器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnablementRecord {
    pub enabled: bool,
    pub servers: Option<Vec<String>>,
}

impl EnablementRecord {
    pub fn default_for(supports_mcp: bool) -> Self {
        Self {
            enabled: supports_mcp,
            servers: None,
        }
    }
}

pub type EnablementMap = IndexMap<String, EnablementRecord>;

/// 存储内容的两种历史形态
enum StoredShape {
    Flat(Map<String, Value>),
    Wrapped(Map<String, Value>),
}

impl StoredShape {
    fn detect(root: Map<String, Value>, registry: &ToolRegistry) -> Self {
        let wrapped = !registry.contains(LEGACY_WRAPPER_KEY)
            && root
                .get(LEGACY_WRAPPER_KEY)
                .map(Value::is_object)
                .unwrap_or(false);
        if !wrapped {
            return StoredShape::Flat(root);
        }
        let mut root = root;
        match root.remove(LEGACY_WRAPPER_KEY) {
            Some(Value::Object(inner)) => StoredShape::Wrapped(inner),
            _ => StoredShape::Flat(root),
        }
    }

    fn into_entries(self) -> Map<String, Value> {
        match self {
            StoredShape::Flat(map) => map,
            StoredShape::Wrapped(map) => {
                log::info!("检测到旧版 MCP 启用状态格式，按包裹结构解析");
                map
            }
        }
    }
}

/// 宽松布尔转换：null/0/空串为假，其余非布尔值为真
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn normalize_servers(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        // 既非 null 也非数组：兼容旧行为，视为空列表
        Some(other) => {
            log::warn!("MCP 启用状态中的 servers 字段类型异常，按空列表处理: {other}");
            Some(Vec::new())
        }
    }
}

fn normalize_record(stored: Option<&Value>, supports_mcp: bool) -> EnablementRecord {
    let Some(obj) = stored.and_then(Value::as_object) else {
        return EnablementRecord::default_for(supports_mcp);
    };
    EnablementRecord {
        enabled: obj.get("enabled").map(coerce_bool).unwrap_or(true),
        servers: normalize_servers(obj.get("servers")),
    }
}

/// 工具 id -> 启用状态 的持久化存储
pub struct McpEnablementStore {
    path: PathBuf,
    registry: ToolRegistry,
}

impl McpEnablementStore {
    pub fn new(path: impl Into<PathBuf>, registry: ToolRegistry) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }

    /// 使用默认路径 (~/.tool-sync/mcp-tools.json)
    pub fn open_default(registry: ToolRegistry) -> Self {
        Self::new(crate::config::get_enablement_path(), registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn defaults(&self) -> EnablementMap {
        self.registry
            .tools()
            .iter()
            .map(|t| (t.id.clone(), EnablementRecord::default_for(t.supports_mcp)))
            .collect()
    }

    fn read_stored(&self) -> Option<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("读取 MCP 启用状态失败，使用默认值: {}: {err}", self.path.display());
                }
                return None;
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(root)) => Some(root),
            Ok(_) => {
                log::warn!("MCP 启用状态根节点不是对象，使用默认值: {}", self.path.display());
                None
            }
            Err(err) => {
                log::warn!("解析 MCP 启用状态失败，使用默认值: {}: {err}", self.path.display());
                None
            }
        }
    }

    /// 读取并规范化；结果对每个已知工具恰好一条，未知工具被丢弃
    pub fn load(&self) -> EnablementMap {
        let Some(root) = self.read_stored() else {
            return self.defaults();
        };
        let entries = StoredShape::detect(root, &self.registry).into_entries();

        for unknown in entries.keys().filter(|id| !self.registry.contains(id)) {
            log::debug!("忽略未知工具的 MCP 启用状态: {unknown}");
        }

        self.registry
            .tools()
            .iter()
            .map(|tool| {
                let record = normalize_record(entries.get(&tool.id), tool.supports_mcp);
                (tool.id.clone(), record)
            })
            .collect()
    }

    /// 写入前校验所有键均为已知工具，校验失败时不做任何 IO
    pub fn save(&self, records: &EnablementMap) -> Result<(), AppError> {
        if let Some(unknown) = records.keys().find(|id| !self.registry.contains(id)) {
            return Err(AppError::localized(
                "enablement.unknown_tool",
                format!("未知的工具 ID: '{unknown}'"),
                format!("Unknown tool id: '{unknown}'"),
            ));
        }
        write_json_file(&self.path, records)?;
        log::info!("已保存 {} 个工具的 MCP 启用状态", records.len());
        Ok(())
    }

    /// 更新单个工具并整体写回
    pub fn set_record(&self, tool_id: &str, record: EnablementRecord) -> Result<(), AppError> {
        let mut records = self.load();
        if !records.contains_key(tool_id) {
            return Err(AppError::localized(
                "enablement.unknown_tool",
                format!("未知的工具 ID: '{tool_id}'"),
                format!("Unknown tool id: '{tool_id}'"),
            ));
        }
        records.insert(tool_id.to_string(), record);
        self.save(&records)
    }
}
