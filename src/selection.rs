use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::error::AppError;
use crate::groups::{ToolGroup, GROUP_ALL};
use crate::tools::ToolDescriptor;

/// 同步作用域：全局配置或某个项目目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    #[default]
    Global,
    ProjectScoped,
}

/// 写入工具配置时的调和策略，对本模块不透明，原样传给 Apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    Overwrite,
    Append,
    Merge,
    #[default]
    SmartUpdate,
}

impl SyncStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Overwrite => "overwrite",
            SyncStrategy::Append => "append",
            SyncStrategy::Merge => "merge",
            SyncStrategy::SmartUpdate => "smart-update",
        }
    }
}

impl FromStr for SyncStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "overwrite" => Ok(SyncStrategy::Overwrite),
            "append" => Ok(SyncStrategy::Append),
            "merge" => Ok(SyncStrategy::Merge),
            "smart-update" | "smartupdate" => Ok(SyncStrategy::SmartUpdate),
            other => Err(AppError::localized(
                "sync.unsupported_strategy",
                format!("不支持的同步策略: '{other}'。可选值: overwrite, append, merge, smart-update。"),
                format!(
                    "Unsupported sync strategy: '{other}'. Allowed: overwrite, append, merge, smart-update."
                ),
            )),
        }
    }
}

/// 选中的工具：全部（通配）或显式 id 列表。序列化为 `"all"` 或数组
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolSelection {
    #[default]
    All,
    Ids(Vec<String>),
}

impl ToolSelection {
    pub fn is_all(&self) -> bool {
        match self {
            ToolSelection::All => true,
            ToolSelection::Ids(ids) => ids.iter().any(|id| id == GROUP_ALL),
        }
    }
}

impl Serialize for ToolSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolSelection::All => serializer.serialize_str(GROUP_ALL),
            ToolSelection::Ids(ids) => ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ToolSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s == GROUP_ALL => Ok(ToolSelection::All),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "selectedToolIds must be \"all\" or a list, got \"{s}\""
            ))),
            Raw::List(ids) => Ok(ToolSelection::Ids(ids)),
        }
    }
}

/// 当前"将要同步什么"的唯一来源，由应用上下文持有并显式注入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default)]
    pub strategy: SyncStrategy,
    #[serde(default = "default_group_id")]
    pub active_group_id: String,
    #[serde(default)]
    pub selected_rule_id: Option<String>,
    #[serde(default)]
    pub selected_mcp_set_id: Option<String>,
    #[serde(default)]
    pub selected_tool_ids: ToolSelection,
}

fn default_group_id() -> String {
    GROUP_ALL.to_string()
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            mode: SyncMode::Global,
            project_path: None,
            strategy: SyncStrategy::default(),
            active_group_id: default_group_id(),
            selected_rule_id: None,
            selected_mcp_set_id: None,
            selected_tool_ids: ToolSelection::All,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SelectionState {
    pub fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
    }

    /// 项目模式缺少路径是合法的中间状态，执行同步时才会被拒绝
    pub fn set_project_path(&mut self, path: Option<String>) {
        self.project_path = non_empty(path);
    }

    pub fn set_strategy(&mut self, strategy: SyncStrategy) {
        self.strategy = strategy;
    }

    pub fn select_rule(&mut self, rule_id: Option<String>) {
        self.selected_rule_id = non_empty(rule_id);
    }

    pub fn select_mcp_set(&mut self, mcp_set_id: Option<String>) {
        self.selected_mcp_set_id = non_empty(mcp_set_id);
    }

    pub fn set_selected_tools(&mut self, tools: ToolSelection) {
        self.selected_tool_ids = tools;
    }

    /// 切换分组并重新投影 `selected_tool_ids` 为该分组的实时成员
    pub fn set_active_group(&mut self, group: &ToolGroup, catalog: &[ToolDescriptor]) {
        self.active_group_id = group.id.clone();
        self.selected_tool_ids = ToolSelection::Ids(group.live_members(catalog));
    }

    /// 按实时目录重新投影活动分组的成员。显式选择全部（通配）时不变；
    /// 活动分组已不存在时保留原投影
    pub fn reproject_active_group(&mut self, groups: &[ToolGroup], catalog: &[ToolDescriptor]) {
        if self.selected_tool_ids.is_all() {
            return;
        }
        if let Some(group) = groups.iter().find(|g| g.id == self.active_group_id) {
            self.selected_tool_ids = ToolSelection::Ids(group.live_members(catalog));
        }
    }

    pub fn has_any_selection(&self) -> bool {
        self.selected_rule_id.is_some() || self.selected_mcp_set_id.is_some()
    }

    pub fn is_global(&self) -> bool {
        self.mode == SyncMode::Global
    }
}

/// 派生值，从不存储：至少选中一项、没有进行中的同步、工具目录已加载
pub fn can_sync(selection: &SelectionState, in_flight: bool, tool_catalog_loading: bool) -> bool {
    selection.has_any_selection() && !in_flight && !tool_catalog_loading
}
