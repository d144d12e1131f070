//! 选择状态调和。
//!
//! 每次目录刷新时由宿主调用的纯函数：输入当前 [`SelectionState`] 与各实时快照，
//! 输出下一份状态。它只会收紧选择（清除失效 id、从磁盘状态推断或回忆一个已验证的 id），
//! 从不引入未经验证的选择，也从不报错。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::enablement::EnablementMap;
use crate::groups::ToolGroup;
use crate::selection::SelectionState;
use crate::tools::{Catalog, ToolDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpSetItem {
    pub server_id: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<McpSetItem>,
}

impl McpSet {
    /// 实际会下发到工具的服务器名集合（不含禁用项）
    pub fn server_names(&self) -> HashSet<&str> {
        self.items
            .iter()
            .filter(|item| !item.disabled)
            .map(|item| item.server_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMcpStatus {
    pub enabled: bool,
    #[serde(default)]
    pub servers: Option<Vec<String>>,
}

/// 各工具当前的同步状态
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolSyncStatus {
    #[serde(default)]
    pub mcp: HashMap<String, ToolMcpStatus>,
    #[serde(default)]
    pub rules: HashMap<String, Value>,
}

impl ToolSyncStatus {
    /// 从已加载的 MCP 启用状态派生 MCP 部分
    pub fn from_enablement(records: &EnablementMap) -> Self {
        let mcp = records
            .iter()
            .map(|(id, record)| {
                (
                    id.clone(),
                    ToolMcpStatus {
                        enabled: record.enabled,
                        servers: record.servers.clone(),
                    },
                )
            })
            .collect();
        Self {
            mcp,
            rules: HashMap::new(),
        }
    }
}

/// 某分组最近一次成功同步时的选择
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSyncSelection {
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub mcp_id: Option<String>,
    #[serde(default)]
    pub synced_at: i64,
}

pub type LastSyncMap = HashMap<String, LastSyncSelection>;

/// 一次调和所需的全部快照
pub struct ReconcileInput<'a> {
    pub tools: &'a Catalog<ToolDescriptor>,
    /// 已解析的分组（内置 + 自定义）
    pub groups: &'a [ToolGroup],
    pub rules: &'a Catalog<RuleSummary>,
    pub mcp_sets: &'a Catalog<McpSet>,
    /// `None` 表示状态仍在加载
    pub status: Option<&'a ToolSyncStatus>,
    pub last_success: &'a LastSyncMap,
}

impl ReconcileInput<'_> {
    fn any_loading(&self) -> bool {
        self.tools.is_loading()
            || self.rules.is_loading()
            || self.mcp_sets.is_loading()
            || self.status.is_none()
    }

    fn active_members(&self, group_id: &str) -> Vec<String> {
        self.groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.live_members(self.tools.items()))
            .unwrap_or_default()
    }
}

pub fn reconcile(state: &SelectionState, input: &ReconcileInput<'_>) -> SelectionState {
    // 快照不完整时不做任何修改，避免误清有效选择
    if input.any_loading() {
        return state.clone();
    }

    let mut next = state.clone();
    drop_stale_ids(&mut next, input);

    if next.selected_mcp_set_id.is_none() {
        if let Some(id) = detect_mcp_set(&next, input) {
            log::info!("根据工具当前 MCP 配置推断出 MCP 集合: {id}");
            next.selected_mcp_set_id = Some(id);
        }
    }

    if next.selected_rule_id.is_none() {
        if let Some(id) = recall_rule(&next, input) {
            log::info!("恢复分组 {} 上次成功同步的规则: {id}", next.active_group_id);
            next.selected_rule_id = Some(id);
        }
    }

    next
}

fn drop_stale_ids(state: &mut SelectionState, input: &ReconcileInput<'_>) {
    if let Some(id) = state.selected_mcp_set_id.as_deref() {
        if !input.mcp_sets.items().iter().any(|set| set.id == id) {
            log::info!("所选 MCP 集合已不存在，清除选择: {id}");
            state.selected_mcp_set_id = None;
        }
    }
    if let Some(id) = state.selected_rule_id.as_deref() {
        if !input.rules.items().iter().any(|rule| rule.id == id) {
            log::info!("所选规则已不存在，清除选择: {id}");
            state.selected_rule_id = None;
        }
    }
}

/// 分组内所有成员的服务器集合一致，且与某个 MCP 集合完全相同时，返回该集合 id
fn detect_mcp_set(state: &SelectionState, input: &ReconcileInput<'_>) -> Option<String> {
    let status = input.status?;
    let members = input.active_members(&state.active_group_id);
    let (first, rest) = members.split_first()?;

    let candidate = fingerprint(status, first)?;
    for member in rest {
        if fingerprint(status, member)? != candidate {
            return None;
        }
    }

    input
        .mcp_sets
        .items()
        .iter()
        .find(|set| set.server_names() == candidate)
        .map(|set| set.id.clone())
}

/// 工具当前已应用的服务器名集合；缺失或为"全部"时无法作为指纹
fn fingerprint<'s>(status: &'s ToolSyncStatus, tool_id: &str) -> Option<HashSet<&'s str>> {
    let servers = status.mcp.get(tool_id)?.servers.as_ref()?;
    Some(servers.iter().map(String::as_str).collect())
}

fn recall_rule(state: &SelectionState, input: &ReconcileInput<'_>) -> Option<String> {
    let rule_id = input
        .last_success
        .get(&state.active_group_id)?
        .rule_id
        .as_deref()?;
    input
        .rules
        .items()
        .iter()
        .any(|rule| rule.id == rule_id)
        .then(|| rule_id.to_string())
}
