use serde::{Deserialize, Serialize};

use crate::tools::{ToolCategory, ToolDescriptor};

pub const GROUP_ALL: &str = "all";
pub const GROUP_CLI: &str = "cli";
pub const GROUP_IDE: &str = "ide";
pub const GROUP_DESKTOP: &str = "desktop";

/// 内置分组 id 保留，自定义分组不可占用
pub const BUILTIN_GROUP_IDS: [&str; 4] = [GROUP_ALL, GROUP_CLI, GROUP_IDE, GROUP_DESKTOP];

/// 一组一起同步的工具。成员是弱引用，读取时按实时目录重新校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolGroup {
    pub id: String,
    pub name: String,
    pub member_tool_ids: Vec<String>,
    #[serde(default)]
    pub builtin: bool,
}

impl ToolGroup {
    pub fn custom(id: impl Into<String>, name: impl Into<String>, members: Vec<String>) -> Self {
        let mut member_tool_ids: Vec<String> = Vec::with_capacity(members.len());
        for id in members {
            if !member_tool_ids.contains(&id) {
                member_tool_ids.push(id);
            }
        }
        Self {
            id: id.into(),
            name: name.into(),
            member_tool_ids,
            builtin: false,
        }
    }

    /// 仍在目录中且已安装的成员，保持原有顺序
    pub fn live_members(&self, catalog: &[ToolDescriptor]) -> Vec<String> {
        self.member_tool_ids
            .iter()
            .filter(|id| catalog.iter().any(|t| &t.id == *id && t.installed))
            .cloned()
            .collect()
    }
}

pub fn is_builtin_group_id(id: &str) -> bool {
    BUILTIN_GROUP_IDS.contains(&id)
}

fn installed_where(
    catalog: &[ToolDescriptor],
    pred: impl Fn(&ToolDescriptor) -> bool,
) -> Vec<String> {
    catalog
        .iter()
        .filter(|t| t.installed && pred(t))
        .map(|t| t.id.clone())
        .collect()
}

/// 由实时目录计算内置分组（All/CLI/IDE/Desktop），从不持久化
pub fn builtin_groups(catalog: &[ToolDescriptor]) -> Vec<ToolGroup> {
    let by_category = |id: &str, name: &str, category: ToolCategory| ToolGroup {
        id: id.to_string(),
        name: name.to_string(),
        member_tool_ids: installed_where(catalog, |t| t.category == category),
        builtin: true,
    };

    vec![
        ToolGroup {
            id: GROUP_ALL.to_string(),
            name: "All".to_string(),
            member_tool_ids: installed_where(catalog, |_| true),
            builtin: true,
        },
        by_category(GROUP_CLI, "CLI", ToolCategory::Cli),
        by_category(GROUP_IDE, "IDE", ToolCategory::Ide),
        by_category(GROUP_DESKTOP, "Desktop", ToolCategory::Desktop),
    ]
}

/// 内置分组在前，自定义分组在后；与内置 id 冲突的自定义分组被忽略
pub fn resolve_groups(catalog: &[ToolDescriptor], custom: &[ToolGroup]) -> Vec<ToolGroup> {
    let mut groups = builtin_groups(catalog);
    for group in custom {
        if is_builtin_group_id(&group.id) {
            log::warn!("自定义分组 '{}' 与内置分组冲突，已忽略", group.id);
            continue;
        }
        groups.push(group.clone());
    }
    groups
}
