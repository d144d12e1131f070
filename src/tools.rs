use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

/// 工具分类，用于计算内置分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Cli,
    Ide,
    Desktop,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Cli => "cli",
            ToolCategory::Ide => "ide",
            ToolCategory::Desktop => "desktop",
        }
    }
}

impl FromStr for ToolCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cli" => Ok(ToolCategory::Cli),
            "ide" => Ok(ToolCategory::Ide),
            "desktop" => Ok(ToolCategory::Desktop),
            other => Err(AppError::localized(
                "tools.unsupported_category",
                format!("不支持的工具分类: '{other}'。可选值: cli, ide, desktop。"),
                format!("Unsupported tool category: '{other}'. Allowed: cli, ide, desktop."),
            )),
        }
    }
}

/// 只读的工具目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub category: ToolCategory,
    pub config_path: String,
    pub installed: bool,
    /// 是否支持 MCP；不支持的工具默认不启用
    pub supports_mcp: bool,
}

/// 实时快照：加载中或已就绪
#[derive(Debug, Clone, PartialEq)]
pub enum Catalog<T> {
    Loading,
    Ready(Vec<T>),
}

impl<T> Catalog<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Catalog::Loading)
    }

    /// 加载中视为空
    pub fn items(&self) -> &[T] {
        match self {
            Catalog::Loading => &[],
            Catalog::Ready(items) => items,
        }
    }
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Catalog::Loading
    }
}

/// 已知工具的静态定义
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub category: ToolCategory,
    /// 相对用户主目录的配置目录
    pub config_dir: &'static str,
    pub supports_mcp: bool,
}

const BUILTIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        id: "claude-code",
        name: "Claude Code",
        category: ToolCategory::Cli,
        config_dir: ".claude",
        supports_mcp: true,
    },
    ToolSpec {
        id: "codex",
        name: "Codex",
        category: ToolCategory::Cli,
        config_dir: ".codex",
        supports_mcp: true,
    },
    ToolSpec {
        id: "gemini-cli",
        name: "Gemini CLI",
        category: ToolCategory::Cli,
        config_dir: ".gemini",
        supports_mcp: true,
    },
    ToolSpec {
        id: "aider",
        name: "Aider",
        category: ToolCategory::Cli,
        config_dir: ".aider",
        supports_mcp: false,
    },
    ToolSpec {
        id: "cursor",
        name: "Cursor",
        category: ToolCategory::Ide,
        config_dir: ".cursor",
        supports_mcp: true,
    },
    ToolSpec {
        id: "windsurf",
        name: "Windsurf",
        category: ToolCategory::Ide,
        config_dir: ".codeium/windsurf",
        supports_mcp: true,
    },
    ToolSpec {
        id: "vscode",
        name: "VS Code",
        category: ToolCategory::Ide,
        config_dir: ".vscode",
        supports_mcp: true,
    },
    ToolSpec {
        id: "claude-desktop",
        name: "Claude Desktop",
        category: ToolCategory::Desktop,
        config_dir: ".config/Claude",
        supports_mcp: true,
    },
];

/// 当前已知的工具集合
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    /// 为真时 `detect` 通过文件系统判断安装状态，否则沿用给定值
    probe_fs: bool,
}

impl ToolRegistry {
    /// 内置工具表，`installed` 在 `detect` 时计算
    pub fn builtin() -> Self {
        let tools = BUILTIN_TOOLS
            .iter()
            .map(|spec| ToolDescriptor {
                id: spec.id.to_string(),
                name: spec.name.to_string(),
                category: spec.category,
                config_path: default_config_dir(spec).to_string_lossy().to_string(),
                installed: false,
                supports_mcp: spec.supports_mcp,
            })
            .collect();
        Self {
            tools,
            probe_fs: true,
        }
    }

    /// 宿主自带目录时使用，`installed` 按给定值保留
    pub fn from_tools(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            probe_fs: false,
        }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// 未知工具按支持处理
    pub fn supports_mcp(&self, id: &str) -> bool {
        self.get(id).map(|t| t.supports_mcp).unwrap_or(true)
    }

    /// 生成实时工具目录：配置目录（或设置中的覆盖目录）存在即视为已安装
    pub fn detect(&self) -> Vec<ToolDescriptor> {
        if !self.probe_fs {
            return self.tools.clone();
        }
        self.tools
            .iter()
            .map(|tool| {
                let dir = crate::settings::get_tool_config_override(&tool.id)
                    .unwrap_or_else(|| PathBuf::from(&tool.config_path));
                let installed = dir.exists();
                log::debug!("检测工具 {}: {} (installed={installed})", tool.id, dir.display());
                ToolDescriptor {
                    config_path: dir.to_string_lossy().to_string(),
                    installed,
                    ..tool.clone()
                }
            })
            .collect()
    }
}

fn default_config_dir(spec: &ToolSpec) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(spec.config_dir)
}
