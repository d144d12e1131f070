use std::path::Path;
use std::sync::PoisonError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(String),
    #[error("IO 错误: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    IoContext {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON 序列化失败: {source}")]
    JsonSerialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("数据库错误: {0}")]
    Database(String),
    /// 同步调用本身失败（连接错误、非 2xx 响应、任务异常终止）
    #[error("同步请求失败: {0}")]
    Transport(String),
    #[error("锁获取失败: {0}")]
    Lock(String),
    #[error("{zh}")]
    Localized {
        key: &'static str,
        zh: String,
        en: String,
    },
}

impl AppError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn localized(key: &'static str, zh: impl Into<String>, en: impl Into<String>) -> Self {
        Self::Localized {
            key,
            zh: zh.into(),
            en: en.into(),
        }
    }

    /// 派发前的前置条件校验失败，从未触达 Apply 后端
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Localized { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// 面向英文界面的消息；非本地化错误回落到 Display
    pub fn english(&self) -> String {
        match self {
            Self::Localized { en, .. } => en.clone(),
            other => other.to_string(),
        }
    }

    /// 按界面语言选择消息：`en` 用英文，其余（含未设置）用中文
    pub fn message_for(&self, language: Option<&str>) -> String {
        match language {
            Some("en") => self.english(),
            _ => self.to_string(),
        }
    }
}

impl<T> From<PoisonError<T>> for AppError {
    fn from(err: PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_displays_chinese_and_keeps_english() {
        let err = AppError::localized("sync.rule_not_selected", "未选择规则", "No rule selected");
        assert_eq!(err.to_string(), "未选择规则");
        assert_eq!(err.english(), "No rule selected");
        assert!(err.is_validation());
        assert!(!err.is_transport());
    }

    #[test]
    fn message_follows_language() {
        let err = AppError::localized("sync.no_tools", "所选工具均未安装", "No tools installed");
        assert_eq!(err.message_for(Some("en")), "No tools installed");
        assert_eq!(err.message_for(Some("zh")), "所选工具均未安装");
        assert_eq!(err.message_for(None), "所选工具均未安装");
    }

    #[test]
    fn transport_is_not_validation() {
        let err = AppError::Transport("connection refused".into());
        assert!(err.is_transport());
        assert!(!err.is_validation());
        assert!(err.to_string().contains("connection refused"));
    }
}
