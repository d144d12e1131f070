use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::database::Database;
use crate::error::AppError;
use crate::groups::resolve_groups;
use crate::selection::SelectionState;
use crate::tools::{Catalog, ToolDescriptor, ToolRegistry};

/// 工具目录缓存，同步成功后刷新
#[derive(Default)]
pub struct ToolCatalogCache {
    inner: RwLock<Catalog<ToolDescriptor>>,
}

impl ToolCatalogCache {
    pub fn snapshot(&self) -> Catalog<ToolDescriptor> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading()
    }

    pub fn set(&self, catalog: Catalog<ToolDescriptor>) -> Result<(), AppError> {
        *self.inner.write()? = catalog;
        Ok(())
    }

    /// 标记为加载中（宿主开始重新扫描时调用）
    pub fn invalidate(&self) -> Result<(), AppError> {
        self.set(Catalog::Loading)
    }

    pub fn refresh(&self, registry: &ToolRegistry) -> Result<(), AppError> {
        let tools = registry.detect();
        log::debug!(
            "工具目录已刷新: {} 个工具，{} 个已安装",
            tools.len(),
            tools.iter().filter(|t| t.installed).count()
        );
        self.set(Catalog::Ready(tools))
    }
}

/// 进行中的同步标记，离开作用域时自动清除
pub struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// 全局应用状态
pub struct AppState {
    pub db: Arc<Database>,
    pub registry: ToolRegistry,
    pub tool_catalog: ToolCatalogCache,
    selection: RwLock<SelectionState>,
    sync_in_flight: AtomicBool,
}

impl AppState {
    /// 从数据库恢复选择状态；工具目录初始为加载中
    pub fn new(db: Arc<Database>, registry: ToolRegistry) -> Result<Self, AppError> {
        let selection = db.load_selection()?;
        Ok(Self {
            db,
            registry,
            tool_catalog: ToolCatalogCache::default(),
            selection: RwLock::new(selection),
            sync_in_flight: AtomicBool::new(false),
        })
    }

    /// 使用默认数据库与内置工具表
    pub fn init() -> Result<Self, AppError> {
        let db = Database::init()?;
        Self::new(Arc::new(db), ToolRegistry::builtin())
    }

    pub fn selection(&self) -> SelectionState {
        match self.selection.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 修改内存中的选择并立即持久化
    pub fn update_selection<F>(&self, mutate: F) -> Result<SelectionState, AppError>
    where
        F: FnOnce(&mut SelectionState),
    {
        let mut guard = self.selection.write()?;
        let mut next = guard.clone();
        mutate(&mut next);
        if next != *guard {
            self.db.save_selection(&next)?;
            *guard = next;
        }
        Ok(guard.clone())
    }

    /// 重新扫描工具目录，并按新目录重新投影活动分组
    pub fn refresh_tool_catalog(&self) -> Result<(), AppError> {
        self.tool_catalog.refresh(&self.registry)?;
        self.reproject_active_group()?;
        Ok(())
    }

    /// 宿主自行提供目录时使用，效果同 `refresh_tool_catalog`
    pub fn set_tool_catalog(&self, catalog: Catalog<ToolDescriptor>) -> Result<(), AppError> {
        self.tool_catalog.set(catalog)?;
        self.reproject_active_group()?;
        Ok(())
    }

    /// 目录加载中时不做任何修改
    pub fn reproject_active_group(&self) -> Result<SelectionState, AppError> {
        let catalog = self.tool_catalog.snapshot();
        if catalog.is_loading() {
            return Ok(self.selection());
        }
        let groups = resolve_groups(catalog.items(), &self.db.get_custom_groups()?);
        self.update_selection(|s| s.reproject_active_group(&groups, catalog.items()))
    }

    pub fn is_sync_in_flight(&self) -> bool {
        self.sync_in_flight.load(Ordering::SeqCst)
    }

    /// 已有同步进行中时返回 `None`
    pub fn begin_sync(&self) -> Option<SyncGuard<'_>> {
        self.sync_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncGuard {
                flag: &self.sync_in_flight,
            })
    }
}
