//! Testing utilities for the scope governance workspace
//!
//! Shared PRD fixtures and a pre-seeded in-memory engine.

#![allow(missing_docs)]

use scope_engine::{AnalysisOutcome, ScopeConfig, ScopeEngine, ScopeResult, ScopeStores};
use scope_model::{ProjectId, TaskRecord};
use scope_store::MemoryStore;
use std::sync::Arc;

/// Task-management PRD with functional, non-functional and constraint sections
/// and no authentication requirements
pub const TASK_MANAGEMENT_PRD: &str = "# 任务管理系统\n\n\
## 功能需求\n\n\
- 任务创建：用户可以创建新任务\n\
- 任务编辑：用户可以修改任务标题和描述\n\
- 任务删除：用户可以删除不需要的任务\n\
- 任务状态管理：任务支持待办、进行中、已完成状态\n\n\
## 非功能需求\n\n\
- 性能：列表加载时间小于2秒\n\n\
## 技术约束\n\n\
- 使用 Rust 开发\n";

/// English PRD with an optional section
pub const NOTES_APP_PRD: &str = "---\ntitle: Notes App\n---\n\n\
## Functional Requirements\n\n\
- Create notes with a title and body\n\
- Tag notes with labels\n\
- Search notes by keyword\n\n\
## Non-functional Requirements\n\n\
- Notes list loads in under one second\n\n\
## Future Enhancements\n\n\
- Offline sync across devices\n";

/// Text without any recognizable structure
pub const FREEFORM_PRD: &str = "We want something that helps people keep track of things.\nIt should feel fast.\n";

/// Out-of-scope task against [`TASK_MANAGEMENT_PRD`]
#[must_use]
pub fn login_task(id: &str) -> TaskRecord {
    TaskRecord::new(id, "添加用户登录系统", "实现用户注册、登录和认证")
}

/// In-scope task against [`TASK_MANAGEMENT_PRD`]
#[must_use]
pub fn task_creation_task(id: &str) -> TaskRecord {
    TaskRecord::new(id, "实现任务创建功能", "开发任务创建的API和界面")
}

/// Project wired to an in-memory store
#[derive(Debug, Clone)]
pub struct TestProject {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<ScopeEngine>,
    pub project: ProjectId,
}

impl TestProject {
    /// # Panics
    /// Panics if `name` is not a valid project id
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_config(name, ScopeConfig::default())
    }

    /// # Panics
    /// Panics if `name` or `config` is invalid
    #[must_use]
    pub fn with_config(name: &str, config: ScopeConfig) -> Self {
        let project = ProjectId::new(name).expect("valid test project id");
        let store = Arc::new(MemoryStore::new());
        store.create_project(&project);
        let engine = ScopeEngine::new(config, ScopeStores::shared(store.clone())).expect("valid test config");
        Self {
            store,
            engine: Arc::new(engine),
            project,
        }
    }

    /// Analyze `prd` without forcing
    ///
    /// # Errors
    /// Propagates engine errors
    pub async fn analyze(&self, prd: &str) -> ScopeResult<AnalysisOutcome> {
        self.engine.analyze_prd(&self.project, prd, "prd.md", false).await
    }

    /// Store a task directly, bypassing the hooks
    pub fn add_task(&self, task: TaskRecord) {
        self.store.insert_task(&self.project, task);
    }

    /// Current copy of a stored task
    #[must_use]
    pub fn task(&self, id: &str) -> Option<TaskRecord> {
        self.store.tasks(&self.project).into_iter().find(|t| t.id == id)
    }
}
