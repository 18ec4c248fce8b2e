//! JSON-file store
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/<project>/tasks.json
//! <root>/<project>/scope/requirements-baseline.json
//! <root>/<project>/scope/change-requests.json
//! ```
//!
//! Every write goes to a sibling temp file which is then renamed over the
//! target, so readers see either the old or the new document.

use crate::error::{StoreError, StoreResult};
use crate::memory::upsert_by;
use crate::traits::{BaselineStore, ChangeRequestStore, TaskStore};
use async_trait::async_trait;
use scope_model::{ChangeRequest, ProjectId, RequirementBaseline, TaskRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SCOPE_DIR: &str = "scope";
const BASELINE_FILE: &str = "requirements-baseline.json";
const CHANGE_REQUESTS_FILE: &str = "change-requests.json";
const TASKS_FILE: &str = "tasks.json";

/// File-backed store rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.as_str())
    }

    #[must_use]
    pub fn baseline_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(SCOPE_DIR).join(BASELINE_FILE)
    }

    #[must_use]
    pub fn change_requests_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(SCOPE_DIR).join(CHANGE_REQUESTS_FILE)
    }

    #[must_use]
    pub fn tasks_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(TASKS_FILE)
    }

    /// Create the project directory if it does not exist
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory cannot be created
    pub async fn ensure_project(&self, project: &ProjectId) -> StoreResult<()> {
        let dir = self.project_dir(project);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::serde(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serde(path, e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    tracing::debug!(path = %path.display(), "wrote store document");
    Ok(())
}

#[async_trait]
impl BaselineStore for JsonFileStore {
    async fn get_baseline(&self, project: &ProjectId) -> StoreResult<Option<RequirementBaseline>> {
        let path = self.baseline_path(project);
        let Some(baseline) = read_json::<RequirementBaseline>(&path).await? else {
            return Ok(None);
        };
        if !baseline.counts_consistent() {
            return Err(StoreError::Corrupt {
                path,
                reason: "metadata counts disagree with requirements".to_string(),
            });
        }
        if baseline.project_id() != project {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("baseline belongs to project {}", baseline.project_id()),
            });
        }
        Ok(Some(baseline))
    }

    async fn put_baseline(&self, baseline: &RequirementBaseline) -> StoreResult<()> {
        write_json_atomic(&self.baseline_path(baseline.project_id()), baseline).await
    }
}

#[async_trait]
impl ChangeRequestStore for JsonFileStore {
    async fn list_change_requests(&self, project: &ProjectId) -> StoreResult<Vec<ChangeRequest>> {
        Ok(read_json(&self.change_requests_path(project))
            .await?
            .unwrap_or_default())
    }

    async fn get_change_request(&self, project: &ProjectId, id: &str) -> StoreResult<Option<ChangeRequest>> {
        Ok(self
            .list_change_requests(project)
            .await?
            .into_iter()
            .find(|cr| cr.id == id))
    }

    async fn put_change_request(&self, project: &ProjectId, request: &ChangeRequest) -> StoreResult<()> {
        let mut requests = self.list_change_requests(project).await?;
        upsert_by(&mut requests, request.clone(), |cr| &cr.id);
        write_json_atomic(&self.change_requests_path(project), &requests).await
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn project_exists(&self, project: &ProjectId) -> StoreResult<bool> {
        let dir = self.project_dir(project);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(dir, e)),
        }
    }

    async fn list_tasks(&self, project: &ProjectId) -> StoreResult<Vec<TaskRecord>> {
        Ok(read_json(&self.tasks_path(project)).await?.unwrap_or_default())
    }

    async fn get_task(&self, project: &ProjectId, task_id: &str) -> StoreResult<Option<TaskRecord>> {
        Ok(self
            .list_tasks(project)
            .await?
            .into_iter()
            .find(|t| t.id == task_id))
    }

    async fn put_task(&self, project: &ProjectId, task: &TaskRecord) -> StoreResult<()> {
        let mut tasks = self.list_tasks(project).await?;
        upsert_by(&mut tasks, task.clone(), |t| &t.id);
        write_json_atomic(&self.tasks_path(project), &tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use scope_model::{BaselineSource, ContentHash, Priority, Requirement, RequirementScope};

    fn project() -> ProjectId {
        ProjectId::new("alpha").unwrap()
    }

    fn baseline(project: &ProjectId) -> RequirementBaseline {
        let now = Utc::now();
        RequirementBaseline::new(
            project.clone(),
            vec![Requirement {
                id: "REQ-001-aaaaaaaa".to_string(),
                title: "任务创建".to_string(),
                description: "用户可以创建新任务".to_string(),
                scope: RequirementScope::Core,
                priority: Priority::Medium,
                category: "task-management".to_string(),
                extracted_from: "prd.md".to_string(),
                created_at: now,
            }],
            BaselineSource {
                source_document: "prd.md".to_string(),
                document_title: None,
                prd_source_hash: ContentHash::compute(b"prd"),
                analyzed_at: now,
                structure_recognized: true,
                sections: vec!["功能需求".to_string()],
                warnings: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn baseline_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let p = project();

        assert!(store.get_baseline(&p).await.unwrap().is_none());
        let original = baseline(&p);
        store.put_baseline(&original).await.unwrap();

        assert!(store.baseline_path(&p).exists());
        assert_eq!(store.get_baseline(&p).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn tampered_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let p = project();
        store.put_baseline(&baseline(&p)).await.unwrap();

        let path = store.baseline_path(&p);
        let mut doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc["metadata"]["totalRequirements"] = serde_json::json!(7);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(matches!(
            store.get_baseline(&p).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn tasks_keep_foreign_fields_and_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let p = project();
        assert!(!store.project_exists(&p).await.unwrap());
        store.ensure_project(&p).await.unwrap();
        assert!(store.project_exists(&p).await.unwrap());

        std::fs::write(
            store.tasks_path(&p),
            r#"[{"id":"t1","title":"Create","status":"todo","assignee":"kim"}]"#,
        )
        .unwrap();

        let mut task = store.get_task(&p, "t1").await.unwrap().unwrap();
        task.extension_mut().matched_requirement_ids = vec!["REQ-001-aaaaaaaa".to_string()];
        store.put_task(&p, &task).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.tasks_path(&p)).unwrap()).unwrap();
        assert_eq!(raw[0]["status"], "todo");
        assert_eq!(raw[0]["_scopeExtension"]["matchedRequirementIds"][0], "REQ-001-aaaaaaaa");

        let leftovers: Vec<_> = std::fs::read_dir(store.project_dir(&p))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn writing_a_task_registers_its_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let p = ProjectId::new("fresh").unwrap();
        assert!(!store.project_exists(&p).await.unwrap());

        store.put_task(&p, &TaskRecord::new("t1", "first", "")).await.unwrap();
        assert!(store.project_exists(&p).await.unwrap());
        assert_eq!(store.list_tasks(&p).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_documents_surface_serde_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let p = project();
        let path = store.change_requests_path(&p);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            store.list_change_requests(&p).await,
            Err(StoreError::Serde { .. })
        ));
    }
}
