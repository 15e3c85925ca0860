use crate::models::{Dashboard, DashboardConfig, Dataset, NewDashboard, NewDataset};
use crate::user_models::User;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";
const DATASETS_FILE: &str = "datasets.json";
const DASHBOARDS_FILE: &str = "dashboards.json";

pub trait Row: Clone + Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> i64;
}

impl Row for User {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Row for Dataset {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Row for Dashboard {
    fn id(&self) -> i64 {
        self.id
    }
}

struct TableState<T> {
    rows: Vec<T>,
    next_id: i64,
}

/// On-disk layout of a table. The id counter is stored with the rows so a
/// deleted highest id is never handed out again after a restart.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableFile<R> {
    next_id: i64,
    rows: R,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTable<T> {
    Current(TableFile<Vec<T>>),
    Rows(Vec<T>),
}

/// A table held in memory and rewritten to its JSON file after every
/// mutation. Tables without a path never touch the disk.
///
/// Mutations are applied to a copy of the rows and only become visible once
/// the file write succeeded.
pub struct JsonTable<T> {
    path: Option<PathBuf>,
    state: RwLock<TableState<T>>,
}

impl<T: Row> JsonTable<T> {
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let state = match &path {
            Some(path) if path.exists() => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let stored: StoredTable<T> = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                match stored {
                    StoredTable::Current(file) => TableState {
                        next_id: file.next_id.max(max_id(&file.rows) + 1),
                        rows: file.rows,
                    },
                    StoredTable::Rows(rows) => TableState {
                        next_id: max_id(&rows) + 1,
                        rows,
                    },
                }
            }
            _ => TableState {
                rows: Vec::new(),
                next_id: 1,
            },
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn empty() -> Self {
        Self {
            path: None,
            state: RwLock::new(TableState {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn insert_with(&self, build: impl FnOnce(i64) -> T) -> Result<T> {
        let mut state = self.state.write().await;
        let row = build(state.next_id);
        let next_id = state.next_id + 1;
        let mut rows = state.rows.clone();
        rows.push(row.clone());
        self.commit(&mut state, rows, next_id)?;
        Ok(row)
    }

    /// Updates the first row matching `matches`, or inserts the row built by
    /// `create` when there is none. Runs under a single write lock.
    pub async fn upsert_with(
        &self,
        matches: impl Fn(&T) -> bool,
        update: impl FnOnce(&mut T),
        create: impl FnOnce(i64) -> T,
    ) -> Result<T> {
        let mut state = self.state.write().await;
        let mut rows = state.rows.clone();
        let mut next_id = state.next_id;
        let row = match rows.iter().position(|r| matches(r)) {
            Some(index) => {
                update(&mut rows[index]);
                rows[index].clone()
            }
            None => {
                let row = create(next_id);
                next_id += 1;
                rows.push(row.clone());
                row
            }
        };
        self.commit(&mut state, rows, next_id)?;
        Ok(row)
    }

    pub async fn get(&self, id: i64) -> Option<T> {
        let state = self.state.read().await;
        state.rows.iter().find(|r| r.id() == id).cloned()
    }

    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let state = self.state.read().await;
        state.rows.iter().find(|r| predicate(r)).cloned()
    }

    pub async fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let state = self.state.read().await;
        state.rows.iter().filter(|r| predicate(r)).cloned().collect()
    }

    pub async fn update(&self, id: i64, apply: impl FnOnce(&mut T)) -> Result<Option<T>> {
        let mut state = self.state.write().await;
        let Some(index) = state.rows.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        let mut rows = state.rows.clone();
        apply(&mut rows[index]);
        let updated = rows[index].clone();
        let next_id = state.next_id;
        self.commit(&mut state, rows, next_id)?;
        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.rows.iter().any(|r| r.id() == id) {
            return Ok(false);
        }
        let rows: Vec<T> = state.rows.iter().filter(|r| r.id() != id).cloned().collect();
        let next_id = state.next_id;
        self.commit(&mut state, rows, next_id)?;
        Ok(true)
    }

    pub async fn flush(&self) -> Result<()> {
        let state = self.state.read().await;
        self.save_to_disk(&state.rows, state.next_id)
    }

    fn commit(&self, state: &mut TableState<T>, rows: Vec<T>, next_id: i64) -> Result<()> {
        self.save_to_disk(&rows, next_id)?;
        state.rows = rows;
        state.next_id = next_id;
        Ok(())
    }

    fn save_to_disk(&self, rows: &[T], next_id: i64) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = TableFile { next_id, rows };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize table")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn max_id<T: Row>(rows: &[T]) -> i64 {
    rows.iter().map(Row::id).max().unwrap_or(0)
}

/// Persistent store for users, datasets and dashboards. Constructed once at
/// startup and shared by the services; call [`TableStore::close`] on
/// shutdown.
pub struct TableStore {
    pub(crate) users: JsonTable<User>,
    datasets: JsonTable<Dataset>,
    dashboards: JsonTable<Dashboard>,
}

impl TableStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            users: JsonTable::open(Some(dir.join(USERS_FILE)))?,
            datasets: JsonTable::open(Some(dir.join(DATASETS_FILE)))?,
            dashboards: JsonTable::open(Some(dir.join(DASHBOARDS_FILE)))?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            users: JsonTable::empty(),
            datasets: JsonTable::empty(),
            dashboards: JsonTable::empty(),
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.users.flush().await?;
        self.datasets.flush().await?;
        self.dashboards.flush().await?;
        tracing::debug!("table store flushed");
        Ok(())
    }

    pub async fn insert_dataset(&self, dataset: NewDataset) -> Result<Dataset> {
        self.datasets
            .insert_with(|id| Dataset::new(id, dataset))
            .await
    }

    pub async fn list_datasets(&self, user_id: i64) -> Result<Vec<Dataset>> {
        Ok(self.datasets.filter(|d| d.user_id == user_id).await)
    }

    pub async fn get_dataset(&self, id: i64) -> Result<Option<Dataset>> {
        Ok(self.datasets.get(id).await)
    }

    pub async fn delete_dataset(&self, id: i64) -> Result<bool> {
        self.datasets.delete(id).await
    }

    pub async fn insert_dashboard(&self, dashboard: NewDashboard) -> Result<Dashboard> {
        self.dashboards
            .insert_with(|id| Dashboard::new(id, dashboard))
            .await
    }

    pub async fn list_dashboards(&self, user_id: i64) -> Result<Vec<Dashboard>> {
        Ok(self.dashboards.filter(|d| d.user_id == user_id).await)
    }

    pub async fn get_dashboard(&self, id: i64) -> Result<Option<Dashboard>> {
        Ok(self.dashboards.get(id).await)
    }

    /// Replaces the whole configuration; nothing from the previous one is kept.
    pub async fn update_dashboard_config(&self, id: i64, config: DashboardConfig) -> Result<bool> {
        let updated = self
            .dashboards
            .update(id, |dashboard| {
                dashboard.config = config;
                dashboard.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    pub async fn delete_dashboard(&self, id: i64) -> Result<bool> {
        self.dashboards.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartConfig, ChartType, Theme};

    fn new_dataset(user_id: i64, name: &str) -> NewDataset {
        NewDataset {
            user_id,
            name: name.to_string(),
            description: None,
            file_name: format!("{name}.csv"),
            storage_key: format!("datasets/{user_id}/1-{name}.csv"),
            columns: vec!["a".to_string(), "b".to_string()],
            row_count: 3,
        }
    }

    fn config(chart_ids: &[&str]) -> DashboardConfig {
        DashboardConfig {
            title: "Overview".to_string(),
            theme: Theme::Light,
            charts: chart_ids
                .iter()
                .map(|id| ChartConfig {
                    id: id.to_string(),
                    chart_type: ChartType::Line,
                    title: id.to_string(),
                    x_axis: "a".to_string(),
                    y_axis: "b".to_string(),
                    color: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn ids_increment_and_are_not_reused() {
        let store = TableStore::in_memory();
        let first = store.insert_dataset(new_dataset(1, "one")).await.unwrap();
        let second = store.insert_dataset(new_dataset(1, "two")).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        assert!(store.delete_dataset(second.id).await.unwrap());
        let third = store.insert_dataset(new_dataset(1, "three")).await.unwrap();
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn list_only_returns_callers_rows() {
        let store = TableStore::in_memory();
        store.insert_dataset(new_dataset(1, "mine")).await.unwrap();
        store.insert_dataset(new_dataset(2, "theirs")).await.unwrap();

        let mine = store.list_datasets(1).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "mine");
    }

    #[tokio::test]
    async fn delete_missing_row_reports_false() {
        let store = TableStore::in_memory();
        assert!(!store.delete_dataset(42).await.unwrap());
        assert!(!store.delete_dashboard(42).await.unwrap());
    }

    #[tokio::test]
    async fn dashboard_config_update_replaces_charts() {
        let store = TableStore::in_memory();
        let dashboard = store
            .insert_dashboard(NewDashboard {
                user_id: 1,
                dataset_id: 1,
                name: "Board".to_string(),
                description: None,
                config: config(&["c1", "c2"]),
            })
            .await
            .unwrap();

        assert!(store
            .update_dashboard_config(dashboard.id, config(&["c2"]))
            .await
            .unwrap());

        let stored = store.get_dashboard(dashboard.id).await.unwrap().unwrap();
        assert_eq!(stored.config, config(&["c2"]));
        assert!(stored.updated_at >= dashboard.updated_at);
        assert!(!store.update_dashboard_config(99, config(&[])).await.unwrap());
    }

    #[tokio::test]
    async fn tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TableStore::open(dir.path()).unwrap();
            store.insert_dataset(new_dataset(7, "kept")).await.unwrap();
            store.close().await.unwrap();
        }

        let store = TableStore::open(dir.path()).unwrap();
        let datasets = store.list_datasets(7).await.unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].columns, vec!["a", "b"]);

        let next = store.insert_dataset(new_dataset(7, "next")).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn deleted_highest_id_is_not_reissued_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TableStore::open(dir.path()).unwrap();
            let first = store.insert_dataset(new_dataset(1, "first")).await.unwrap();
            let last = store.insert_dataset(new_dataset(1, "last")).await.unwrap();
            assert!(store.delete_dataset(last.id).await.unwrap());
            assert!(store.delete_dataset(first.id).await.unwrap());
            store.close().await.unwrap();
        }

        let store = TableStore::open(dir.path()).unwrap();
        let next = store.insert_dataset(new_dataset(2, "other")).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn plain_row_array_files_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(4, new_dataset(1, "legacy"));
        std::fs::write(
            dir.path().join(DATASETS_FILE),
            serde_json::to_string(&vec![dataset]).unwrap(),
        )
        .unwrap();

        let store = TableStore::open(dir.path()).unwrap();
        assert_eq!(store.list_datasets(1).await.unwrap().len(), 1);
        let next = store.insert_dataset(new_dataset(1, "new")).await.unwrap();
        assert_eq!(next.id, 5);
    }

    #[tokio::test]
    async fn failed_write_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::open(dir.path()).unwrap();
        let kept = store.insert_dataset(new_dataset(1, "kept")).await.unwrap();
        let board = store
            .insert_dashboard(NewDashboard {
                user_id: 1,
                dataset_id: kept.id,
                name: "Board".to_string(),
                description: None,
                config: config(&["c1"]),
            })
            .await
            .unwrap();

        // A directory in place of the table file makes every write fail.
        std::fs::remove_file(dir.path().join(DATASETS_FILE)).unwrap();
        std::fs::create_dir(dir.path().join(DATASETS_FILE)).unwrap();
        std::fs::remove_file(dir.path().join(DASHBOARDS_FILE)).unwrap();
        std::fs::create_dir(dir.path().join(DASHBOARDS_FILE)).unwrap();

        assert!(store.insert_dataset(new_dataset(1, "lost")).await.is_err());
        assert!(store.delete_dataset(kept.id).await.is_err());
        assert!(store
            .update_dashboard_config(board.id, config(&["c2"]))
            .await
            .is_err());

        let datasets = store.list_datasets(1).await.unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].id, kept.id);
        let stored = store.get_dashboard(board.id).await.unwrap().unwrap();
        assert_eq!(stored.config, config(&["c1"]));

        std::fs::remove_dir(dir.path().join(DATASETS_FILE)).unwrap();
        let next = store.insert_dataset(new_dataset(1, "next")).await.unwrap();
        assert_eq!(next.id, kept.id + 1);
    }
}
