use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded CSV. `columns` and `row_count` are captured at upload time
/// and never recomputed from the stored blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub columns: Vec<String>,
    pub row_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDataset {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub columns: Vec<String>,
    pub row_count: u64,
}

impl Dataset {
    pub fn new(id: i64, new: NewDataset) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: new.user_id,
            name: new.name,
            description: new.description,
            file_name: new.file_name,
            storage_key: new.storage_key,
            columns: new.columns,
            row_count: new.row_count,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// A single chart. `x_axis` and `y_axis` are free-text column references;
/// nothing ties them to the bound dataset's actual columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub title: String,
    pub theme: Theme,
    pub charts: Vec<ChartConfig>,
}

impl DashboardConfig {
    /// Axis references that do not name a column of `columns`, in chart order.
    pub fn unknown_axes<'a>(&'a self, columns: &[String]) -> Vec<&'a str> {
        self.charts
            .iter()
            .flat_map(|chart| [chart.x_axis.as_str(), chart.y_axis.as_str()])
            .filter(|axis| !columns.iter().any(|c| c == axis))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: i64,
    pub user_id: i64,
    pub dataset_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub config: DashboardConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDashboard {
    pub user_id: i64,
    pub dataset_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub config: DashboardConfig,
}

impl Dashboard {
    pub fn new(id: i64, new: NewDashboard) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: new.user_id,
            dataset_id: new.dataset_id,
            name: new.name,
            description: new.description,
            config: new.config,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDatasetRequest {
    pub file_name: String,
    pub file_content: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDatasetResponse {
    pub success: bool,
    pub message: String,
    pub id: i64,
    pub columns: Vec<String>,
    pub row_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetWithUrl {
    #[serde(flatten)]
    pub dataset: Dataset,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDashboardRequest {
    pub dataset_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub config: DashboardConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDashboardResponse {
    pub success: bool,
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateDashboardRequest {
    pub config: DashboardConfig,
}

/// A dashboard with its bound dataset. `dataset` is `None` once the dataset
/// has been deleted; dashboards are not cascaded.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardWithDataset {
    #[serde(flatten)]
    pub dashboard: Dashboard,
    pub dataset: Option<Dataset>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
