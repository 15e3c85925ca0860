use crate::access::require_owner;
use crate::error::{Resource, ServiceError};
use crate::models::{
    CreateDashboardRequest, CreateDashboardResponse, Dashboard, DashboardConfig,
    DashboardWithDataset, NewDashboard,
};
use crate::storage::TableStore;
use std::sync::Arc;

use super::require_text;

pub struct DashboardService {
    store: Arc<TableStore>,
}

impl DashboardService {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }

    /// Saves a dashboard bound to one of the caller's datasets. Chart axes
    /// are stored as given; unmatched column names are only logged.
    pub async fn create(
        &self,
        owner_id: i64,
        request: CreateDashboardRequest,
    ) -> Result<CreateDashboardResponse, ServiceError> {
        require_text("name", &request.name)?;
        let dataset = require_owner(self.store.get_dataset(request.dataset_id).await?, owner_id)?;

        let unknown = request.config.unknown_axes(&dataset.columns);
        if !unknown.is_empty() {
            tracing::warn!(
                dataset_id = dataset.id,
                ?unknown,
                "dashboard references columns missing from its dataset"
            );
        }

        let dashboard = self
            .store
            .insert_dashboard(NewDashboard {
                user_id: owner_id,
                dataset_id: dataset.id,
                name: request.name,
                description: request.description,
                config: request.config,
            })
            .await?;

        tracing::info!(
            dashboard_id = dashboard.id,
            dataset_id = dataset.id,
            owner_id,
            "dashboard created"
        );

        Ok(CreateDashboardResponse {
            success: true,
            message: "Dashboard created successfully".to_string(),
            id: dashboard.id,
        })
    }

    pub async fn list(&self, owner_id: i64) -> Result<Vec<Dashboard>, ServiceError> {
        Ok(self.store.list_dashboards(owner_id).await?)
    }

    /// The embedded dataset is `None` when it has been deleted since or no
    /// longer belongs to the dashboard's owner.
    pub async fn get_by_id(
        &self,
        id: i64,
        owner_id: i64,
    ) -> Result<DashboardWithDataset, ServiceError> {
        let dashboard = require_owner(self.store.get_dashboard(id).await?, owner_id)?;
        let dataset = self
            .store
            .get_dataset(dashboard.dataset_id)
            .await?
            .filter(|dataset| dataset.user_id == dashboard.user_id);
        Ok(DashboardWithDataset { dashboard, dataset })
    }

    pub async fn update(
        &self,
        id: i64,
        owner_id: i64,
        config: DashboardConfig,
    ) -> Result<(), ServiceError> {
        let dashboard = require_owner(self.store.get_dashboard(id).await?, owner_id)?;
        let charts = config.charts.len();
        if !self.store.update_dashboard_config(dashboard.id, config).await? {
            return Err(ServiceError::NotFound(Resource::Dashboard));
        }
        tracing::info!(dashboard_id = id, owner_id, charts, "dashboard updated");
        Ok(())
    }

    pub async fn delete(&self, id: i64, owner_id: i64) -> Result<(), ServiceError> {
        let dashboard = require_owner(self.store.get_dashboard(id).await?, owner_id)?;
        if !self.store.delete_dashboard(dashboard.id).await? {
            return Err(ServiceError::NotFound(Resource::Dashboard));
        }
        tracing::info!(dashboard_id = id, owner_id, "dashboard deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartConfig, ChartType, NewDashboard, NewDataset, Theme};

    fn chart(id: &str) -> ChartConfig {
        ChartConfig {
            id: id.to_string(),
            chart_type: ChartType::Bar,
            title: id.to_uppercase(),
            x_axis: "month".to_string(),
            y_axis: "revenue".to_string(),
            color: None,
        }
    }

    fn config(charts: &[&str]) -> DashboardConfig {
        DashboardConfig {
            title: "Revenue".to_string(),
            theme: Theme::Light,
            charts: charts.iter().map(|id| chart(id)).collect(),
        }
    }

    async fn setup() -> (DashboardService, Arc<TableStore>, i64) {
        let store = Arc::new(TableStore::in_memory());
        let dataset = store
            .insert_dataset(NewDataset {
                user_id: 1,
                name: "Sales".to_string(),
                description: None,
                file_name: "sales.csv".to_string(),
                storage_key: "datasets/1/1-sales.csv".to_string(),
                columns: vec!["month".to_string(), "revenue".to_string()],
                row_count: 12,
            })
            .await
            .unwrap();
        (DashboardService::new(store.clone()), store, dataset.id)
    }

    fn create_request(dataset_id: i64, charts: &[&str]) -> CreateDashboardRequest {
        CreateDashboardRequest {
            dataset_id,
            name: "Board".to_string(),
            description: None,
            config: config(charts),
        }
    }

    #[tokio::test]
    async fn create_requires_owned_dataset() {
        let (service, _, dataset_id) = setup().await;

        assert!(matches!(
            service.create(2, create_request(dataset_id, &["c1"])).await.unwrap_err(),
            ServiceError::Forbidden(Resource::Dataset)
        ));
        assert!(matches!(
            service.create(1, create_request(dataset_id + 10, &["c1"])).await.unwrap_err(),
            ServiceError::NotFound(Resource::Dataset)
        ));

        let created = service.create(1, create_request(dataset_id, &["c1"])).await.unwrap();
        assert!(created.success);
        assert_eq!(service.list(1).await.unwrap().len(), 1);
        assert!(service.list(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmatched_axes_are_stored_as_given() {
        let (service, store, dataset_id) = setup().await;
        let mut request = create_request(dataset_id, &["c1"]);
        request.config.charts[0].y_axis = "profit".to_string();

        let id = service.create(1, request).await.unwrap().id;
        let stored = store.get_dashboard(id).await.unwrap().unwrap();
        assert_eq!(stored.config.charts[0].y_axis, "profit");
    }

    #[tokio::test]
    async fn update_replaces_whole_config() {
        let (service, _, dataset_id) = setup().await;
        let id = service
            .create(1, create_request(dataset_id, &["c1", "c2", "c3"]))
            .await
            .unwrap()
            .id;

        service.update(id, 1, config(&["c1", "c3"])).await.unwrap();

        let found = service.get_by_id(id, 1).await.unwrap();
        let ids: Vec<&str> = found
            .dashboard
            .config
            .charts
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn other_users_are_forbidden() {
        let (service, _, dataset_id) = setup().await;
        let id = service.create(1, create_request(dataset_id, &["c1"])).await.unwrap().id;

        for err in [
            service.get_by_id(id, 2).await.unwrap_err(),
            service.update(id, 2, config(&[])).await.unwrap_err(),
            service.delete(id, 2).await.unwrap_err(),
        ] {
            assert!(matches!(err, ServiceError::Forbidden(Resource::Dashboard)));
        }
        assert!(matches!(
            service.delete(id + 1, 1).await.unwrap_err(),
            ServiceError::NotFound(Resource::Dashboard)
        ));
    }

    #[tokio::test]
    async fn dataset_deletion_leaves_dashboard_readable() {
        let (service, store, dataset_id) = setup().await;
        let id = service.create(1, create_request(dataset_id, &["c1"])).await.unwrap().id;

        assert!(store.delete_dataset(dataset_id).await.unwrap());

        let found = service.get_by_id(id, 1).await.unwrap();
        assert_eq!(found.dashboard.id, id);
        assert!(found.dataset.is_none());

        service.delete(id, 1).await.unwrap();
        assert!(service.list(1).await.unwrap().is_empty());
    }

    fn dataset_for(user_id: i64, column: &str) -> NewDataset {
        NewDataset {
            user_id,
            name: format!("Data of {user_id}"),
            description: None,
            file_name: "data.csv".to_string(),
            storage_key: format!("datasets/{user_id}/1-data.csv"),
            columns: vec![column.to_string()],
            row_count: 1,
        }
    }

    #[tokio::test]
    async fn dangling_dashboard_does_not_embed_later_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard_id = {
            let store = Arc::new(TableStore::open(dir.path()).unwrap());
            let service = DashboardService::new(store.clone());
            let dataset = store.insert_dataset(dataset_for(1, "month")).await.unwrap();
            let id = service
                .create(1, create_request(dataset.id, &["c1"]))
                .await
                .unwrap()
                .id;
            assert!(store.delete_dataset(dataset.id).await.unwrap());
            store.close().await.unwrap();
            id
        };

        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        let service = DashboardService::new(store.clone());
        let theirs = store.insert_dataset(dataset_for(2, "secret_col")).await.unwrap();
        assert_ne!(theirs.id, 1);

        let found = service.get_by_id(dashboard_id, 1).await.unwrap();
        assert!(found.dataset.is_none());
    }

    #[tokio::test]
    async fn dataset_of_another_user_is_never_embedded() {
        let (service, store, _) = setup().await;
        let theirs = store.insert_dataset(dataset_for(2, "secret_col")).await.unwrap();
        let dashboard = store
            .insert_dashboard(NewDashboard {
                user_id: 1,
                dataset_id: theirs.id,
                name: "Board".to_string(),
                description: None,
                config: config(&["c1"]),
            })
            .await
            .unwrap();

        let found = service.get_by_id(dashboard.id, 1).await.unwrap();
        assert!(found.dataset.is_none());
    }
}
