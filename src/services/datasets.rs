use crate::access::require_owner;
use crate::blob_store::{dataset_storage_key, next_upload_stamp, BlobStore};
use crate::error::{Resource, ServiceError};
use crate::ingest::summarize_csv;
use crate::models::{
    Dataset, DatasetWithUrl, NewDataset, UploadDatasetRequest, UploadDatasetResponse,
};
use crate::storage::TableStore;
use anyhow::Context;
use std::sync::Arc;

use super::require_text;

const CSV_CONTENT_TYPE: &str = "text/csv";

pub struct DatasetService {
    store: Arc<TableStore>,
    blobs: Arc<dyn BlobStore>,
}

impl DatasetService {
    pub fn new(store: Arc<TableStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Ingests the CSV, stores the raw file and records the dataset.
    ///
    /// Nothing is written when ingestion fails. A failed record write after a
    /// successful blob write leaves the blob behind.
    pub async fn upload(
        &self,
        owner_id: i64,
        request: UploadDatasetRequest,
    ) -> Result<UploadDatasetResponse, ServiceError> {
        require_text("name", &request.name)?;
        require_text("fileName", &request.file_name)?;
        let summary = summarize_csv(&request.file_content)?;

        let storage_key = dataset_storage_key(owner_id, next_upload_stamp(), &request.file_name);
        self.blobs
            .put(&storage_key, request.file_content.as_bytes(), CSV_CONTENT_TYPE)
            .await
            .context("Failed to store uploaded file")?;

        let dataset = self
            .store
            .insert_dataset(NewDataset {
                user_id: owner_id,
                name: request.name,
                description: request.description,
                file_name: request.file_name,
                storage_key,
                columns: summary.columns,
                row_count: summary.row_count,
            })
            .await
            .context("Failed to record dataset")?;

        tracing::info!(
            dataset_id = dataset.id,
            owner_id,
            columns = dataset.columns.len(),
            rows = dataset.row_count,
            "dataset uploaded"
        );

        Ok(UploadDatasetResponse {
            success: true,
            message: "Dataset uploaded successfully".to_string(),
            id: dataset.id,
            columns: dataset.columns,
            row_count: dataset.row_count,
        })
    }

    pub async fn list(&self, owner_id: i64) -> Result<Vec<Dataset>, ServiceError> {
        Ok(self.store.list_datasets(owner_id).await?)
    }

    /// Returns the dataset with a freshly resolved download URL.
    pub async fn get_by_id(&self, id: i64, owner_id: i64) -> Result<DatasetWithUrl, ServiceError> {
        let dataset = require_owner(self.store.get_dataset(id).await?, owner_id)?;
        let download_url = self
            .blobs
            .get(&dataset.storage_key)
            .await
            .context("Failed to resolve download URL")?;

        Ok(DatasetWithUrl {
            dataset,
            download_url,
        })
    }

    /// Removes the record only. The blob and any dashboards bound to the
    /// dataset are left in place.
    pub async fn delete(&self, id: i64, owner_id: i64) -> Result<(), ServiceError> {
        let dataset = require_owner(self.store.get_dataset(id).await?, owner_id)?;
        if !self.store.delete_dataset(dataset.id).await? {
            return Err(ServiceError::NotFound(Resource::Dataset));
        }
        tracing::info!(dataset_id = id, owner_id, "dataset deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::MemoryBlobStore;

    fn setup() -> (DatasetService, Arc<TableStore>, Arc<MemoryBlobStore>) {
        let store = Arc::new(TableStore::in_memory());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = DatasetService::new(store.clone(), blobs.clone());
        (service, store, blobs)
    }

    fn upload_request(content: &str) -> UploadDatasetRequest {
        UploadDatasetRequest {
            file_name: "sales.csv".to_string(),
            file_content: content.to_string(),
            name: "Sales".to_string(),
            description: Some("Q1".to_string()),
        }
    }

    #[tokio::test]
    async fn upload_records_columns_rows_and_blob() {
        let (service, store, blobs) = setup();
        let response = service
            .upload(1, upload_request("a,b,c\n1,2,3\n4,5,6\n"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.columns, vec!["a", "b", "c"]);
        assert_eq!(response.row_count, 2);

        let dataset = store.get_dataset(response.id).await.unwrap().unwrap();
        assert!(dataset.storage_key.starts_with("datasets/1/"));
        assert!(dataset.storage_key.ends_with("-sales.csv"));
        assert_eq!(
            blobs.contents(&dataset.storage_key).await.unwrap(),
            b"a,b,c\n1,2,3\n4,5,6\n"
        );
    }

    #[tokio::test]
    async fn invalid_csv_writes_nothing() {
        let (service, store, blobs) = setup();
        for content in ["", "a,b,c\n"] {
            let err = service.upload(1, upload_request(content)).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(blobs.is_empty().await);
        assert!(store.list_datasets(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_uploads_get_distinct_keys() {
        let (service, store, blobs) = setup();
        for _ in 0..5 {
            service.upload(1, upload_request("a\n1\n")).await.unwrap();
        }
        assert_eq!(blobs.len().await, 5);
        assert_eq!(store.list_datasets(1).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn get_and_delete_are_owner_checked() {
        let (service, store, _) = setup();
        let id = service.upload(1, upload_request("a\n1\n")).await.unwrap().id;

        let found = service.get_by_id(id, 1).await.unwrap();
        assert_eq!(found.download_url, format!("memory://{}", found.dataset.storage_key));

        assert!(matches!(
            service.get_by_id(id, 2).await.unwrap_err(),
            ServiceError::Forbidden(Resource::Dataset)
        ));
        assert!(matches!(
            service.delete(id, 2).await.unwrap_err(),
            ServiceError::Forbidden(Resource::Dataset)
        ));
        assert!(matches!(
            service.get_by_id(id + 1, 1).await.unwrap_err(),
            ServiceError::NotFound(Resource::Dataset)
        ));

        service.delete(id, 1).await.unwrap();
        assert!(store.get_dataset(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_record_write_is_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TableStore::open(dir.path()).unwrap());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = DatasetService::new(store.clone(), blobs.clone());

        std::fs::create_dir(dir.path().join("datasets.json")).unwrap();

        let err = service.upload(1, upload_request("a\n1\n")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
        assert!(service.list(1).await.unwrap().is_empty());
        // The blob written before the record stays behind.
        assert_eq!(blobs.len().await, 1);
    }
}
