pub mod access;
pub mod api;
pub mod blob_store;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod services;
pub mod sessions;
pub mod storage;
pub mod user_models;
pub mod user_storage;
