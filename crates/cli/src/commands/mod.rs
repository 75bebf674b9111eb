pub mod alerts;
pub mod anomalies;
pub mod experiments;
pub mod ingest;
pub mod models;
pub mod status;
