pub mod ingest;
pub mod registry;
pub mod transfer;
