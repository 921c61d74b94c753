pub(crate) mod ingest;
pub(crate) mod registry;
pub(crate) mod serve;
pub(crate) mod transfer;
