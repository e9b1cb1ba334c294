pub mod ask;
pub mod ingest;
pub mod onboard;
pub mod serve;
pub mod status;
pub mod token;
