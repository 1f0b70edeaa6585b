pub mod jobs;
pub mod operations;
pub mod records;
pub mod webhooks;
