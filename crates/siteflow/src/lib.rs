pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod poller;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workflow;

pub use error::ProvisionError;
