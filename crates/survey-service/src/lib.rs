//! The survey data service.
//!
//! [`DataService`] loads a [`SurveyGraph`](survey_core::SurveyGraph) from a
//! [`RowStore`](survey_storage::RowStore), serves every list/get/save/delete
//! request from memory, and writes the whole graph back on flush.

pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use service::DataService;
