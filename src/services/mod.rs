mod analysis_service;
mod analytics_service;
mod anthropic_types;
mod connector_service;
mod context_builder;
mod data_extraction;
mod document_service;
mod embedding_service;
mod enterprise_service;
mod llm_client;
mod prompt_templates;
mod query_classifier;
mod query_service;
mod ranking;
mod response_structurer;
mod text_processing;

pub use analysis_service::*;
pub use analytics_service::*;
pub use anthropic_types::*;
pub use connector_service::*;
pub use context_builder::*;
pub use data_extraction::*;
pub use document_service::*;
pub use embedding_service::*;
pub use enterprise_service::*;
pub use llm_client::*;
pub use prompt_templates::*;
pub use query_classifier::*;
pub use query_service::*;
pub use ranking::*;
pub use response_structurer::*;
pub use text_processing::*;
