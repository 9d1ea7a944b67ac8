use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_environment")]
    pub environment: String,

    pub anthropic_api_key: Option<SecretString>,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    pub openai_api_key: Option<SecretString>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Upload size ceiling in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_max_retrieved_chunks")]
    pub max_retrieved_chunks: usize,

    /// Character budget for the assembled prompt context
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,

    #[serde(default = "default_connector_timeout_secs")]
    pub connector_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    10
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_llm_temperature() -> f32 {
    0.1
}

fn default_llm_max_tokens() -> u32 {
    2000
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_upload_dir() -> String {
    "./enterprise_uploads".to_string()
}

fn default_max_file_size() -> usize {
    100 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    400
}

fn default_similarity_threshold() -> f64 {
    0.6
}

fn default_max_retrieved_chunks() -> usize {
    15
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_rate_limit_per_minute() -> usize {
    60
}

fn default_connector_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Configuration with every optional field at its default. Used by tests
    /// and tooling that never touch the network.
    pub fn with_database_url(database_url: &str) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: database_url.to_string(),
            database_max_connections: default_max_connections(),
            environment: default_environment(),
            anthropic_api_key: None,
            anthropic_base_url: default_anthropic_base_url(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            llm_model: default_llm_model(),
            llm_temperature: default_llm_temperature(),
            llm_max_tokens: default_llm_max_tokens(),
            embedding_model: default_embedding_model(),
            upload_dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_threshold: default_similarity_threshold(),
            max_retrieved_chunks: default_max_retrieved_chunks(),
            max_context_chars: default_max_context_chars(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            connector_timeout_secs: default_connector_timeout_secs(),
        }
    }

    pub fn anthropic_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_ref().map(|k| k.expose_secret())
    }

    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key.as_ref().map(|k| k.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::with_database_url("postgres://localhost/test");
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 400);
        assert!((config.similarity_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.max_retrieved_chunks, 15);
        assert_eq!(config.max_file_size, 104_857_600);
        assert_eq!(config.rate_limit_per_minute, 60);
    }

    #[test]
    fn test_keys_absent_by_default() {
        let config = Config::with_database_url("postgres://localhost/test");
        assert!(config.anthropic_key().is_none());
        assert!(config.openai_key().is_none());
    }

    #[test]
    fn test_anthropic_key_exposes_secret() {
        let mut config = Config::with_database_url("postgres://localhost/test");
        config.anthropic_api_key = Some(SecretString::from("sk-ant-test"));
        assert_eq!(config.anthropic_key(), Some("sk-ant-test"));
    }
}
