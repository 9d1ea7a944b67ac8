use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Third-party systems documents can be pulled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorType {
    GoogleDrive,
    Dropbox,
    Salesforce,
    Sharepoint,
    Onedrive,
    Box,
    Database,
    ApiEndpoint,
}

impl ConnectorType {
    pub const ALL: [ConnectorType; 8] = [
        Self::GoogleDrive,
        Self::Dropbox,
        Self::Salesforce,
        Self::Sharepoint,
        Self::Onedrive,
        Self::Box,
        Self::Database,
        Self::ApiEndpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleDrive => "google_drive",
            Self::Dropbox => "dropbox",
            Self::Salesforce => "salesforce",
            Self::Sharepoint => "sharepoint",
            Self::Onedrive => "onedrive",
            Self::Box => "box",
            Self::Database => "database",
            Self::ApiEndpoint => "api_endpoint",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GoogleDrive => "Google Drive",
            Self::Dropbox => "Dropbox",
            Self::Salesforce => "Salesforce",
            Self::Sharepoint => "SharePoint",
            Self::Onedrive => "OneDrive",
            Self::Box => "Box",
            Self::Database => "Database",
            Self::ApiEndpoint => "API Endpoint",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::GoogleDrive => "Sync documents from Google Drive folders",
            Self::Dropbox => "Sync files from Dropbox folders",
            Self::Salesforce => "Import CRM records such as accounts, contacts and opportunities",
            Self::Sharepoint => "Sync document libraries from SharePoint sites",
            Self::Onedrive => "Sync files from OneDrive",
            Self::Box => "Sync files from Box folders",
            Self::Database => "Import query results from a SQL database",
            Self::ApiEndpoint => "Fetch a document from an HTTP endpoint",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::GoogleDrive => &["client_id", "client_secret", "folder_ids"],
            Self::Dropbox => &["app_key", "app_secret", "folder_paths"],
            Self::Salesforce => &[
                "client_id",
                "client_secret",
                "username",
                "password",
                "security_token",
            ],
            Self::ApiEndpoint => &["endpoint_url"],
            Self::Sharepoint | Self::Onedrive | Self::Box | Self::Database => &[],
        }
    }

    /// Whether `sync` can actually pull data for this connector
    pub fn supports_sync(&self) -> bool {
        matches!(self, Self::ApiEndpoint)
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown connector type '{}'", s))
    }
}

/// Catalog entry for the available-connectors endpoint
#[derive(Debug, Serialize)]
pub struct ConnectorInfo {
    pub connector_type: ConnectorType,
    pub name: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [&'static str],
    pub sync_supported: bool,
}

impl From<ConnectorType> for ConnectorInfo {
    fn from(connector_type: ConnectorType) -> Self {
        Self {
            connector_type,
            name: connector_type.display_name(),
            description: connector_type.description(),
            required_fields: connector_type.required_fields(),
            sync_supported: connector_type.supports_sync(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectorSetupRequest {
    #[serde(default)]
    pub configuration: serde_json::Map<String, serde_json::Value>,
    pub sync_schedule: Option<String>,
    pub is_active: Option<bool>,
}

/// Stored under `enterprises.connected_systems[<type>]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorEntry {
    pub connector_type: ConnectorType,
    pub status: String,
    pub configured_at: DateTime<Utc>,
    pub configured_by: i32,
    pub sync_schedule: String,
    pub is_active: bool,
    pub configuration: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_status: Option<String>,
    #[serde(default)]
    pub documents_synced: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub connector_type: ConnectorType,
    pub status: String,
    pub documents_synced: i64,
    pub message: String,
    pub synced_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_eight_connectors() {
        assert_eq!(ConnectorType::ALL.len(), 8);
        let names: Vec<&str> = ConnectorType::ALL.iter().map(|c| c.as_str()).collect();
        assert!(names.contains(&"google_drive"));
        assert!(names.contains(&"api_endpoint"));
    }

    #[test]
    fn test_parse_matches_serde_names() {
        for c in ConnectorType::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.as_str()));
            assert_eq!(c.as_str().parse::<ConnectorType>().unwrap(), c);
        }
        assert!("ftp".parse::<ConnectorType>().is_err());
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            ConnectorType::Dropbox.required_fields(),
            &["app_key", "app_secret", "folder_paths"]
        );
        assert_eq!(ConnectorType::Salesforce.required_fields().len(), 5);
        assert!(ConnectorType::Box.required_fields().is_empty());
    }

    #[test]
    fn test_only_api_endpoint_syncs() {
        assert!(ConnectorType::ApiEndpoint.supports_sync());
        assert!(!ConnectorType::GoogleDrive.supports_sync());
    }
}
