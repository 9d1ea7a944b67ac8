use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Extensions we can turn into text
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "csv", "json", "md"];

/// Categories offered even before any document uses them
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "financial",
    "hr",
    "legal",
    "operations",
    "marketing",
    "sales",
    "it",
    "compliance",
];

/// Lifecycle of background processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the raw bytes of a document are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        match file_extension(filename)?.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "csv" | "json" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Document row in the documents table
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnterpriseDocument {
    pub id: Uuid,
    pub enterprise_id: i32,
    pub department_id: Option<i32>,
    pub uploaded_by: i32,
    pub filename: String,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub content_hash: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    pub fiscal_period: Option<String>,
    pub processed: bool,
    pub processing_status: String,
    pub error_message: Option<String>,
    pub chunks_count: i32,
    pub processing_time_seconds: Option<f64>,
    pub metadata: serde_json::Value,
    pub access_count: i32,
    pub last_accessed: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query-string metadata accompanying a raw-body upload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadDocumentQuery {
    #[validate(length(min = 1, max = 255, message = "Filename must be 1-255 characters"))]
    pub filename: String,
    #[validate(length(max = 50, message = "Category must be at most 50 characters"))]
    pub category: Option<String>,
    pub department_id: Option<i32>,
    /// Comma-separated
    pub tags: Option<String>,
    pub is_confidential: Option<bool>,
    #[validate(length(max = 20, message = "Fiscal period must be at most 20 characters"))]
    pub fiscal_period: Option<String>,
}

/// Fully resolved upload handed to the document service
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub original_filename: String,
    pub content_type: Option<String>,
    pub category: Option<String>,
    pub department_id: Option<i32>,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    pub fiscal_period: Option<String>,
}

impl From<UploadDocumentQuery> for NewDocument {
    fn from(query: UploadDocumentQuery) -> Self {
        Self {
            original_filename: query.filename,
            content_type: None,
            category: query.category.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()),
            department_id: query.department_id,
            tags: parse_tags(query.tags.as_deref()),
            is_confidential: query.is_confidential.unwrap_or(false),
            fiscal_period: query.fiscal_period,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub category: Option<String>,
    pub department_id: Option<i32>,
    pub processed_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentContentQuery {
    pub chunk_limit: Option<i64>,
}

/// Returned right after upload, before processing finishes
#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub processing_status: String,
    pub message: String,
}

/// Stored chunk returned by the content endpoint
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoredChunk {
    pub chunk_index: i32,
    pub chunk_text: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentContent {
    pub document_id: Uuid,
    pub filename: String,
    pub total_chunks: i32,
    pub chunks: Vec<StoredChunk>,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DocumentStats {
    pub total_documents: i64,
    pub processed_documents: i64,
    pub processing_rate: f64,
    pub by_category: Vec<CategoryCount>,
    pub total_size_mb: f64,
    pub average_size_mb: f64,
}

/// Lower-cased extension without the dot
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Validate an upload before anything touches disk
pub fn validate_upload(filename: &str, file_size: usize, max_size: usize) -> Result<(), String> {
    let ext = file_extension(filename).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "File type '.{}' is not supported. Allowed: {}",
            ext,
            ALLOWED_EXTENSIONS
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    if file_size == 0 {
        return Err("File is empty".to_string());
    }

    if file_size > max_size {
        return Err(format!(
            "File size {} exceeds maximum allowed size of {} bytes",
            file_size, max_size
        ));
    }

    Ok(())
}

/// Split a comma-separated tag list, trimming and dropping blanks
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    let mut tags: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.dedup();
    tags
}

pub fn bytes_to_mb(bytes: i64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total` as a percentage rounded to 2 decimals; 0 when `total` is 0
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension_lowercases() {
        assert_eq!(file_extension("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".env"), None);
    }

    #[test]
    fn test_validate_upload_accepts_supported_types() {
        assert!(validate_upload("q3.pdf", 1024, 10_000).is_ok());
        assert!(validate_upload("ledger.csv", 1, 10_000).is_ok());
        assert!(validate_upload("notes.md", 5, 10_000).is_ok());
    }

    #[test]
    fn test_validate_upload_rejects_unknown_extension() {
        let err = validate_upload("malware.exe", 10, 10_000).unwrap_err();
        assert!(err.contains(".exe"));
    }

    #[test]
    fn test_validate_upload_rejects_empty_and_oversize() {
        assert_eq!(validate_upload("a.txt", 0, 100).unwrap_err(), "File is empty");
        assert!(validate_upload("a.txt", 101, 100).unwrap_err().contains("exceeds"));
        assert!(validate_upload("a.txt", 100, 100).is_ok());
    }

    #[test]
    fn test_document_kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("a.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("a.JSON"), Some(DocumentKind::PlainText));
        assert_eq!(DocumentKind::from_filename("a.docx"), None);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(Some(" Q3, budget ,,Board")), vec!["q3", "budget", "board"]);
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn test_upload_query_into_new_document_normalizes_category() {
        let query = UploadDocumentQuery {
            filename: "p&l.csv".to_string(),
            category: Some(" Financial ".to_string()),
            department_id: Some(2),
            tags: Some("q1".to_string()),
            is_confidential: None,
            fiscal_period: Some("Q1-2024".to_string()),
        };
        let doc = NewDocument::from(query);
        assert_eq!(doc.category.as_deref(), Some("financial"));
        assert!(!doc.is_confidential);
        assert_eq!(doc.tags, vec!["q1"]);
    }

    #[test]
    fn test_bytes_to_mb_rounds() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1_572_864), 1.5);
        assert_eq!(bytes_to_mb(0), 0.0);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(5, 5), 100.0);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn test_processing_status_strings() {
        assert_eq!(ProcessingStatus::Pending.as_str(), "pending");
        assert_eq!(ProcessingStatus::Failed.to_string(), "failed");
    }
}
