use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Enterprise (tenant) profile
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Enterprise {
    pub id: i32,
    pub name: String,
    pub industry: Option<String>,
    pub fiscal_year_start: i32,
    pub currency: String,
    pub timezone: String,
    pub ai_instructions: Option<String>,
    pub data_retention_days: i32,
    #[serde(skip_serializing)]
    pub connected_systems: serde_json::Value,
    pub last_data_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enterprise {
    /// Industry label used in prompts
    pub fn industry_label(&self) -> &str {
        self.industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Business")
    }
}

/// Upsert payload for the caller's enterprise profile
#[derive(Debug, Deserialize, Validate)]
pub struct EnterpriseSettingsRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(max = 100, message = "Industry must be at most 100 characters"))]
    pub industry: Option<String>,
    #[validate(range(min = 1, max = 12, message = "Fiscal year start must be a month 1-12"))]
    pub fiscal_year_start: Option<i32>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Timezone must be 1-64 characters"))]
    pub timezone: Option<String>,
    #[validate(length(max = 4000, message = "AI instructions must be at most 4000 characters"))]
    pub ai_instructions: Option<String>,
    #[validate(range(min = 1, max = 36500, message = "Retention must be 1-36500 days"))]
    pub data_retention_days: Option<i32>,
}

/// Department within an enterprise
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Department {
    pub id: i32,
    pub enterprise_id: i32,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub specialized_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 10, message = "Code must be 1-10 characters"))]
    pub code: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 4000, message = "Instructions must be at most 4000 characters"))]
    pub specialized_instructions: Option<String>,
}

impl CreateDepartmentRequest {
    /// Department codes are stored upper-case
    pub fn normalized_code(&self) -> String {
        self.code.trim().to_uppercase()
    }
}
