use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{CreateDepartmentRequest, Department, Enterprise, EnterpriseSettingsRequest},
};

/// Enterprise profile and department management
pub struct EnterpriseService {
    db: PgPool,
}

impl EnterpriseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, enterprise_id: i32) -> AppResult<Enterprise> {
        sqlx::query_as::<_, Enterprise>("SELECT * FROM enterprises WHERE id = $1")
            .bind(enterprise_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Enterprise not found".to_string()))
    }

    /// Create the profile on first save, update it afterwards
    pub async fn upsert(
        &self,
        enterprise_id: i32,
        req: &EnterpriseSettingsRequest,
    ) -> AppResult<Enterprise> {
        let enterprise = sqlx::query_as::<_, Enterprise>(
            r#"
            INSERT INTO enterprises
            (id, name, industry, fiscal_year_start, currency, timezone, ai_instructions, data_retention_days)
            VALUES ($1, $2, $3, COALESCE($4, 1), COALESCE($5, 'USD'), COALESCE($6, 'UTC'), $7, COALESCE($8, 2555))
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                industry = COALESCE($3, enterprises.industry),
                fiscal_year_start = COALESCE($4, enterprises.fiscal_year_start),
                currency = COALESCE($5, enterprises.currency),
                timezone = COALESCE($6, enterprises.timezone),
                ai_instructions = COALESCE($7, enterprises.ai_instructions),
                data_retention_days = COALESCE($8, enterprises.data_retention_days),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(enterprise_id)
        .bind(req.name.trim())
        .bind(&req.industry)
        .bind(req.fiscal_year_start)
        .bind(req.currency.as_deref().map(str::to_uppercase))
        .bind(&req.timezone)
        .bind(&req.ai_instructions)
        .bind(req.data_retention_days)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(enterprise_id, "Enterprise settings saved");
        Ok(enterprise)
    }

    pub async fn list_departments(&self, enterprise_id: i32) -> AppResult<Vec<Department>> {
        let departments = sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE enterprise_id = $1 ORDER BY name",
        )
        .bind(enterprise_id)
        .fetch_all(&self.db)
        .await?;

        Ok(departments)
    }

    pub async fn find_department(
        &self,
        enterprise_id: i32,
        department_id: i32,
    ) -> AppResult<Option<Department>> {
        let department = sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE id = $1 AND enterprise_id = $2",
        )
        .bind(department_id)
        .bind(enterprise_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(department)
    }

    pub async fn create_department(
        &self,
        enterprise_id: i32,
        req: &CreateDepartmentRequest,
    ) -> AppResult<Department> {
        // Departments hang off an existing profile
        self.get(enterprise_id).await?;

        let code = req.normalized_code();
        let result = sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (enterprise_id, name, code, description, specialized_instructions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(enterprise_id)
        .bind(req.name.trim())
        .bind(&code)
        .bind(&req.description)
        .bind(&req.specialized_instructions)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(department) => Ok(department),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("Department code '{}' already exists", code),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
