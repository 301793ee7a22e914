use sqlx::Row;

use payflow_core::domain::reference::{
    CategoryId, GroupId, Project, ProjectId, RiskRating, SpendCategory, User, UserGroup, UserId,
    UserRole, Vendor, VendorId,
};

use super::{ReferenceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlReferenceRepository {
    pool: DbPool,
}

impl SqlReferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_user_role(s: &str) -> UserRole {
    match s {
        "manager" => UserRole::Manager,
        "senior_manager" => UserRole::SeniorManager,
        "executive" => UserRole::Executive,
        _ => UserRole::Employee,
    }
}

pub(crate) fn user_role_as_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Employee => "employee",
        UserRole::Manager => "manager",
        UserRole::SeniorManager => "senior_manager",
        UserRole::Executive => "executive",
    }
}

pub(crate) fn parse_risk_rating(s: &str) -> RiskRating {
    match s {
        "medium" => RiskRating::Medium,
        "high" => RiskRating::High,
        _ => RiskRating::Low,
    }
}

pub(crate) fn risk_rating_as_str(rating: RiskRating) -> &'static str {
    match rating {
        RiskRating::Low => "low",
        RiskRating::Medium => "medium",
        RiskRating::High => "high",
    }
}

#[async_trait::async_trait]
impl ReferenceRepository for SqlReferenceRepository {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, role, department FROM app_user WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        Ok(Some(User {
            id: UserId(row.try_get("id").map_err(decode)?),
            name: row.try_get("name").map_err(decode)?,
            role: parse_user_role(&row.try_get::<String, _>("role").map_err(decode)?),
            department: row.try_get("department").map_err(decode)?,
        }))
    }

    async fn find_vendor(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, risk_rating, is_new, country, requires_compliance_review
             FROM vendor WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        Ok(Some(Vendor {
            id: VendorId(row.try_get("id").map_err(decode)?),
            name: row.try_get("name").map_err(decode)?,
            risk_rating: parse_risk_rating(
                &row.try_get::<String, _>("risk_rating").map_err(decode)?,
            ),
            is_new: row.try_get("is_new").map_err(decode)?,
            country: row.try_get("country").map_err(decode)?,
            requires_compliance_review: row
                .try_get("requires_compliance_review")
                .map_err(decode)?,
        }))
    }

    async fn find_category(
        &self,
        id: &CategoryId,
    ) -> Result<Option<SpendCategory>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, default_approver_id FROM spend_category WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        Ok(Some(SpendCategory {
            id: CategoryId(row.try_get("id").map_err(decode)?),
            name: row.try_get("name").map_err(decode)?,
            default_approver_id: row
                .try_get::<Option<String>, _>("default_approver_id")
                .map_err(decode)?
                .map(UserId),
        }))
    }

    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, name, project_manager_id FROM project WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        Ok(Some(Project {
            id: ProjectId(row.try_get("id").map_err(decode)?),
            name: row.try_get("name").map_err(decode)?,
            project_manager_id: row
                .try_get::<Option<String>, _>("project_manager_id")
                .map_err(decode)?
                .map(UserId),
        }))
    }

    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT group_id FROM group_member WHERE user_id = ?")
                .bind(&user_id.0)
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("group_id")
                    .map(GroupId)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }

    async fn save_user(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, name, role, department) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 role = excluded.role,
                 department = excluded.department",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(user_role_as_str(user.role))
        .bind(&user.department)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_vendor(&self, vendor: Vendor) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO vendor (id, name, risk_rating, is_new, country,
                                 requires_compliance_review)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 risk_rating = excluded.risk_rating,
                 is_new = excluded.is_new,
                 country = excluded.country,
                 requires_compliance_review = excluded.requires_compliance_review",
        )
        .bind(&vendor.id.0)
        .bind(&vendor.name)
        .bind(risk_rating_as_str(vendor.risk_rating))
        .bind(vendor.is_new)
        .bind(&vendor.country)
        .bind(vendor.requires_compliance_review)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_category(&self, category: SpendCategory) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO spend_category (id, name, default_approver_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 default_approver_id = excluded.default_approver_id",
        )
        .bind(&category.id.0)
        .bind(&category.name)
        .bind(category.default_approver_id.as_ref().map(|id| id.0.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_project(&self, project: Project) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO project (id, name, project_manager_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 project_manager_id = excluded.project_manager_id",
        )
        .bind(&project.id.0)
        .bind(&project.name)
        .bind(project.project_manager_id.as_ref().map(|id| id.0.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_group(&self, group: UserGroup) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_group (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&group.id.0)
        .bind(&group.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO group_member (group_id, user_id) VALUES (?, ?)
             ON CONFLICT(group_id, user_id) DO NOTHING",
        )
        .bind(&group_id.0)
        .bind(&user_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
