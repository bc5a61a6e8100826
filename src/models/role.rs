use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::member::Member;
use crate::models::on_conflict;

/// Roles held by members, e.g. skipper or board member
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    /// The name of the role, which must be unique
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    /// The form names are compared in. SQLite only folds ASCII case, so the
    /// folding happens here and the key column holds the result.
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub async fn all(pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as("SELECT * FROM role ORDER BY name_key")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_id(id: i64, pool: &SqlitePool) -> AppResult<Self> {
        Self::with_id_opt(id, pool).await?.ok_or(AppError::NotFound)
    }

    pub async fn with_id_opt(id: i64, pool: &SqlitePool) -> AppResult<Option<Self>> {
        sqlx::query_as("SELECT * FROM role WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_name_opt(name: &str, pool: &SqlitePool) -> AppResult<Option<Self>> {
        sqlx::query_as("SELECT * FROM role WHERE name_key = ?")
            .bind(Self::name_key(name))
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn for_member(member_id: i64, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as(
            "SELECT * FROM role WHERE id IN
             (SELECT role_id FROM member_role WHERE member_id = ?)
             ORDER BY name",
        )
        .bind(member_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new_role: NewRole, pool: &SqlitePool) -> AppResult<i64> {
        let name = new_role.name.trim();
        if Self::with_name_opt(name, pool).await?.is_some() {
            return Err(AppError::bad_request(format!("A role named {name} already exists")));
        }

        let result = sqlx::query("INSERT INTO role (name, name_key, description) VALUES (?, ?, ?)")
            .bind(name)
            .bind(Self::name_key(name))
            .bind(&new_role.description)
            .execute(pool)
            .await
            .map_err(on_conflict(format!("A role named {name} already exists")))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(id: i64, update: NewRole, pool: &SqlitePool) -> AppResult<()> {
        let name = update.name.trim();
        let result =
            sqlx::query("UPDATE role SET name = ?, name_key = ?, description = ? WHERE id = ?")
                .bind(name)
                .bind(Self::name_key(name))
                .bind(&update.description)
                .bind(id)
                .execute(pool)
                .await
                .map_err(on_conflict(format!("A role named {name} already exists")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Deletes the role; members lose it and sailing crew positions using it are cleared.
    pub async fn delete(id: i64, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM role WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn member_has_role(member_id: i64, role_id: i64, pool: &SqlitePool) -> AppResult<bool> {
        let held: Option<i64> =
            sqlx::query_scalar("SELECT role_id FROM member_role WHERE member_id = ? AND role_id = ?")
                .bind(member_id)
                .bind(role_id)
                .fetch_optional(pool)
                .await?;

        Ok(held.is_some())
    }

    pub async fn assign(member_id: i64, role_id: i64, pool: &SqlitePool) -> AppResult<()> {
        Member::with_id(member_id, pool).await?;
        let role = Self::with_id(role_id, pool).await?;
        if Self::member_has_role(member_id, role_id, pool).await? {
            return Err(AppError::bad_request(format!(
                "The member already has the role {}",
                role.name
            )));
        }

        sqlx::query("INSERT INTO member_role (member_id, role_id) VALUES (?, ?)")
            .bind(member_id)
            .bind(role_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn unassign(member_id: i64, role_id: i64, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM member_role WHERE member_id = ? AND role_id = ?")
            .bind(member_id)
            .bind(role_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::bad_request("The member does not have that role"));
        }

        Ok(())
    }
}
