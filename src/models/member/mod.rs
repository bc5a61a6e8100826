use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::error::{AppError, AppResult};
use crate::models::on_conflict;
use crate::models::role::Role;
use crate::util::{current_time, hash_password, normalize_email, verify_password};

pub mod auth_token;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    /// The member's email, which must be unique
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub birth_year: Option<i64>,
    /// Sailing experience, in the member's own words
    pub skill: Option<String>,
    /// Notes kept by the board
    pub comments: Option<String>,
    /// Unset until the member has registered and activated a login
    pub pass_hash: Option<String>,
    pub is_admin: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The fields an administrator fills in when adding or editing a member.
#[derive(Clone, Debug, Default)]
pub struct NewMember {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub birth_year: Option<i64>,
    pub skill: Option<String>,
    pub comments: Option<String>,
    pub is_admin: bool,
}

/// The fields members may change about themselves.
#[derive(Clone, Debug, Default)]
pub struct ContactUpdate {
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub skill: Option<String>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether the member has activated a login
    pub fn has_login(&self) -> bool {
        self.pass_hash.is_some()
    }

    pub async fn with_id(id: i64, pool: &SqlitePool) -> AppResult<Self> {
        Self::with_id_opt(id, pool).await?.ok_or(AppError::NotFound)
    }

    pub async fn with_id_opt(id: i64, pool: &SqlitePool) -> AppResult<Option<Self>> {
        sqlx::query_as("SELECT * FROM member WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_email_opt(email: &str, pool: &SqlitePool) -> AppResult<Option<Self>> {
        sqlx::query_as("SELECT * FROM member WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn all(pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as("SELECT * FROM member ORDER BY last_name, first_name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Members whose name or email contains `query`
    pub async fn search(query: &str, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        let pattern = format!("%{}%", query.trim());
        sqlx::query_as(
            "SELECT * FROM member
             WHERE first_name LIKE ?1 OR last_name LIKE ?1 OR email LIKE ?1
                OR (first_name || ' ' || last_name) LIKE ?1
             ORDER BY last_name, first_name",
        )
        .bind(pattern)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Members holding the given role
    pub async fn with_role(role_id: i64, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as(
            "SELECT * FROM member WHERE id IN
             (SELECT member_id FROM member_role WHERE role_id = ?)
             ORDER BY last_name, first_name",
        )
        .bind(role_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new_member: NewMember, pool: &SqlitePool) -> AppResult<i64> {
        let email = normalize_email(&new_member.email);
        if Self::with_email_opt(&email, pool).await?.is_some() {
            return Err(AppError::bad_request(format!(
                "Another member already has the email {email}"
            )));
        }

        let now = current_time().unix_timestamp();
        let result = sqlx::query(
            "INSERT INTO member
             (email, first_name, last_name, phone, street, postal_code, city,
              birth_year, skill, comments, is_admin, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&email)
        .bind(&new_member.first_name)
        .bind(&new_member.last_name)
        .bind(&new_member.phone)
        .bind(&new_member.street)
        .bind(&new_member.postal_code)
        .bind(&new_member.city)
        .bind(new_member.birth_year)
        .bind(&new_member.skill)
        .bind(&new_member.comments)
        .bind(new_member.is_admin)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(on_conflict(format!("Another member already has the email {email}")))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(id: i64, update: NewMember, pool: &SqlitePool) -> AppResult<()> {
        let email = normalize_email(&update.email);
        if let Some(other) = Self::with_email_opt(&email, pool).await? {
            if other.id != id {
                return Err(AppError::bad_request(format!(
                    "Cannot change email to {email}, as another member has that email"
                )));
            }
        }

        let result = sqlx::query(
            "UPDATE member SET
             email = ?, first_name = ?, last_name = ?, phone = ?, street = ?,
             postal_code = ?, city = ?, birth_year = ?, skill = ?, comments = ?,
             is_admin = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .bind(&update.street)
        .bind(&update.postal_code)
        .bind(&update.city)
        .bind(update.birth_year)
        .bind(&update.skill)
        .bind(&update.comments)
        .bind(update.is_admin)
        .bind(current_time().unix_timestamp())
        .bind(id)
        .execute(pool)
        .await
        .map_err(on_conflict(format!(
            "Cannot change email to {email}, as another member has that email"
        )))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn update_contact(id: i64, update: ContactUpdate, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE member SET
             phone = ?, street = ?, postal_code = ?, city = ?, skill = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.phone)
        .bind(&update.street)
        .bind(&update.postal_code)
        .bind(&update.city)
        .bind(&update.skill)
        .bind(current_time().unix_timestamp())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Deletes a member along with their payments, roles and sailing places.
    pub async fn delete(id: i64, pool: &SqlitePool) -> AppResult<()> {
        let member = Self::with_id(id, pool).await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM auth_token WHERE email = ?")
            .bind(&member.email)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM member WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn set_password(email: &str, pass_hash: &str, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query("UPDATE member SET pass_hash = ?, updated_at = ? WHERE email = ?")
            .bind(pass_hash)
            .bind(current_time().unix_timestamp())
            .bind(normalize_email(email))
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Checks a login attempt, returning the member if the password matches.
    ///
    /// Members who haven't activated a login yet never match. Unknown emails
    /// and missing logins still run bcrypt once, so they answer as slowly as a
    /// wrong password.
    pub async fn login(email: &str, password: &str, pool: &SqlitePool) -> AppResult<Option<Self>> {
        let member = Self::with_email_opt(email, pool).await?;
        let Some(pass_hash) = member.as_ref().and_then(|member| member.pass_hash.as_deref()) else {
            verify_password(password, dummy_hash().await?).await?;
            return Ok(None);
        };

        if verify_password(password, pass_hash).await? {
            Ok(member)
        } else {
            Ok(None)
        }
    }

    pub async fn roles(&self, pool: &SqlitePool) -> AppResult<Vec<Role>> {
        Role::for_member(self.id, pool).await
    }
}

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// A hash no password is expected to match, made on first use.
async fn dummy_hash() -> AppResult<&'static str> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password("ingen medlem har det här lösenordet", bcrypt::DEFAULT_COST))
        .await?;
    Ok(hash.as_str())
}
