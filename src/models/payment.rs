use sqlx::SqlitePool;
use time::Date;

use crate::error::{AppError, AppResult};
use crate::models::member::Member;

/// A fee paid by a member, usually the yearly membership fee
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    /// The member who paid
    pub member_id: i64,
    /// How much was paid, in whole kronor
    pub amount: i64,
    /// The membership year the payment is for
    pub year: i64,
    /// When the money arrived
    pub paid_on: Date,
    pub description: Option<String>,
}

/// A payment along with the name of the member who made it
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PaymentWithMember {
    #[sqlx(flatten)]
    pub payment: Payment,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug)]
pub struct NewPayment {
    pub member_id: i64,
    pub amount: i64,
    pub year: i64,
    pub paid_on: Date,
    pub description: Option<String>,
}

impl Payment {
    pub const MIN_YEAR: i64 = 1900;
    pub const MAX_YEAR: i64 = 2100;

    pub async fn with_id(id: i64, pool: &SqlitePool) -> AppResult<Self> {
        sqlx::query_as("SELECT * FROM payment WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// The member's payments, newest first
    pub async fn for_member(member_id: i64, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as("SELECT * FROM payment WHERE member_id = ? ORDER BY year DESC, paid_on DESC")
            .bind(member_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn for_year(year: i64, pool: &SqlitePool) -> AppResult<Vec<PaymentWithMember>> {
        sqlx::query_as(
            "SELECT payment.*, member.first_name, member.last_name
             FROM payment INNER JOIN member ON payment.member_id = member.id
             WHERE payment.year = ?
             ORDER BY member.last_name, member.first_name, payment.paid_on",
        )
        .bind(year)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Every year that has payments, newest first
    pub async fn years(pool: &SqlitePool) -> AppResult<Vec<i64>> {
        sqlx::query_scalar("SELECT DISTINCT year FROM payment ORDER BY year DESC")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn total_for_member_year(member_id: i64, year: i64, pool: &SqlitePool) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payment WHERE member_id = ? AND year = ?",
        )
        .bind(member_id)
        .bind(year)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Members who have no payment registered for the year
    pub async fn members_without_payment(year: i64, pool: &SqlitePool) -> AppResult<Vec<Member>> {
        sqlx::query_as(
            "SELECT * FROM member WHERE id NOT IN
             (SELECT member_id FROM payment WHERE year = ?)
             ORDER BY last_name, first_name",
        )
        .bind(year)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new_payment: NewPayment, pool: &SqlitePool) -> AppResult<i64> {
        if new_payment.amount <= 0 {
            return Err(AppError::bad_request("The amount must be more than zero"));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&new_payment.year) {
            return Err(AppError::bad_request(format!(
                "The year must be between {} and {}",
                Self::MIN_YEAR,
                Self::MAX_YEAR
            )));
        }
        Member::with_id(new_payment.member_id, pool).await?;

        let result = sqlx::query(
            "INSERT INTO payment (member_id, amount, year, paid_on, description)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_payment.member_id)
        .bind(new_payment.amount)
        .bind(new_payment.year)
        .bind(new_payment.paid_on)
        .bind(&new_payment.description)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn delete(id: i64, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM payment WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}
