use sqlx::SqlitePool;
use time::Date;

use crate::error::{AppError, AppResult};

pub mod participant;

/// A sailing trip arranged by the association
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Sailing {
    pub id: i64,
    pub name: String,
    /// The day the crew sets off
    pub start_date: Date,
    /// The day the boat is back in port, no earlier than `start_date`
    pub end_date: Date,
    pub start_point: Option<String>,
    pub destination: Option<String>,
    pub comments: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewSailing {
    pub name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub start_point: Option<String>,
    pub destination: Option<String>,
    pub comments: Option<String>,
}

impl NewSailing {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::bad_request("The sailing needs a name"));
        }
        if self.end_date < self.start_date {
            return Err(AppError::bad_request(
                "The sailing can't end before it starts",
            ));
        }

        Ok(())
    }
}

impl Sailing {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).whole_days() + 1
    }

    pub async fn with_id(id: i64, pool: &SqlitePool) -> AppResult<Self> {
        Self::with_id_opt(id, pool).await?.ok_or(AppError::NotFound)
    }

    pub async fn with_id_opt(id: i64, pool: &SqlitePool) -> AppResult<Option<Self>> {
        sqlx::query_as("SELECT * FROM sailing WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Every sailing, newest first
    pub async fn all(pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as("SELECT * FROM sailing ORDER BY start_date DESC, name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Sailings that haven't ended by `today`, soonest first
    pub async fn upcoming(today: Date, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as("SELECT * FROM sailing WHERE end_date >= ? ORDER BY start_date, name")
            .bind(today)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// The sailings the member is signed up for, newest first
    pub async fn for_member(member_id: i64, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as(
            "SELECT * FROM sailing WHERE id IN
             (SELECT sailing_id FROM sailing_participant WHERE member_id = ?)
             ORDER BY start_date DESC",
        )
        .bind(member_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new_sailing: NewSailing, pool: &SqlitePool) -> AppResult<i64> {
        new_sailing.validate()?;

        let result = sqlx::query(
            "INSERT INTO sailing (name, start_date, end_date, start_point, destination, comments)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_sailing.name.trim())
        .bind(new_sailing.start_date)
        .bind(new_sailing.end_date)
        .bind(&new_sailing.start_point)
        .bind(&new_sailing.destination)
        .bind(&new_sailing.comments)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(id: i64, update: NewSailing, pool: &SqlitePool) -> AppResult<()> {
        update.validate()?;

        let result = sqlx::query(
            "UPDATE sailing SET
             name = ?, start_date = ?, end_date = ?, start_point = ?, destination = ?, comments = ?
             WHERE id = ?",
        )
        .bind(update.name.trim())
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(&update.start_point)
        .bind(&update.destination)
        .bind(&update.comments)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Deletes the sailing along with its roster.
    pub async fn delete(id: i64, pool: &SqlitePool) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sailing WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}
