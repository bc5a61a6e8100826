use crate::error::AppError;

pub mod member;
pub mod payment;
pub mod role;
pub mod sailing;

/// Turns a unique constraint violation into a message for the member, leaving
/// other database errors as they are.
pub(crate) fn on_conflict(message: impl Into<String>) -> impl FnOnce(sqlx::Error) -> AppError {
    move |error| {
        let is_unique_violation = error
            .as_database_error()
            .is_some_and(|db_error| db_error.is_unique_violation());
        if is_unique_violation {
            AppError::BadRequest(message.into())
        } else {
            AppError::Database(error)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::SqlitePool;

    use crate::models::member::{Member, NewMember};

    pub async fn pool() -> SqlitePool {
        crate::db::connect("sqlite::memory:").await.unwrap()
    }

    pub fn new_member(email: &str, first_name: &str, last_name: &str) -> NewMember {
        NewMember {
            email: email.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            ..NewMember::default()
        }
    }

    pub async fn member(email: &str, pool: &SqlitePool) -> Member {
        let id = Member::create(new_member(email, "Anna", "Berg"), pool)
            .await
            .unwrap();
        Member::with_id(id, pool).await.unwrap()
    }
}
