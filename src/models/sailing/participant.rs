use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::member::Member;
use crate::models::role::Role;
use crate::models::sailing::Sailing;

/// A member's place in the crew of a sailing
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Participant {
    pub sailing_id: i64,
    pub member_id: i64,
    /// The crew position held on this trip, if any
    pub role_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role_name: Option<String>,
}

impl Participant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The crew of the sailing, ordered by name
    pub async fn for_sailing(sailing_id: i64, pool: &SqlitePool) -> AppResult<Vec<Self>> {
        sqlx::query_as(
            "SELECT sailing_participant.sailing_id, sailing_participant.member_id,
                    sailing_participant.role_id, member.first_name, member.last_name,
                    member.email, role.name AS role_name
             FROM sailing_participant
             INNER JOIN member ON sailing_participant.member_id = member.id
             LEFT JOIN role ON sailing_participant.role_id = role.id
             WHERE sailing_participant.sailing_id = ?
             ORDER BY member.last_name, member.first_name",
        )
        .bind(sailing_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn is_participating(sailing_id: i64, member_id: i64, pool: &SqlitePool) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT member_id FROM sailing_participant WHERE sailing_id = ? AND member_id = ?",
        )
        .bind(sailing_id)
        .bind(member_id)
        .fetch_optional(pool)
        .await?;

        Ok(found.is_some())
    }

    /// Adds the member to the crew, optionally in a crew position.
    pub async fn add(
        sailing_id: i64,
        member_id: i64,
        role_id: Option<i64>,
        pool: &SqlitePool,
    ) -> AppResult<()> {
        Sailing::with_id(sailing_id, pool).await?;
        let member = Member::with_id(member_id, pool).await?;
        if let Some(role_id) = role_id {
            Role::with_id(role_id, pool).await?;
        }

        if Self::is_participating(sailing_id, member_id, pool).await? {
            return Err(AppError::bad_request(format!(
                "{} is already part of the crew",
                member.full_name()
            )));
        }

        sqlx::query(
            "INSERT INTO sailing_participant (sailing_id, member_id, role_id) VALUES (?, ?, ?)",
        )
        .bind(sailing_id)
        .bind(member_id)
        .bind(role_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn remove(sailing_id: i64, member_id: i64, pool: &SqlitePool) -> AppResult<()> {
        let result =
            sqlx::query("DELETE FROM sailing_participant WHERE sailing_id = ? AND member_id = ?")
                .bind(sailing_id)
                .bind(member_id)
                .execute(pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::bad_request("The member is not part of the crew"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sailing::tests::midsummer;
    use crate::models::testing::{member, pool};

    #[tokio::test]
    async fn members_join_a_crew_once() {
        let pool = pool().await;
        let anna = member("anna@example.org", &pool).await;
        let sailing = Sailing::create(midsummer(), &pool).await.unwrap();
        let skipper = Role::with_name_opt("Skeppare", &pool).await.unwrap().unwrap();

        Participant::add(sailing, anna.id, Some(skipper.id), &pool)
            .await
            .unwrap();
        assert!(matches!(
            Participant::add(sailing, anna.id, None, &pool).await,
            Err(AppError::BadRequest(_))
        ));

        let crew = Participant::for_sailing(sailing, &pool).await.unwrap();
        assert_eq!(crew.len(), 1);
        assert_eq!(crew[0].full_name(), "Anna Berg");
        assert_eq!(crew[0].role_name.as_deref(), Some("Skeppare"));
        assert_eq!(Sailing::for_member(anna.id, &pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_members_and_sailings_are_rejected() {
        let pool = pool().await;
        let anna = member("anna@example.org", &pool).await;
        let sailing = Sailing::create(midsummer(), &pool).await.unwrap();

        assert!(matches!(
            Participant::add(sailing + 1, anna.id, None, &pool).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            Participant::add(sailing, anna.id + 1, None, &pool).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            Participant::add(sailing, anna.id, Some(999), &pool).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn crew_positions_survive_their_role_being_deleted() {
        let pool = pool().await;
        let anna = member("anna@example.org", &pool).await;
        let sailing = Sailing::create(midsummer(), &pool).await.unwrap();
        let cook = Role::with_name_opt("Kock", &pool).await.unwrap().unwrap();
        Participant::add(sailing, anna.id, Some(cook.id), &pool)
            .await
            .unwrap();

        Role::delete(cook.id, &pool).await.unwrap();
        let crew = Participant::for_sailing(sailing, &pool).await.unwrap();
        assert_eq!(crew.len(), 1);
        assert_eq!(crew[0].role_name, None);

        Participant::remove(sailing, anna.id, &pool).await.unwrap();
        assert!(Participant::remove(sailing, anna.id, &pool).await.is_err());
    }
}
