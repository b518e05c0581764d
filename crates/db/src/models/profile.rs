use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub favourite_team: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub favourite_team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub favourite_team: Option<String>,
}

impl Profile {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateProfile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as!(
            Profile,
            r#"INSERT INTO profiles (id, username, display_name, favourite_team)
               VALUES ($1, $2, $3, $4)
               RETURNING id as "id!: Uuid", username as "username!", display_name as "display_name?", favourite_team as "favourite_team?", is_admin as "is_admin!: bool", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            data.username,
            data.display_name,
            data.favourite_team
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            Profile,
            r#"SELECT id as "id!: Uuid", username as "username!", display_name as "display_name?", favourite_team as "favourite_team?", is_admin as "is_admin!: bool", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM profiles
               WHERE id = $1"#,
            id
        )
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Profile,
            r#"SELECT id as "id!: Uuid", username as "username!", display_name as "display_name?", favourite_team as "favourite_team?", is_admin as "is_admin!: bool", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM profiles
               WHERE username = $1"#,
            username
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Profile,
            r#"UPDATE profiles
               SET display_name = $2,
                   favourite_team = $3,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id as "id!: Uuid", username as "username!", display_name as "display_name?", favourite_team as "favourite_team?", is_admin as "is_admin!: bool", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            data.display_name,
            data.favourite_team
        )
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, is_unique_violation};

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = DBService::new_in_memory().await.unwrap();
        let data = CreateProfile {
            username: "otieno".to_string(),
            display_name: None,
            favourite_team: Some("Gor Mahia".to_string()),
        };

        Profile::create(&db.pool, Uuid::new_v4(), &data).await.unwrap();
        let err = Profile::create(&db.pool, Uuid::new_v4(), &data)
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_missing_profile_returns_none() {
        let db = DBService::new_in_memory().await.unwrap();
        let updated = Profile::update(
            &db.pool,
            Uuid::new_v4(),
            &UpdateProfile {
                display_name: Some("x".to_string()),
                favourite_team: None,
            },
        )
        .await
        .unwrap();

        assert!(updated.is_none());
    }
}
