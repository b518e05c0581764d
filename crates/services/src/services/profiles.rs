use db::{
    is_unique_violation,
    models::profile::{CreateProfile, Profile, UpdateProfile},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("profile not found")]
    NotFound,
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
}

pub struct ProfileService {
    pool: SqlitePool,
}

impl ProfileService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, mut data: CreateProfile) -> Result<Profile, ProfileError> {
        data.username = normalize_username(&data.username)?;
        data.display_name = clean_optional(data.display_name, 60, "display name")?;
        data.favourite_team = clean_optional(data.favourite_team, 60, "favourite team")?;

        match Profile::create(&self.pool, Uuid::new_v4(), &data).await {
            Ok(profile) => {
                info!(profile_id = %profile.id, username = %profile.username, "Profile created");
                Ok(profile)
            }
            Err(e) if is_unique_violation(&e) => Err(ProfileError::UsernameTaken(data.username)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Profile, ProfileError> {
        Profile::find_by_id(&self.pool, id)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Profile, ProfileError> {
        Profile::find_by_username(&self.pool, &username.trim().to_lowercase())
            .await?
            .ok_or(ProfileError::NotFound)
    }

    pub async fn update(&self, id: Uuid, data: UpdateProfile) -> Result<Profile, ProfileError> {
        let data = UpdateProfile {
            display_name: clean_optional(data.display_name, 60, "display name")?,
            favourite_team: clean_optional(data.favourite_team, 60, "favourite team")?,
        };
        Profile::update(&self.pool, id, &data)
            .await?
            .ok_or(ProfileError::NotFound)
    }
}

/// Usernames are stored lowercase: 3-30 of `a-z`, `0-9` and `_`.
fn normalize_username(raw: &str) -> Result<String, ProfileError> {
    let username = raw.trim().to_lowercase();
    let valid = (3..=30).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(ProfileError::Validation(
            "username must be 3-30 letters, digits or underscores".to_string(),
        ));
    }
    Ok(username)
}

fn clean_optional(
    value: Option<String>,
    max_chars: usize,
    field: &str,
) -> Result<Option<String>, ProfileError> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.as_ref().is_some_and(|v| v.chars().count() > max_chars) {
        return Err(ProfileError::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(value)
}
