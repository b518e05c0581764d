use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "quiz_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub category: String,
    pub question: String,
    pub options: String, // JSON-serialized Vec<String>
    pub correct_index: i64,
    pub difficulty: QuizDifficulty,
    pub created_at: DateTime<Utc>,
}

impl QuizQuestion {
    pub fn parsed_options(&self) -> Vec<String> {
        serde_json::from_str(&self.options).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateQuizQuestion {
    pub category: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub difficulty: Option<QuizDifficulty>,
}

/// Question as handed to players, without the answer
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublicQuizQuestion {
    pub id: Uuid,
    pub category: String,
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: QuizDifficulty,
}

impl From<QuizQuestion> for PublicQuizQuestion {
    fn from(q: QuizQuestion) -> Self {
        let options = q.parsed_options();
        Self {
            id: q.id,
            category: q.category,
            question: q.question,
            options,
            difficulty: q.difficulty,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct QuizSession {
    pub id: Uuid,
    pub player_name: String,
    pub category: Option<String>,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub answers: String, // JSON-serialized Vec<QuizAnswerResult>
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QuizAnswer {
    pub question_id: Uuid,
    pub selected_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct QuizAnswerResult {
    pub question_id: Uuid,
    pub selected_index: i64,
    pub correct_index: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SubmitQuiz {
    pub player_name: String,
    pub category: Option<String>,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QuizResult {
    pub session_id: Uuid,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub answers: Vec<QuizAnswerResult>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LeaderboardEntry {
    pub player_name: String,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub created_at: DateTime<Utc>,
}

impl QuizQuestion {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateQuizQuestion,
    ) -> Result<Self, sqlx::Error> {
        let options = serde_json::to_string(&data.options)
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let category = data.category.trim();
        let question = data.question.trim();
        let difficulty = data.difficulty.unwrap_or_default();
        sqlx::query_as!(
            QuizQuestion,
            r#"INSERT INTO quiz_questions (id, category, question, options, correct_index, difficulty)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id as "id!: Uuid", category as "category!", question as "question!", options as "options!", correct_index as "correct_index!: i64", difficulty as "difficulty!: QuizDifficulty", created_at as "created_at!: DateTime<Utc>""#,
            id,
            category,
            question,
            options,
            data.correct_index,
            difficulty
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_random(
        pool: &SqlitePool,
        category: Option<&str>,
        count: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            QuizQuestion,
            r#"SELECT id as "id!: Uuid", category as "category!", question as "question!", options as "options!", correct_index as "correct_index!: i64", difficulty as "difficulty!: QuizDifficulty", created_at as "created_at!: DateTime<Utc>"
               FROM quiz_questions
               WHERE ($1 IS NULL OR category = $1)
               ORDER BY RANDOM()
               LIMIT $2"#,
            category,
            count
        )
        .fetch_all(pool)
        .await
    }

    /// The id list is variable length, so this one is built at runtime.
    pub async fn find_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, category, question, options, correct_index, difficulty, created_at
             FROM quiz_questions WHERE id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        query.build_query_as::<QuizQuestion>().fetch_all(pool).await
    }

    pub async fn categories(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar!(
            r#"SELECT DISTINCT category as "category!" FROM quiz_questions ORDER BY category"#
        )
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query!("DELETE FROM quiz_questions WHERE id = $1", id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl QuizSession {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        player_name: &str,
        category: Option<&str>,
        score: i64,
        total: i64,
        percentage: f64,
        answers: &[QuizAnswerResult],
    ) -> Result<Self, sqlx::Error> {
        let answers =
            serde_json::to_string(answers).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query_as!(
            QuizSession,
            r#"INSERT INTO quiz_sessions (id, player_name, category, score, total, percentage, answers)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id as "id!: Uuid", player_name as "player_name!", category as "category?", score as "score!: i64", total as "total!: i64", percentage as "percentage!: f64", answers as "answers!", created_at as "created_at!: DateTime<Utc>""#,
            id,
            player_name,
            category,
            score,
            total,
            percentage,
            answers
        )
        .fetch_one(pool)
        .await
    }

    pub async fn leaderboard(
        pool: &SqlitePool,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        sqlx::query_as!(
            LeaderboardEntry,
            r#"SELECT player_name as "player_name!", score as "score!: i64", total as "total!: i64", percentage as "percentage!: f64", created_at as "created_at!: DateTime<Utc>"
               FROM quiz_sessions
               WHERE ($1 IS NULL OR category = $1)
               ORDER BY percentage DESC, score DESC, created_at DESC
               LIMIT $2"#,
            category,
            limit
        )
        .fetch_all(pool)
        .await
    }
}
