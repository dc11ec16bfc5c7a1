use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utils::time::parse_hhmm;

/// Activity kind whose `activity_data.schedule` sessions take part in
/// overlap validation.
pub const COURSE_KIND: &str = "curso";

/// Generic studio activity; courses carry their session list inside
/// `activity_data`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub kind: String,
    /// JSON blob; for courses it may contain `{"schedule": [CourseSession]}`
    pub activity_data: Option<String>,
    pub is_active: bool,
    pub vector_id: Option<String>,
    pub vectorized_at: Option<DateTime<Utc>>,
    pub needs_reindex: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One occurrence of a multi-session course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSession {
    pub day: String,
    pub time: String,
    #[serde(default = "default_duration", alias = "duration")]
    pub duration_minutes: i64,
}

fn default_duration() -> i64 {
    60
}

impl CourseSession {
    /// Longest accepted session: a full day.
    pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

    /// Strict write-time validation; read-time scanning stays lenient.
    pub fn validate(&self) -> Result<(), String> {
        if self.day.trim().is_empty() {
            return Err("la sesión no tiene día".to_string());
        }
        if parse_hhmm(&self.time).is_none() {
            return Err(format!("hora inválida '{}': se espera formato HH:MM", self.time));
        }
        if self.duration_minutes <= 0 || self.duration_minutes > Self::MAX_DURATION_MINUTES {
            return Err(format!(
                "duración inválida: {} (entre 1 y {} minutos)",
                self.duration_minutes,
                Self::MAX_DURATION_MINUTES
            ));
        }
        Ok(())
    }
}

/// Request body for creating an activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub activity_data: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request body for updating an activity; absent fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateActivity {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub kind: Option<String>,
    pub activity_data: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

fn default_kind() -> String {
    "general".to_string()
}

fn default_true() -> bool {
    true
}

impl Activity {
    const COLUMNS: &'static str = "id, title, description, slug, kind, activity_data, is_active, \
         vector_id, vectorized_at, needs_reindex, created_at, updated_at";

    /// Lenient parse of the embedded session list: entries that do not
    /// deserialize are skipped so one bad legacy session never blocks the
    /// rest. Time strings are not validated here; scanners skip unparseable
    /// ones themselves.
    pub fn parsed_sessions(&self) -> Vec<CourseSession> {
        let Some(raw) = self.activity_data.as_deref() else {
            return Vec::new();
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
            return Vec::new();
        };
        let Some(entries) = value.get("schedule").and_then(|s| s.as_array()) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<CourseSession>(entry.clone()).ok())
            .filter(|session| !session.day.trim().is_empty())
            .collect()
    }

    pub async fn find_all(pool: &SqlitePool, active_only: bool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = if active_only {
            format!("SELECT {} FROM activities WHERE is_active = 1 ORDER BY created_at DESC", Self::COLUMNS)
        } else {
            format!("SELECT {} FROM activities ORDER BY created_at DESC", Self::COLUMNS)
        };
        sqlx::query_as::<_, Self>(&sql).fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM activities WHERE id = ?", Self::COLUMNS);
        sqlx::query_as::<_, Self>(&sql).bind(id).fetch_optional(pool).await
    }

    /// Active course activities, the second source scanned for overlaps.
    pub async fn find_active_courses(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM activities WHERE kind = ? AND is_active = 1",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(COURSE_KIND)
            .fetch_all(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateActivity) -> Result<Self, sqlx::Error> {
        let activity_data = data
            .activity_data
            .as_ref()
            .map(|v| v.to_string());
        let sql = format!(
            "INSERT INTO activities (title, description, slug, kind, activity_data, is_active)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(&data.title)
            .bind(&data.description)
            .bind(&data.slug)
            .bind(&data.kind)
            .bind(activity_data)
            .bind(data.is_active)
            .fetch_one(pool)
            .await
    }

    /// Overwrite every mutable field and flag the row for reindexing; callers
    /// merge partial updates beforehand.
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &CreateActivity,
    ) -> Result<Self, sqlx::Error> {
        let activity_data = data
            .activity_data
            .as_ref()
            .map(|v| v.to_string());
        let sql = format!(
            "UPDATE activities
             SET title = ?, description = ?, slug = ?, kind = ?, activity_data = ?, is_active = ?,
                 needs_reindex = 1, updated_at = datetime('now', 'subsec')
             WHERE id = ?
             RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(&data.title)
            .bind(&data.description)
            .bind(&data.slug)
            .bind(&data.kind)
            .bind(activity_data)
            .bind(data.is_active)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Merge a partial update over the current row.
    pub fn merged_with(&self, update: &UpdateActivity) -> CreateActivity {
        let current_data = self
            .activity_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        CreateActivity {
            title: update.title.clone().unwrap_or_else(|| self.title.clone()),
            description: update
                .description
                .clone()
                .or_else(|| self.description.clone()),
            slug: update.slug.clone().or_else(|| self.slug.clone()),
            kind: update.kind.clone().unwrap_or_else(|| self.kind.clone()),
            activity_data: update.activity_data.clone().or(current_data),
            is_active: update.is_active.unwrap_or(self.is_active),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;
    use serde_json::json;

    fn course(data: serde_json::Value) -> CreateActivity {
        CreateActivity {
            title: "Curso de meditación".to_string(),
            description: Some("Ocho semanas".to_string()),
            slug: None,
            kind: COURSE_KIND.to_string(),
            activity_data: Some(data),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn parses_well_formed_sessions() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = Activity::create(
            &db.pool,
            &course(json!({
                "schedule": [
                    {"day": "Lunes", "time": "10:00", "duration": 90},
                    {"day": "Jueves", "time": "18:00"}
                ]
            })),
        )
        .await
        .expect("create");

        let sessions = created.parsed_sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].duration_minutes, 90);
        // default duration applies when omitted
        assert_eq!(sessions[1].duration_minutes, 60);
    }

    #[tokio::test]
    async fn skips_malformed_sessions() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = Activity::create(
            &db.pool,
            &course(json!({
                "schedule": [
                    {"time": "10:00"},
                    {"day": "  ", "time": "10:00"},
                    "not an object",
                    {"day": "Lunes", "time": "10:00", "duration": 60}
                ]
            })),
        )
        .await
        .expect("create");

        let sessions = created.parsed_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].day, "Lunes");
    }

    #[tokio::test]
    async fn no_data_means_no_sessions() {
        let db = DBService::new_in_memory().await.expect("db");
        let mut data = course(json!({}));
        data.activity_data = None;
        let created = Activity::create(&db.pool, &data).await.expect("create");
        assert!(created.parsed_sessions().is_empty());
    }

    #[tokio::test]
    async fn update_sets_needs_reindex() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = Activity::create(&db.pool, &course(json!({}))).await.expect("create");

        sqlx::query("UPDATE activities SET needs_reindex = 0 WHERE id = ?")
            .bind(created.id)
            .execute(&db.pool)
            .await
            .expect("clear flag");

        let merged = created.merged_with(&UpdateActivity {
            title: Some("Curso renovado".to_string()),
            ..Default::default()
        });
        let updated = Activity::update(&db.pool, created.id, &merged).await.expect("update");
        assert!(updated.needs_reindex);
        assert_eq!(updated.title, "Curso renovado");
    }

    #[test]
    fn session_validation_rejects_bad_input() {
        let bad_time = CourseSession {
            day: "Lunes".to_string(),
            time: "bad-time".to_string(),
            duration_minutes: 60,
        };
        assert!(bad_time.validate().is_err());

        let no_day = CourseSession {
            day: " ".to_string(),
            time: "10:00".to_string(),
            duration_minutes: 60,
        };
        assert!(no_day.validate().is_err());

        let zero_duration = CourseSession {
            day: "Lunes".to_string(),
            time: "10:00".to_string(),
            duration_minutes: 0,
        };
        assert!(zero_duration.validate().is_err());

        // durations past the cap are as invalid as non-positive ones
        let absurd_duration = CourseSession {
            day: "Lunes".to_string(),
            time: "10:00".to_string(),
            duration_minutes: i64::MAX,
        };
        assert!(absurd_duration.validate().is_err());

        let just_over_a_day = CourseSession {
            day: "Lunes".to_string(),
            time: "10:00".to_string(),
            duration_minutes: CourseSession::MAX_DURATION_MINUTES + 1,
        };
        assert!(just_over_a_day.validate().is_err());

        let full_day = CourseSession {
            day: "Lunes".to_string(),
            time: "10:00".to_string(),
            duration_minutes: CourseSession::MAX_DURATION_MINUTES,
        };
        assert!(full_day.validate().is_ok());

        let ok = CourseSession {
            day: "Lunes".to_string(),
            time: "23:30".to_string(),
            duration_minutes: 90,
        };
        assert!(ok.validate().is_ok());
    }
}
