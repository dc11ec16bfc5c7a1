use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One weekly recurring class slot.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassSchedule {
    pub id: i64,
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassSchedule {
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request body for updating a schedule; absent fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClassSchedule {
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Active slot as scanned by the overlap checker, with the linked class's
/// display name already resolved.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleSlot {
    pub id: i64,
    pub display_name: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

impl ClassSchedule {
    const COLUMNS: &'static str =
        "id, class_id, class_name, day_of_week, start_time, end_time, is_active, created_at, updated_at";

    pub async fn find_all(pool: &SqlitePool, active_only: bool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM class_schedules WHERE is_active = 1 ORDER BY day_of_week, start_time",
                Self::COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM class_schedules ORDER BY day_of_week, start_time",
                Self::COLUMNS
            )
        };
        sqlx::query_as::<_, Self>(&sql).fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM class_schedules WHERE id = ?", Self::COLUMNS);
        sqlx::query_as::<_, Self>(&sql).bind(id).fetch_optional(pool).await
    }

    /// All active slots with their display label, preferring the linked yoga
    /// class's name over the free-text label.
    pub async fn find_active_slots(pool: &SqlitePool) -> Result<Vec<ScheduleSlot>, sqlx::Error> {
        sqlx::query_as::<_, ScheduleSlot>(
            r#"SELECT
                cs.id,
                COALESCE(yc.name, cs.class_name, 'Clase') AS display_name,
                cs.day_of_week,
                cs.start_time,
                cs.end_time
            FROM class_schedules cs
            LEFT JOIN yoga_classes yc ON yc.id = cs.class_id
            WHERE cs.is_active = 1"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateClassSchedule,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO class_schedules (class_id, class_name, day_of_week, start_time, end_time, is_active)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(data.class_id)
            .bind(&data.class_name)
            .bind(&data.day_of_week)
            .bind(&data.start_time)
            .bind(&data.end_time)
            .bind(data.is_active)
            .fetch_one(pool)
            .await
    }

    /// Overwrite every mutable field; callers merge partial updates beforehand
    /// so the merged values can also be run through overlap validation.
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &CreateClassSchedule,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE class_schedules
             SET class_id = ?, class_name = ?, day_of_week = ?, start_time = ?, end_time = ?,
                 is_active = ?, updated_at = datetime('now', 'subsec')
             WHERE id = ?
             RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(data.class_id)
            .bind(&data.class_name)
            .bind(&data.day_of_week)
            .bind(&data.start_time)
            .bind(&data.end_time)
            .bind(data.is_active)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM class_schedules WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Merge a partial update over the current row.
    pub fn merged_with(&self, update: &UpdateClassSchedule) -> CreateClassSchedule {
        CreateClassSchedule {
            class_id: update.class_id.or(self.class_id),
            class_name: update.class_name.clone().or_else(|| self.class_name.clone()),
            day_of_week: update
                .day_of_week
                .clone()
                .unwrap_or_else(|| self.day_of_week.clone()),
            start_time: update
                .start_time
                .clone()
                .unwrap_or_else(|| self.start_time.clone()),
            end_time: update
                .end_time
                .clone()
                .unwrap_or_else(|| self.end_time.clone()),
            is_active: update.is_active.unwrap_or(self.is_active),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn sample(day: &str, start: &str, end: &str) -> CreateClassSchedule {
        CreateClassSchedule {
            class_id: None,
            class_name: Some("Hatha".to_string()),
            day_of_week: day.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = ClassSchedule::create(&db.pool, &sample("Lunes", "09:00", "10:30"))
            .await
            .expect("create");
        assert_eq!(created.day_of_week, "Lunes");
        assert!(created.is_active);

        let found = ClassSchedule::find_by_id(&db.pool, created.id)
            .await
            .expect("query")
            .expect("row");
        assert_eq!(found.start_time, "09:00");
        assert_eq!(found.end_time, "10:30");
    }

    #[tokio::test]
    async fn active_slots_prefer_linked_class_name() {
        let db = DBService::new_in_memory().await.expect("db");
        let class_id: i64 = sqlx::query_scalar(
            "INSERT INTO yoga_classes (name) VALUES ('Vinyasa Flow') RETURNING id",
        )
        .fetch_one(&db.pool)
        .await
        .expect("class");

        let mut data = sample("Martes", "18:00", "19:00");
        data.class_id = Some(class_id);
        data.class_name = Some("old label".to_string());
        ClassSchedule::create(&db.pool, &data).await.expect("create");

        let slots = ClassSchedule::find_active_slots(&db.pool).await.expect("slots");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].display_name, "Vinyasa Flow");
    }

    #[tokio::test]
    async fn inactive_rows_are_not_slots() {
        let db = DBService::new_in_memory().await.expect("db");
        let mut data = sample("Lunes", "09:00", "10:00");
        data.is_active = false;
        ClassSchedule::create(&db.pool, &data).await.expect("create");

        let slots = ClassSchedule::find_active_slots(&db.pool).await.expect("slots");
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn merged_update_keeps_absent_fields() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = ClassSchedule::create(&db.pool, &sample("Lunes", "09:00", "10:30"))
            .await
            .expect("create");

        let merged = created.merged_with(&UpdateClassSchedule {
            start_time: Some("09:30".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.start_time, "09:30");
        assert_eq!(merged.end_time, "10:30");
        assert_eq!(merged.day_of_week, "Lunes");

        let updated = ClassSchedule::update(&db.pool, created.id, &merged)
            .await
            .expect("update");
        assert_eq!(updated.start_time, "09:30");
    }

    #[tokio::test]
    async fn delete_reports_rows_affected() {
        let db = DBService::new_in_memory().await.expect("db");
        let created = ClassSchedule::create(&db.pool, &sample("Lunes", "09:00", "10:30"))
            .await
            .expect("create");

        assert_eq!(ClassSchedule::delete(&db.pool, created.id).await.expect("delete"), 1);
        assert_eq!(ClassSchedule::delete(&db.pool, created.id).await.expect("delete"), 0);
    }
}
