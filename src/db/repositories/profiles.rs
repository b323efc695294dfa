use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{connection::Database, helpers::format_datetime, models::TargetRange};

impl Database {
    /// The user's configured target range, if any.
    pub async fn get_target_range(&self, user_id: &str) -> Result<Option<TargetRange>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let range = conn
                .query_row(
                    "SELECT target_min, target_max FROM user_profiles WHERE user_id = ?1",
                    params![user_id],
                    |row| Ok(TargetRange::new(row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(range)
        })
        .await
    }

    pub async fn upsert_target_range(&self, user_id: &str, range: TargetRange) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO user_profiles (user_id, target_min, target_max, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     target_min = excluded.target_min,
                     target_max = excluded.target_max,
                     updated_at = excluded.updated_at",
                params![user_id, range.min, range.max, format_datetime(&Utc::now())],
            )?;
            Ok(())
        })
        .await
    }
}
