use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_meal_context, parse_source, parse_unit},
    models::GlucoseReading,
};

const READING_COLUMNS: &str =
    "id, user_id, value, unit, measured_at, source, notes, meal_context, created_at";

fn row_to_reading(row: &Row) -> Result<GlucoseReading> {
    let unit: String = row.get("unit")?;
    let measured_at: String = row.get("measured_at")?;
    let source: String = row.get("source")?;
    let meal_context: Option<String> = row.get("meal_context")?;
    let created_at: String = row.get("created_at")?;

    Ok(GlucoseReading {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        value: row.get("value")?,
        unit: parse_unit(&unit)?,
        measured_at: parse_datetime(&measured_at, "measured_at")?,
        source: parse_source(&source)?,
        notes: row.get("notes")?,
        meal_context: parse_meal_context(meal_context)?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn insert_row(conn: &Connection, record: &GlucoseReading) -> Result<()> {
    conn.execute(
        "INSERT INTO glucose_readings
             (id, user_id, value, unit, measured_at, source, notes, meal_context, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id,
            record.user_id,
            record.value,
            record.unit.as_str(),
            format_datetime(&record.measured_at),
            record.source.as_str(),
            record.notes,
            record.meal_context.map(|c| c.as_str()),
            format_datetime(&record.created_at),
        ],
    )
    .with_context(|| format!("failed to insert glucose reading {}", record.id))?;
    Ok(())
}

impl Database {
    pub async fn insert_reading(&self, reading: &GlucoseReading) -> Result<()> {
        let record = reading.clone();
        self.execute(move |conn| insert_row(conn, &record)).await
    }

    /// Insert every reading or none of them.
    pub async fn insert_readings(&self, readings: &[GlucoseReading]) -> Result<()> {
        let records = readings.to_vec();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open batch transaction")?;
            for record in &records {
                insert_row(&tx, record)?;
            }
            // Dropping `tx` on an early return rolls the batch back.
            tx.commit().context("failed to commit reading batch")?;
            Ok(())
        })
        .await
    }

    /// Readings for `user_id` with `start <= measured_at <= end`, oldest first.
    pub async fn get_readings_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {READING_COLUMNS}
                 FROM glucose_readings
                 WHERE user_id = ?1 AND measured_at >= ?2 AND measured_at <= ?3
                 ORDER BY measured_at ASC, created_at ASC"
            ))?;

            let mut rows = stmt.query(params![
                user_id,
                format_datetime(&start),
                format_datetime(&end)
            ])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }

            Ok(readings)
        })
        .await
    }

    /// Delete a reading owned by `user_id`. Returns false when nothing matched.
    ///
    /// The reading's alert goes with it via ON DELETE CASCADE (schema_v1.sql).
    pub async fn delete_reading(&self, user_id: &str, reading_id: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        let reading_id = reading_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM glucose_readings WHERE id = ?1 AND user_id = ?2",
                params![reading_id, user_id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
