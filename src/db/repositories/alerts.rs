use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_alert_type, parse_datetime, parse_optional_datetime,
        parse_severity,
    },
    models::Alert,
};

fn row_to_alert(row: &Row) -> Result<Alert> {
    let alert_type: String = row.get("alert_type")?;
    let severity: String = row.get("severity")?;
    let triggered_at: String = row.get("triggered_at")?;
    let acknowledged_at: Option<String> = row.get("acknowledged_at")?;

    Ok(Alert {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        alert_type: parse_alert_type(&alert_type)?,
        severity: parse_severity(&severity)?,
        message: row.get("message")?,
        related_reading_id: row.get("related_reading_id")?,
        triggered_at: parse_datetime(&triggered_at, "triggered_at")?,
        acknowledged_at: parse_optional_datetime(acknowledged_at, "acknowledged_at")?,
    })
}

impl Database {
    pub async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let record = alert.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO alerts (id, user_id, alert_type, severity, message,
                                     related_reading_id, triggered_at, acknowledged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.user_id,
                    record.alert_type.as_str(),
                    record.severity.as_str(),
                    record.message,
                    record.related_reading_id,
                    format_datetime(&record.triggered_at),
                    record.acknowledged_at.as_ref().map(format_datetime),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Alerts for a user, newest first.
    pub async fn list_alerts(
        &self,
        user_id: &str,
        unacknowledged_only: bool,
    ) -> Result<Vec<Alert>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, alert_type, severity, message,
                        related_reading_id, triggered_at, acknowledged_at
                 FROM alerts
                 WHERE user_id = ?1 AND (?2 = 0 OR acknowledged_at IS NULL)
                 ORDER BY triggered_at DESC",
            )?;

            let mut rows = stmt.query(params![user_id, unacknowledged_only])?;
            let mut alerts = Vec::new();
            while let Some(row) = rows.next()? {
                alerts.push(row_to_alert(row)?);
            }

            Ok(alerts)
        })
        .await
    }

    /// Set `acknowledged_at` if it is still empty and return the alert.
    /// `None` when the alert does not exist or belongs to another user.
    pub async fn acknowledge_alert(
        &self,
        user_id: &str,
        alert_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let user_id = user_id.to_string();
        let alert_id = alert_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE alerts
                 SET acknowledged_at = ?1
                 WHERE id = ?2 AND user_id = ?3 AND acknowledged_at IS NULL",
                params![format_datetime(&acknowledged_at), alert_id, user_id],
            )?;

            let alert = conn
                .query_row(
                    "SELECT id, user_id, alert_type, severity, message,
                            related_reading_id, triggered_at, acknowledged_at
                     FROM alerts
                     WHERE id = ?1 AND user_id = ?2",
                    params![alert_id, user_id],
                    |row| Ok(row_to_alert(row)),
                )
                .optional()?
                .transpose()
                .map_err(|e| anyhow!("Failed to parse alert: {e}"))?;

            Ok(alert)
        })
        .await
    }
}
