use rusqlite::{params, Connection};

use crate::models::{BookingRecord, StoredAppointment};

// ── Appointments ──

/// Inserts a booking. A record whose id is already stored is left untouched
/// and `false` is returned.
pub fn insert_appointment(conn: &Connection, record: &BookingRecord) -> anyhow::Result<bool> {
    let raw_input = serde_json::to_string(&record.raw_input)?;
    let extra_fields = serde_json::to_string(&record.extra_fields)?;
    let created_at = record.created_at.format("%Y-%m-%d %H:%M:%S").to_string();

    let inserted = conn.execute(
        "INSERT INTO appointments (id, session_id, raw_input, llm_summary, alert_flag, extra_fields, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO NOTHING",
        params![
            record.id,
            record.session_id,
            raw_input,
            record.llm_summary,
            record.alert_flag,
            extra_fields,
            created_at,
        ],
    )?;
    Ok(inserted == 1)
}

pub fn list_appointments(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<StoredAppointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, raw_input, llm_summary, alert_flag, extra_fields, created_at
         FROM appointments ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        let raw_input: String = row.get(2)?;
        let extra_fields: String = row.get(5)?;
        Ok(StoredAppointment {
            id: row.get(0)?,
            session_id: row.get(1)?,
            raw_input: serde_json::from_str(&raw_input).unwrap_or(serde_json::Value::Null),
            llm_summary: row.get(3)?,
            alert_flag: row.get(4)?,
            extra_fields: serde_json::from_str(&extra_fields)
                .unwrap_or_else(|_| serde_json::json!({})),
            created_at: row.get(6)?,
        })
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

pub fn count_appointments(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
}
