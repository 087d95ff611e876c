//! Material table access
//!
//! Reads `materials_epd` in stable `rowid` order so repeated runs over an
//! unchanged table see records in the same sequence.

use chrono::{DateTime, NaiveDate};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::models::MaterialRecord;
use crate::Result;

const SELECT_PAGE: &str = r#"
    SELECT id, material_name, material_category, ef_total, unit, data_source,
           epd_number, manufacturer, state, expiry_date
    FROM materials_epd
    ORDER BY rowid
    LIMIT ? OFFSET ?
"#;

/// Fetch one page of material records
pub async fn fetch_page(pool: &SqlitePool, offset: usize, limit: usize) -> Result<Vec<MaterialRecord>> {
    let rows = sqlx::query(SELECT_PAGE)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode_row).collect()
}

/// Count all material rows
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials_epd")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<MaterialRecord> {
    let id: String = row.try_get("id")?;
    let expiry_raw: Option<String> = row.try_get("expiry_date")?;

    Ok(MaterialRecord {
        material_name: row.try_get::<Option<String>, _>("material_name")?.unwrap_or_default(),
        material_category: row
            .try_get::<Option<String>, _>("material_category")?
            .unwrap_or_default(),
        ef_total: row.try_get("ef_total")?,
        unit: row.try_get("unit")?,
        data_source: row.try_get("data_source")?,
        epd_number: row.try_get("epd_number")?,
        manufacturer: row.try_get("manufacturer")?,
        state: row.try_get("state")?,
        expiry_date: expiry_raw.as_deref().and_then(|raw| {
            let parsed = parse_expiry_date(raw);
            if parsed.is_none() {
                warn!(material_id = %id, expiry_date = raw, "Unparseable expiry date ignored");
            }
            parsed
        }),
        id,
    })
}

/// Parse an expiry date stored as `YYYY-MM-DD` or an RFC 3339 timestamp
///
/// Blank text is treated as no date.
pub fn parse_expiry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    // Timestamps without offset, e.g. "2024-06-30T00:00:00" or "2024-06-30 00:00:00"
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Create the `materials_epd` table
///
/// The import pipeline owns this table in production. Used for fixtures and tests.
pub async fn create_materials_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS materials_epd (
            id TEXT PRIMARY KEY,
            material_name TEXT NOT NULL,
            material_category TEXT NOT NULL,
            ef_total REAL,
            unit TEXT,
            data_source TEXT,
            epd_number TEXT,
            manufacturer TEXT,
            state TEXT,
            expiry_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert one record (fixtures and tests only)
pub async fn insert_material(pool: &SqlitePool, record: &MaterialRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO materials_epd
            (id, material_name, material_category, ef_total, unit, data_source,
             epd_number, manufacturer, state, expiry_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.material_name)
    .bind(&record.material_category)
    .bind(record.ef_total)
    .bind(&record.unit)
    .bind(&record.data_source)
    .bind(&record.epd_number)
    .bind(&record.manufacturer)
    .bind(&record.state)
    .bind(record.expiry_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .execute(pool)
    .await?;

    Ok(())
}
