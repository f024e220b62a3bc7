use crate::session::StoredCookie;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "cobranza.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Stand-in for the browser cookie store: backend session cookies.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cookies(
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at TEXT,
            http_only INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS flags(
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

pub fn cookies_load(conn: &Connection) -> anyhow::Result<Vec<StoredCookie>> {
    let mut stmt =
        conn.prepare("SELECT name, value, expires_at, http_only FROM cookies ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            let name: String = row.get(0)?;
            let value: String = row.get(1)?;
            let expires_at: Option<String> = row.get(2)?;
            let http_only: i64 = row.get(3)?;
            Ok(StoredCookie {
                name,
                value,
                expires_at: parse_ts(expires_at),
                http_only: http_only != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace the persisted jar with the given cookies.
pub fn cookies_replace<'a, I>(conn: &Connection, cookies: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a StoredCookie>,
{
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM cookies", [])?;
    for c in cookies {
        tx.execute(
            "INSERT INTO cookies(name, value, expires_at, http_only) VALUES(?, ?, ?, ?)",
            (
                &c.name,
                &c.value,
                c.expires_at.map(|t| t.to_rfc3339()),
                c.http_only as i64,
            ),
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn flag_load(conn: &Connection, name: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT value, expires_at FROM flags WHERE name = ?",
            [name],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(row
        .filter(|(value, _)| value == "1")
        .and_then(|(_, expires_at)| parse_ts(expires_at)))
}

pub fn flag_store(
    conn: &Connection,
    name: &str,
    expires_at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    match expires_at {
        Some(t) => {
            conn.execute(
                "INSERT INTO flags(name, value, expires_at) VALUES(?, '1', ?)
                 ON CONFLICT(name) DO UPDATE SET value = '1', expires_at = excluded.expires_at",
                (name, t.to_rfc3339()),
            )?;
        }
        None => {
            conn.execute("DELETE FROM flags WHERE name = ?", [name])?;
        }
    }
    Ok(())
}
