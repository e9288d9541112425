//! Schema creation and backward-compatible column backfill for one store.

use rusqlite::{Connection, Result};

/// Initialize the database schema for one application store.
/// Ensures the `entries`, `settings` and `audit_log` tables exist, backfills
/// columns added after early deployments, and creates the indexes the
/// grouping and filter paths rely on.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,

            date             TEXT NOT NULL,          -- YYYY-MM-DD
            application_name TEXT NOT NULL,

            row_kind     TEXT NOT NULL DEFAULT 'main'
                         CHECK (row_kind IN ('main','prb','hiim','issue')),
            grouping_key TEXT,                       -- always date || '_' || application_name
            position     INTEGER NOT NULL DEFAULT 0, -- item-set slot within (grouping_key, row_kind)

            -- Common fields, duplicated onto every row of a logical entry
            day TEXT DEFAULT '',
            prc_mail_text TEXT DEFAULT '',
            prc_mail_status TEXT DEFAULT '',
            cp_alerts_text TEXT DEFAULT '',
            cp_alerts_status TEXT DEFAULT '',
            quality_status TEXT DEFAULT '',
            quality_legacy TEXT DEFAULT '',
            quality_target TEXT DEFAULT '',
            remarks TEXT DEFAULT '',
            valo_text TEXT DEFAULT '',
            valo_status TEXT DEFAULT '',
            sensi_text TEXT DEFAULT '',
            sensi_status TEXT DEFAULT '',
            cf_ra_text TEXT DEFAULT '',
            cf_ra_status TEXT DEFAULT '',
            acq_text TEXT DEFAULT '',
            root_cause_application TEXT DEFAULT '',
            root_cause_type TEXT DEFAULT '',
            xva_remarks TEXT DEFAULT '',
            closing TEXT DEFAULT '',
            iteration TEXT DEFAULT '',
            reg_issue TEXT DEFAULT '',
            action_taken_and_update TEXT DEFAULT '',
            reg_status TEXT DEFAULT '',
            reg_prb TEXT DEFAULT '',
            reg_hiim TEXT DEFAULT '',
            backlog_item TEXT DEFAULT '',
            timings TEXT DEFAULT '',
            timings_status TEXT DEFAULT '',
            puntuality_issue TEXT DEFAULT '',
            quality TEXT DEFAULT '',
            quality_issue TEXT DEFAULT '',
            others_prb TEXT DEFAULT '',
            others_hiim TEXT DEFAULT '',
            business_chain TEXT DEFAULT '',
            infra_weekend_manual INTEGER DEFAULT NULL,

            -- Kind-specific fields: only one kind populated per row
            prb_id_number TEXT DEFAULT '',
            prb_id_status TEXT DEFAULT '',
            prb_link TEXT DEFAULT '',
            hiim_id_number TEXT DEFAULT '',
            hiim_id_status TEXT DEFAULT '',
            hiim_link TEXT DEFAULT '',
            issue_description TEXT DEFAULT '',
            time_loss TEXT DEFAULT '',

            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            at TEXT NOT NULL,
            operation TEXT NOT NULL,
            target TEXT DEFAULT '',
            message TEXT NOT NULL
        );
        ",
    )?;

    backfill_missing_columns(conn)?;

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_entries_grouping_key ON entries(grouping_key);
        CREATE INDEX IF NOT EXISTS idx_entries_date_app ON entries(date, application_name);
        CREATE INDEX IF NOT EXISTS idx_entries_row_kind ON entries(row_kind);
        CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
        -- Store-enforced uniqueness of the logical entry: at most one main
        -- row per (date, application). Replaces a process-wide creation lock.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_main_unique
            ON entries(date, application_name) WHERE row_kind = 'main';
        ",
    )?;
    Ok(())
}

/// Columns added after the first deployments. Old database files are
/// patched in place so every store exposes the same schema.
fn backfill_missing_columns(conn: &Connection) -> Result<()> {
    let existing = table_columns(conn, "entries")?;
    let late_additions: [(&str, &str); 8] = [
        ("row_kind", "TEXT NOT NULL DEFAULT 'main'"),
        ("grouping_key", "TEXT"),
        ("position", "INTEGER NOT NULL DEFAULT 0"),
        ("time_loss", "TEXT DEFAULT ''"),
        ("infra_weekend_manual", "INTEGER DEFAULT NULL"),
        ("timings_status", "TEXT DEFAULT ''"),
        ("quality_status", "TEXT DEFAULT ''"),
        ("business_chain", "TEXT DEFAULT ''"),
    ];
    for (name, def) in late_additions {
        if !existing.iter().any(|c| c == name) {
            conn.execute_batch(&format!("ALTER TABLE entries ADD COLUMN {} {}", name, def))?;
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect()
}
