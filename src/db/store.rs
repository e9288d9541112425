//! Row Store: durable keyed storage of independent rows for one
//! application database. No referential constraints between rows; every row
//! is a complete, independently deletable record.

use chrono::Utc;
use rusqlite::{Connection, Result, ToSql, named_params, params};
use std::path::Path;

use crate::models::row::{CommonFields, EntryRow};
use crate::models::row_kind::RowKind;

use super::schema::init_db;

/// One application's SQLite store.
pub struct Store {
    pub conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        init_db(&conn)?;
        Ok(Store { conn })
    }

    /// Private throwaway store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Store { conn })
    }
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=FULL;
        PRAGMA foreign_keys=ON;
        PRAGMA busy_timeout=5000;
        ",
    )
}

/// Map a SELECT * row onto EntryRow. Column access is by name so the
/// statement column order never matters.
pub fn row_to_entry_row(row: &rusqlite::Row) -> Result<EntryRow> {
    let kind_s: String = row.get("row_kind")?;
    let row_kind = RowKind::from_db_str(&kind_s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown row kind: {kind_s}").into(),
        )
    })?;

    let text = |name: &str| -> Result<String> {
        Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
    };

    Ok(EntryRow {
        id: row.get("id")?,
        date: row.get("date")?,
        application_name: row.get("application_name")?,
        row_kind,
        grouping_key: text("grouping_key")?,
        position: row.get::<_, Option<i64>>("position")?.unwrap_or(0),
        common: CommonFields {
            day: text("day")?,
            prc_mail_text: text("prc_mail_text")?,
            prc_mail_status: text("prc_mail_status")?,
            cp_alerts_text: text("cp_alerts_text")?,
            cp_alerts_status: text("cp_alerts_status")?,
            quality_status: text("quality_status")?,
            quality_legacy: text("quality_legacy")?,
            quality_target: text("quality_target")?,
            remarks: text("remarks")?,
            valo_text: text("valo_text")?,
            valo_status: text("valo_status")?,
            sensi_text: text("sensi_text")?,
            sensi_status: text("sensi_status")?,
            cf_ra_text: text("cf_ra_text")?,
            cf_ra_status: text("cf_ra_status")?,
            acq_text: text("acq_text")?,
            root_cause_application: text("root_cause_application")?,
            root_cause_type: text("root_cause_type")?,
            xva_remarks: text("xva_remarks")?,
            closing: text("closing")?,
            iteration: text("iteration")?,
            reg_issue: text("reg_issue")?,
            action_taken_and_update: text("action_taken_and_update")?,
            reg_status: text("reg_status")?,
            reg_prb: text("reg_prb")?,
            reg_hiim: text("reg_hiim")?,
            backlog_item: text("backlog_item")?,
            timings: text("timings")?,
            timings_status: text("timings_status")?,
            puntuality_issue: text("puntuality_issue")?,
            quality: text("quality")?,
            quality_issue: text("quality_issue")?,
            others_prb: text("others_prb")?,
            others_hiim: text("others_hiim")?,
            business_chain: text("business_chain")?,
            infra_weekend_manual: row.get("infra_weekend_manual")?,
        },
        prb_id_number: text("prb_id_number")?,
        prb_id_status: text("prb_id_status")?,
        prb_link: text("prb_link")?,
        hiim_id_number: text("hiim_id_number")?,
        hiim_id_status: text("hiim_id_status")?,
        hiim_link: text("hiim_link")?,
        issue_description: text("issue_description")?,
        time_loss: text("time_loss")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert one row exactly as given (grouping key included) and return its
/// id. Never inspects or touches sibling rows.
pub fn insert_row(conn: &Connection, row: &EntryRow) -> Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO entries (
            date, application_name, row_kind, grouping_key, position,
            day, prc_mail_text, prc_mail_status, cp_alerts_text, cp_alerts_status,
            quality_status, quality_legacy, quality_target, remarks,
            valo_text, valo_status, sensi_text, sensi_status,
            cf_ra_text, cf_ra_status, acq_text,
            root_cause_application, root_cause_type, xva_remarks,
            closing, iteration, reg_issue, action_taken_and_update,
            reg_status, reg_prb, reg_hiim, backlog_item,
            timings, timings_status, puntuality_issue, quality, quality_issue,
            others_prb, others_hiim, business_chain, infra_weekend_manual,
            prb_id_number, prb_id_status, prb_link,
            hiim_id_number, hiim_id_status, hiim_link,
            issue_description, time_loss,
            created_at, updated_at
        ) VALUES (
            :date, :application_name, :row_kind, :grouping_key, :position,
            :day, :prc_mail_text, :prc_mail_status, :cp_alerts_text, :cp_alerts_status,
            :quality_status, :quality_legacy, :quality_target, :remarks,
            :valo_text, :valo_status, :sensi_text, :sensi_status,
            :cf_ra_text, :cf_ra_status, :acq_text,
            :root_cause_application, :root_cause_type, :xva_remarks,
            :closing, :iteration, :reg_issue, :action_taken_and_update,
            :reg_status, :reg_prb, :reg_hiim, :backlog_item,
            :timings, :timings_status, :puntuality_issue, :quality, :quality_issue,
            :others_prb, :others_hiim, :business_chain, :infra_weekend_manual,
            :prb_id_number, :prb_id_status, :prb_link,
            :hiim_id_number, :hiim_id_status, :hiim_link,
            :issue_description, :time_loss,
            :created_at, :updated_at
        )",
    )?;
    stmt.execute(named_params! {
        ":date": row.date,
        ":application_name": row.application_name,
        ":row_kind": row.row_kind.to_db_str(),
        ":grouping_key": row.grouping_key,
        ":position": row.position,
        ":day": row.common.day,
        ":prc_mail_text": row.common.prc_mail_text,
        ":prc_mail_status": row.common.prc_mail_status,
        ":cp_alerts_text": row.common.cp_alerts_text,
        ":cp_alerts_status": row.common.cp_alerts_status,
        ":quality_status": row.common.quality_status,
        ":quality_legacy": row.common.quality_legacy,
        ":quality_target": row.common.quality_target,
        ":remarks": row.common.remarks,
        ":valo_text": row.common.valo_text,
        ":valo_status": row.common.valo_status,
        ":sensi_text": row.common.sensi_text,
        ":sensi_status": row.common.sensi_status,
        ":cf_ra_text": row.common.cf_ra_text,
        ":cf_ra_status": row.common.cf_ra_status,
        ":acq_text": row.common.acq_text,
        ":root_cause_application": row.common.root_cause_application,
        ":root_cause_type": row.common.root_cause_type,
        ":xva_remarks": row.common.xva_remarks,
        ":closing": row.common.closing,
        ":iteration": row.common.iteration,
        ":reg_issue": row.common.reg_issue,
        ":action_taken_and_update": row.common.action_taken_and_update,
        ":reg_status": row.common.reg_status,
        ":reg_prb": row.common.reg_prb,
        ":reg_hiim": row.common.reg_hiim,
        ":backlog_item": row.common.backlog_item,
        ":timings": row.common.timings,
        ":timings_status": row.common.timings_status,
        ":puntuality_issue": row.common.puntuality_issue,
        ":quality": row.common.quality,
        ":quality_issue": row.common.quality_issue,
        ":others_prb": row.common.others_prb,
        ":others_hiim": row.common.others_hiim,
        ":business_chain": row.common.business_chain,
        ":infra_weekend_manual": row.common.infra_weekend_manual,
        ":prb_id_number": row.prb_id_number,
        ":prb_id_status": row.prb_id_status,
        ":prb_link": row.prb_link,
        ":hiim_id_number": row.hiim_id_number,
        ":hiim_id_status": row.hiim_id_status,
        ":hiim_link": row.hiim_link,
        ":issue_description": row.issue_description,
        ":time_loss": row.time_loss,
        ":created_at": row.created_at,
        ":updated_at": row.updated_at,
    })?;
    Ok(conn.last_insert_rowid())
}

/// Retrieve a single row by id.
pub fn fetch_by_id(conn: &Connection, id: i64) -> Result<Option<EntryRow>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM entries WHERE id = ?1")?;
    match stmt.query_row([id], row_to_entry_row) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Rows for one application, optionally narrowed to a date range and a row
/// kind, ordered by `(date desc, grouping_key, position)`.
pub fn fetch_by_filter(
    conn: &Connection,
    application_name: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
    row_kind: Option<RowKind>,
) -> Result<Vec<EntryRow>> {
    let mut sql = "SELECT * FROM entries WHERE application_name = ?".to_string();
    let mut owned: Vec<String> = vec![application_name.to_string()];

    if let Some(start) = start_date {
        sql.push_str(" AND date >= ?");
        owned.push(start.to_string());
    }
    if let Some(end) = end_date {
        sql.push_str(" AND date <= ?");
        owned.push(end.to_string());
    }
    if let Some(kind) = row_kind {
        sql.push_str(" AND row_kind = ?");
        owned.push(kind.to_db_str().to_string());
    }
    sql.push_str(" ORDER BY date DESC, grouping_key, position");

    let mut stmt = conn.prepare_cached(&sql)?;
    let param_refs: Vec<&dyn ToSql> = owned.iter().map(|s| s as &dyn ToSql).collect();
    let rows = stmt.query_map(param_refs.as_slice(), row_to_entry_row)?;
    rows.collect()
}

/// All rows sharing a grouping key, in position order.
pub fn rows_by_grouping_key(conn: &Connection, key: &str) -> Result<Vec<EntryRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM entries WHERE grouping_key = ?1 ORDER BY position ASC, id ASC",
    )?;
    let rows = stmt.query_map([key], row_to_entry_row)?;
    rows.collect()
}

/// The single main row of a group, if it exists.
pub fn main_row_for_key(conn: &Connection, key: &str) -> Result<Option<EntryRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM entries WHERE grouping_key = ?1 AND row_kind = 'main' LIMIT 1",
    )?;
    match stmt.query_row([key], row_to_entry_row) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

// Columns a partial field patch may touch. Identity, derivation and
// timestamp columns are deliberately absent.
const PATCHABLE_COLUMNS: [&str; 47] = [
    "date",
    "application_name",
    "position",
    "day",
    "prc_mail_text",
    "prc_mail_status",
    "cp_alerts_text",
    "cp_alerts_status",
    "quality_status",
    "quality_legacy",
    "quality_target",
    "remarks",
    "valo_text",
    "valo_status",
    "sensi_text",
    "sensi_status",
    "cf_ra_text",
    "cf_ra_status",
    "acq_text",
    "root_cause_application",
    "root_cause_type",
    "xva_remarks",
    "closing",
    "iteration",
    "reg_issue",
    "action_taken_and_update",
    "reg_status",
    "reg_prb",
    "reg_hiim",
    "backlog_item",
    "timings",
    "timings_status",
    "puntuality_issue",
    "quality",
    "quality_issue",
    "others_prb",
    "others_hiim",
    "business_chain",
    "infra_weekend_manual",
    "prb_id_number",
    "prb_id_status",
    "prb_link",
    "hiim_id_number",
    "hiim_id_status",
    "hiim_link",
    "issue_description",
    "time_loss",
];

/// In-place field patch on one row; does not cascade to other rows.
/// Unknown field names are skipped, `updated_at` is always refreshed, and
/// if `date` or `application_name` changes the grouping key is re-derived
/// from the stored values (it is never an input).
pub fn update_fields(
    conn: &Connection,
    id: i64,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<usize> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    for (name, value) in fields {
        if !PATCHABLE_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        sets.push(format!("{} = ?", name));
        values.push(json_to_sql(value));
    }

    sets.push("updated_at = ?".to_string());
    values.push(rusqlite::types::Value::Text(Utc::now().to_rfc3339()));
    values.push(rusqlite::types::Value::Integer(id));

    let sql = format!("UPDATE entries SET {} WHERE id = ?", sets.join(", "));
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
    let changed = conn.execute(&sql, param_refs.as_slice())?;

    if changed > 0 && (fields.contains_key("date") || fields.contains_key("application_name")) {
        conn.execute(
            "UPDATE entries SET grouping_key = date || '_' || application_name WHERE id = ?1",
            [id],
        )?;
    }
    Ok(changed)
}

fn json_to_sql(value: &serde_json::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        serde_json::Value::Null => Sql::Null,
        serde_json::Value::Bool(b) => Sql::Integer(*b as i64),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

pub fn delete_by_id(conn: &Connection, id: i64) -> Result<usize> {
    conn.execute("DELETE FROM entries WHERE id = ?1", [id])
}

/// Bulk delete of an entire logical entry. Returns rows removed.
pub fn delete_by_grouping_key(conn: &Connection, key: &str) -> Result<usize> {
    conn.execute("DELETE FROM entries WHERE grouping_key = ?1", params![key])
}

pub fn count_by_grouping_key(conn: &Connection, key: &str) -> Result<i64> {
    let mut stmt = conn.prepare_cached("SELECT COUNT(*) FROM entries WHERE grouping_key = ?1")?;
    stmt.query_row([key], |r| r.get(0))
}

/// Append an audit record; called inside the same transaction as the
/// mutation it describes.
pub fn audit(conn: &Connection, operation: &str, target: &str, message: &str) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO audit_log (at, operation, target, message) VALUES (?1, ?2, ?3, ?4)",
    )?;
    stmt.execute(params![Utc::now().to_rfc3339(), operation, target, message])?;
    Ok(())
}
