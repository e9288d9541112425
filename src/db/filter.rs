//! Row-Level Filter: the bypass path that answers kind-specific listings
//! ("every row that carries a PRB") straight from the flat store, then
//! enriches each match with sibling data from its group.

use std::collections::HashMap;

use rusqlite::{Connection, Result, ToSql};

use crate::errors::AppResult;
use crate::models::items::{HiimItem, IssueItem, PrbItem, RowView};
use crate::models::row::EntryRow;
use crate::models::row_kind::{RowFilter, RowKind};

use super::store::row_to_entry_row;

// Placeholder spellings that disqualify a time-loss value, mirrored in the
// meaningful_time_loss helper used on the Rust side.
const TIME_LOSS_SQL_GUARD: &str =
    "time_loss IS NOT NULL AND TRIM(time_loss) != '' \
     AND TRIM(UPPER(time_loss)) NOT IN ('N/A', 'NA', 'NONE', 'NULL')";

fn kind_predicate(filter: RowFilter) -> String {
    match filter {
        // A row qualifies on its own kind only when it actually carries
        // identifying data; main rows qualify through the legacy
        // single-value fields.
        RowFilter::Prb => "(row_kind IN ('prb', 'main') AND TRIM(prb_id_number) != '')".to_string(),
        RowFilter::Hiim => {
            "(row_kind IN ('hiim', 'main') AND TRIM(hiim_id_number) != '')".to_string()
        }
        RowFilter::Issue => {
            "(row_kind IN ('issue', 'main') AND TRIM(issue_description) != '')".to_string()
        }
        // Time-loss lives on either an issue row or a main row for the same
        // entry; the main row only reports when no sibling issue row does,
        // so the same fact is never listed twice.
        RowFilter::TimeLoss => format!(
            "((row_kind = 'issue' AND {guard}) \
              OR (row_kind = 'main' AND {guard} \
                  AND NOT EXISTS ( \
                      SELECT 1 FROM entries e2 \
                      WHERE e2.grouping_key = entries.grouping_key \
                        AND e2.row_kind = 'issue' AND {guard})))",
            guard = TIME_LOSS_SQL_GUARD,
        ),
    }
}

/// Ungrouped, kind-specific row listing for one application, ordered by
/// `(date desc, grouping_key, position)`.
pub fn filter_rows(
    conn: &Connection,
    application_name: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
    filter: RowFilter,
) -> AppResult<Vec<RowView>> {
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
    sql.push_str(" AND ");
    sql.push_str(&kind_predicate(filter));
    sql.push_str(" ORDER BY date DESC, grouping_key, position");

    let matched = {
        let mut stmt = conn.prepare_cached(&sql)?;
        let param_refs: Vec<&dyn ToSql> = owned.iter().map(|s| s as &dyn ToSql).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_entry_row)?;
        rows.collect::<Result<Vec<EntryRow>>>()?
    };

    let siblings = siblings_by_key(conn, &matched)?;
    Ok(matched
        .into_iter()
        .map(|row| enrich(row, &siblings))
        .collect())
}

/// Fetch every row belonging to the grouping keys of the matched set, one
/// query, keyed for the enrichment pass.
fn siblings_by_key(
    conn: &Connection,
    matched: &[EntryRow],
) -> Result<HashMap<String, Vec<EntryRow>>> {
    let mut keys: Vec<&str> = matched.iter().map(|r| r.grouping_key.as_str()).collect();
    keys.sort_unstable();
    keys.dedup();
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let mut sql = String::from("SELECT * FROM entries WHERE grouping_key IN (");
    sql.push_str(&vec!["?"; keys.len()].join(","));
    sql.push_str(") ORDER BY position ASC, id ASC");
    let param_refs: Vec<&dyn ToSql> = keys.iter().map(|k| k as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), row_to_entry_row)?;

    let mut map: HashMap<String, Vec<EntryRow>> = HashMap::new();
    for row in rows {
        let row = row?;
        map.entry(row.grouping_key.clone()).or_default().push(row);
    }
    Ok(map)
}

/// Attach sibling child data so the caller sees a complete-enough record:
/// the matched row keeps its own identity, the arrays carry the group's
/// items of each kind, and blank scalar fields borrow from the first
/// sibling that has them.
fn enrich(mut row: EntryRow, siblings: &HashMap<String, Vec<EntryRow>>) -> RowView {
    let group = siblings.get(&row.grouping_key).map(Vec::as_slice).unwrap_or(&[]);

    let mut prbs: Vec<PrbItem> = Vec::new();
    let mut hiims: Vec<HiimItem> = Vec::new();
    let mut issues: Vec<IssueItem> = Vec::new();
    for sibling in group {
        match sibling.row_kind {
            RowKind::Prb => prbs.push(PrbItem::from_row(sibling)),
            RowKind::Hiim => hiims.push(HiimItem::from_row(sibling)),
            RowKind::Issue => issues.push(IssueItem::from_row(sibling)),
            RowKind::Main => {}
        }
    }

    // Legacy single-value case: a main row's own data is the only item.
    if row.row_kind.is_main() {
        if prbs.is_empty() && row.has_prb() {
            prbs.push(PrbItem::from_row(&row));
        }
        if hiims.is_empty() && row.has_hiim() {
            hiims.push(HiimItem::from_row(&row));
        }
        if issues.is_empty() && row.has_issue() {
            issues.push(IssueItem::from_row(&row));
        }
    }

    if !row.has_prb()
        && let Some(first) = prbs.first()
    {
        row.prb_id_number = first.prb_id_number.clone();
        row.prb_id_status = first.prb_id_status.clone();
        row.prb_link = first.prb_link.clone();
    }
    if !row.has_hiim()
        && let Some(first) = hiims.first()
    {
        row.hiim_id_number = first.hiim_id_number.clone();
        row.hiim_id_status = first.hiim_id_status.clone();
        row.hiim_link = first.hiim_link.clone();
    }
    if !row.has_issue()
        && let Some(first) = issues.first()
    {
        row.issue_description = first.description.clone();
    }

    RowView {
        row,
        prbs,
        hiims,
        issues,
    }
}
