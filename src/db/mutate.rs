//! Alignment-Preserving Mutator: every write path for a logical entry.
//! Creates the main row plus its children atomically, reconciles desired
//! child lists against stored rows without disturbing unrelated item-set
//! positions, and destroys entries at grouping-key granularity.

use chrono::Utc;
use rusqlite::Connection;

use crate::errors::{AppError, AppResult};
use crate::models::items::{EntryInput, HiimItem, IssueItem, LogicalEntry, PrbItem};
use crate::models::row::{EntryRow, grouping_key};
use crate::models::row_kind::RowKind;

use super::group::group_rows;
use super::store;

const PRB_LINK_BASE: &str = "https://unity.itsm.socgen/saw/Problem";
const HIIM_LINK_BASE: &str = "https://unity.itsm.socgen/saw/custom/HighImpactIncident_c/details";

/// Canonical PRB link for an identifying number. Never overrides an
/// explicitly supplied link.
pub fn prb_link_for(id_number: &str, supplied: &str) -> String {
    if !supplied.trim().is_empty() || id_number.trim().is_empty() {
        supplied.to_string()
    } else {
        format!("{}/{}/general", PRB_LINK_BASE, id_number.trim())
    }
}

/// Canonical HIIM link for an identifying number; same override rule.
pub fn hiim_link_for(id_number: &str, supplied: &str) -> String {
    if !supplied.trim().is_empty() || id_number.trim().is_empty() {
        supplied.to_string()
    } else {
        format!("{}/{}/general", HIIM_LINK_BASE, id_number.trim())
    }
}

/// Child-kind behavior the reconciliation loop needs: which rows a kind
/// owns, and how a desired item lands on a row.
trait ChildItem {
    const KIND: RowKind;
    fn item_id(&self) -> Option<i64>;
    /// Write this item's kind-specific fields onto a fresh row.
    fn write_to(&self, row: &mut EntryRow);
    /// Patch an existing row in place. Blank identifying fields are left
    /// alone (the form sends only what changed); time-loss is desired
    /// state, an empty value clears it.
    fn patch_sql(&self) -> serde_json::Map<String, serde_json::Value>;
}

impl ChildItem for PrbItem {
    const KIND: RowKind = RowKind::Prb;

    fn item_id(&self) -> Option<i64> {
        self.id
    }

    fn write_to(&self, row: &mut EntryRow) {
        row.prb_id_number = self.prb_id_number.trim().to_string();
        row.prb_id_status = self.prb_id_status.clone();
        row.prb_link = prb_link_for(&self.prb_id_number, &self.prb_link);
    }

    fn patch_sql(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if !self.prb_id_number.trim().is_empty() {
            fields.insert("prb_id_number".into(), self.prb_id_number.trim().into());
        }
        if !self.prb_id_status.trim().is_empty() {
            fields.insert("prb_id_status".into(), self.prb_id_status.clone().into());
        }
        let link = prb_link_for(&self.prb_id_number, &self.prb_link);
        if !link.trim().is_empty() {
            fields.insert("prb_link".into(), link.into());
        }
        fields
    }
}

impl ChildItem for HiimItem {
    const KIND: RowKind = RowKind::Hiim;

    fn item_id(&self) -> Option<i64> {
        self.id
    }

    fn write_to(&self, row: &mut EntryRow) {
        row.hiim_id_number = self.hiim_id_number.trim().to_string();
        row.hiim_id_status = self.hiim_id_status.clone();
        row.hiim_link = hiim_link_for(&self.hiim_id_number, &self.hiim_link);
    }

    fn patch_sql(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if !self.hiim_id_number.trim().is_empty() {
            fields.insert("hiim_id_number".into(), self.hiim_id_number.trim().into());
        }
        if !self.hiim_id_status.trim().is_empty() {
            fields.insert("hiim_id_status".into(), self.hiim_id_status.clone().into());
        }
        let link = hiim_link_for(&self.hiim_id_number, &self.hiim_link);
        if !link.trim().is_empty() {
            fields.insert("hiim_link".into(), link.into());
        }
        fields
    }
}

impl ChildItem for IssueItem {
    const KIND: RowKind = RowKind::Issue;

    fn item_id(&self) -> Option<i64> {
        self.id
    }

    fn write_to(&self, row: &mut EntryRow) {
        row.issue_description = self.description.clone();
        row.time_loss = self.time_loss.trim().to_string();
    }

    fn patch_sql(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if !self.description.trim().is_empty() {
            fields.insert("issue_description".into(), self.description.clone().into());
        }
        fields.insert("time_loss".into(), self.time_loss.trim().into());
        fields
    }
}

/// Create a logical entry atomically: one main row plus the non-null child
/// items, all inside one transaction. Child positions are the input array
/// indices, so a leading `null` on create still reserves its item-set slot
/// without storing a row.
pub fn create_entry(conn: &mut Connection, input: &EntryInput) -> AppResult<LogicalEntry> {
    let date = input.date.trim();
    let app = input.application_name.trim();
    let key = grouping_key(date, app);

    let prbs = input.prbs.as_deref().unwrap_or(&[]);
    let hiims = input.hiims.as_deref().unwrap_or(&[]);
    let issues = input.issues.as_deref().unwrap_or(&[]);

    let tx = conn.transaction()?;

    let text = |v: &Option<String>| v.as_deref().unwrap_or("").to_string();

    let mut main = EntryRow::blank(date, app, RowKind::Main, 0);
    main.common = input.common_fields()?;
    // Legacy single-value fields land on the main row only when no array
    // supersedes them.
    if prbs.is_empty() {
        main.prb_id_number = text(&input.prb_id_number).trim().to_string();
        main.prb_id_status = text(&input.prb_id_status);
        main.prb_link = prb_link_for(&main.prb_id_number, &text(&input.prb_link));
    }
    if hiims.is_empty() {
        main.hiim_id_number = text(&input.hiim_id_number).trim().to_string();
        main.hiim_id_status = text(&input.hiim_id_status);
        main.hiim_link = hiim_link_for(&main.hiim_id_number, &text(&input.hiim_link));
    }
    if issues.is_empty() {
        main.issue_description = text(&input.issue_description);
        main.time_loss = text(&input.time_loss).trim().to_string();
    }

    let main_id =
        store::insert_row(&tx, &main).map_err(|e| AppError::from_insert(e, app, date))?;

    let mut child_count = 0usize;
    for (position, slot) in prbs.iter().enumerate() {
        if let Some(item) = slot {
            insert_child(&tx, &main, item, position as i64)?;
            child_count += 1;
        }
    }
    for (position, slot) in hiims.iter().enumerate() {
        if let Some(item) = slot {
            insert_child(&tx, &main, item, position as i64)?;
            child_count += 1;
        }
    }
    for (position, slot) in issues.iter().enumerate() {
        if let Some(item) = slot {
            insert_child(&tx, &main, item, position as i64)?;
            child_count += 1;
        }
    }

    store::audit(
        &tx,
        "create",
        &key,
        &format!("created main row {main_id} and {child_count} child row(s)"),
    )?;
    tx.commit()?;

    get_entry(conn, main_id)?.ok_or(AppError::NotFound(main_id))
}

/// New child row: common fields copied from the main row so the child stays
/// independently readable, other kinds' fields blanked.
fn insert_child<T: ChildItem>(
    conn: &Connection,
    main: &EntryRow,
    item: &T,
    position: i64,
) -> AppResult<i64> {
    let mut row = EntryRow::blank(&main.date, &main.application_name, T::KIND, position);
    row.common = main.common.clone();
    item.write_to(&mut row);
    Ok(store::insert_row(conn, &row)?)
}

/// Reconcile the desired child list of one kind against stored rows, in one
/// transaction scoped to that kind:
/// - `None` slot: delete the row at that position, create nothing.
/// - item with a known id: patch it in place and force `position = i`.
/// - item without id: insert a new row at `position = i`.
/// - stored rows not matched by the desired list are deleted.
fn upsert_children<T: ChildItem>(
    conn: &mut Connection,
    key: &str,
    desired: &[Option<T>],
) -> AppResult<()> {
    let tx = conn.transaction()?;

    let existing_ids: Vec<i64> = {
        let mut stmt = tx.prepare_cached(
            "SELECT id FROM entries WHERE grouping_key = ?1 AND row_kind = ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![key, T::KIND.to_db_str()],
            |r| r.get::<_, i64>(0),
        )?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let mut kept: Vec<i64> = Vec::new();
    for (i, slot) in desired.iter().enumerate() {
        let position = i as i64;
        match slot {
            None => {
                // This slot intentionally has no item of this kind.
                tx.execute(
                    "DELETE FROM entries
                     WHERE grouping_key = ?1 AND row_kind = ?2 AND position = ?3",
                    rusqlite::params![key, T::KIND.to_db_str(), position],
                )?;
            }
            Some(item) => match item.item_id().filter(|id| existing_ids.contains(id)) {
                Some(id) => {
                    store::update_fields(&tx, id, &item.patch_sql())?;
                    // Resolve drift if the form reordered items.
                    tx.execute(
                        "UPDATE entries SET position = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![position, Utc::now().to_rfc3339(), id],
                    )?;
                    kept.push(id);
                }
                None => {
                    let main = store::main_row_for_key(&tx, key)?
                        .ok_or_else(|| AppError::MissingMain(key.to_string()))?;
                    let id = insert_child(&tx, &main, item, position)?;
                    kept.push(id);
                }
            },
        }
    }

    // Shrinking the list removes trailing rows; anything unmatched goes.
    for id in existing_ids {
        if !kept.contains(&id) {
            store::delete_by_id(&tx, id)?;
        }
    }

    store::audit(
        &tx,
        "upsert_children",
        key,
        &format!("{} reconciled to {} slot(s)", T::KIND.to_db_str(), desired.len()),
    )?;
    tx.commit()?;
    Ok(())
}

/// Comprehensive update of a logical entry identified by its main row id.
/// Rewrites the common-field set on every row of the group so child rows
/// never drift from the main row, then reconciles each supplied child list
/// in its own transaction. A missing child list leaves that kind untouched.
pub fn update_entry(conn: &mut Connection, id: i64, input: &EntryInput) -> AppResult<LogicalEntry> {
    let current = store::fetch_by_id(conn, id)?.ok_or(AppError::NotFound(id))?;
    if !current.row_kind.is_main() {
        return Err(AppError::Validation(format!(
            "entry {id} is a {} row; logical-entry updates target the main row",
            current.row_kind.to_db_str()
        )));
    }
    let app = current.application_name.clone();
    if !input.application_name.trim().is_empty() && input.application_name.trim() != app {
        return Err(AppError::Validation(
            "application_name cannot change on update".to_string(),
        ));
    }

    let new_date = if input.date.trim().is_empty() {
        current.date.clone()
    } else {
        input.date.trim().to_string()
    };
    let old_key = grouping_key(&current.date, &app);
    let new_key = grouping_key(&new_date, &app);

    if new_key != old_key
        && store::main_row_for_key(conn, &new_key)?.is_some()
    {
        return Err(AppError::DuplicateEntry {
            application: app.clone(),
            date: new_date.clone(),
        });
    }

    {
        let tx = conn.transaction()?;

        // Merge semantics: only supplied fields land on the main row, so an
        // update touching one field never wipes the rest. A supplied array
        // supersedes the legacy single-value fields and blanks them.
        let mut main = current.clone();
        main.date = new_date.clone();
        main.grouping_key = new_key.clone();
        main.common = input.merged_common(&current.common)?;
        main.updated_at = Utc::now().to_rfc3339();
        if input.prbs.is_none() {
            if let Some(v) = &input.prb_id_number {
                main.prb_id_number = v.trim().to_string();
            }
            if let Some(v) = &input.prb_id_status {
                main.prb_id_status = v.clone();
            }
            if let Some(v) = &input.prb_link {
                main.prb_link = v.clone();
            }
            main.prb_link = prb_link_for(&main.prb_id_number, &main.prb_link);
        } else {
            main.prb_id_number.clear();
            main.prb_id_status.clear();
            main.prb_link.clear();
        }
        if input.hiims.is_none() {
            if let Some(v) = &input.hiim_id_number {
                main.hiim_id_number = v.trim().to_string();
            }
            if let Some(v) = &input.hiim_id_status {
                main.hiim_id_status = v.clone();
            }
            if let Some(v) = &input.hiim_link {
                main.hiim_link = v.clone();
            }
            main.hiim_link = hiim_link_for(&main.hiim_id_number, &main.hiim_link);
        } else {
            main.hiim_id_number.clear();
            main.hiim_id_status.clear();
            main.hiim_link.clear();
        }
        if input.issues.is_none() {
            if let Some(v) = &input.issue_description {
                main.issue_description = v.clone();
            }
            if let Some(v) = &input.time_loss {
                main.time_loss = v.trim().to_string();
            }
        } else {
            main.issue_description.clear();
            main.time_loss.clear();
        }
        replace_row(&tx, id, &main).map_err(|e| AppError::from_insert(e, &app, &new_date))?;

        // Keep every sibling self-sufficient: same date, same derived key,
        // same common-field set.
        propagate_common(&tx, &old_key, &main)?;

        store::audit(&tx, "update", &new_key, &format!("main row {id} updated"))?;
        tx.commit()?;
    }

    if let Some(prbs) = &input.prbs {
        upsert_children::<PrbItem>(conn, &new_key, prbs)?;
    }
    if let Some(hiims) = &input.hiims {
        upsert_children::<HiimItem>(conn, &new_key, hiims)?;
    }
    if let Some(issues) = &input.issues {
        upsert_children::<IssueItem>(conn, &new_key, issues)?;
    }

    get_entry(conn, id)?.ok_or(AppError::NotFound(id))
}

/// Overwrite one stored row with the given in-memory state (id unchanged).
fn replace_row(conn: &Connection, id: i64, row: &EntryRow) -> rusqlite::Result<()> {
    // Cheapest correct form: delete + reinsert under the same id would
    // churn the rowid, so patch through the generic field writer instead.
    let value = serde_json::to_value(row).expect("row serializes");
    let mut fields = value.as_object().cloned().unwrap_or_default();
    fields.remove("id");
    fields.remove("grouping_key");
    fields.remove("row_kind");
    store::update_fields(conn, id, &fields)?;
    Ok(())
}

/// Push the main row's date and common fields onto every row sharing the
/// old grouping key, re-deriving each row's key afterwards.
fn propagate_common(conn: &Connection, old_key: &str, main: &EntryRow) -> rusqlite::Result<()> {
    let value = serde_json::to_value(&main.common).expect("common fields serialize");
    let common_fields = value.as_object().cloned().unwrap_or_default();

    let siblings = store::rows_by_grouping_key(conn, old_key)?;
    for sibling in siblings.iter().filter(|r| r.id != main.id) {
        let mut fields = common_fields.clone();
        fields.insert("date".into(), main.date.clone().into());
        store::update_fields(conn, sibling.id, &fields)?;
    }
    Ok(())
}

/// Grouped view of one logical entry. A main-row id returns the full
/// position-aligned view; a child-row id returns just that row with empty
/// arrays (row-scoped reads never fabricate grouping).
pub fn get_entry(conn: &Connection, id: i64) -> AppResult<Option<LogicalEntry>> {
    let Some(row) = store::fetch_by_id(conn, id)? else {
        return Ok(None);
    };
    if !row.row_kind.is_main() {
        return Ok(Some(LogicalEntry {
            main: row,
            prbs: Vec::new(),
            hiims: Vec::new(),
            issues: Vec::new(),
            orphaned: false,
        }));
    }
    let rows = store::rows_by_grouping_key(conn, &row.grouping_key)?;
    Ok(group_rows(rows).into_iter().find(|e| e.main.id == id))
}

/// Grouped entries for one application, newest date first.
pub fn list_entries(
    conn: &Connection,
    application_name: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> AppResult<Vec<LogicalEntry>> {
    let rows = store::fetch_by_filter(conn, application_name, start_date, end_date, None)?;
    Ok(group_rows(rows))
}

/// Destroy the logical entry containing `id`: every row sharing its
/// grouping key goes, nothing else. Returns false when the id is unknown.
pub fn delete_entry(conn: &mut Connection, id: i64) -> AppResult<bool> {
    let Some(row) = store::fetch_by_id(conn, id)? else {
        return Ok(false);
    };
    let tx = conn.transaction()?;
    let removed = store::delete_by_grouping_key(&tx, &row.grouping_key)?;
    store::audit(
        &tx,
        "delete",
        &row.grouping_key,
        &format!("removed {removed} row(s)"),
    )?;
    tx.commit()?;
    Ok(removed > 0)
}

/// Delete exactly one row by id, leaving the rest of its group untouched.
pub fn delete_row(conn: &mut Connection, id: i64) -> AppResult<bool> {
    let tx = conn.transaction()?;
    let removed = store::delete_by_id(&tx, id)?;
    if removed > 0 {
        store::audit(&tx, "delete_row", &id.to_string(), "single row removed")?;
    }
    tx.commit()?;
    Ok(removed > 0)
}
