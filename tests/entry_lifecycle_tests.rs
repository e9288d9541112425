//! End-to-end lifecycle coverage for the independent-row engine: create,
//! grouped retrieval, alignment-preserving updates, and deletion at both
//! row and logical-entry granularity.

use std::path::PathBuf;

use prodvision::db::store;
use prodvision::errors::AppError;
use prodvision::manager::EntryManager;
use prodvision::models::items::{EntryInput, IssueItem, PrbItem};
use prodvision::models::row::grouping_key;

/// Fresh manager over a unique temp data directory.
fn setup(name: &str) -> (EntryManager, PathBuf) {
    let dir = std::env::temp_dir().join(format!("prodvision_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    (EntryManager::open(&dir).unwrap(), dir)
}

fn entry_json(value: serde_json::Value) -> EntryInput {
    serde_json::from_value(value).unwrap()
}

#[test]
fn create_then_get_round_trips_children() {
    let (mut manager, _dir) = setup("create_get");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prc_mail_status": "Green",
        "prbs": [{"prb_id_number": "101", "prb_id_status": "active"}],
        "hiims": [],
        "issues": [{"description": "net issue", "time_loss": "15 min"}]
    }));

    let created = manager.create_logical_entry(&input).unwrap();
    let entry = manager
        .get_logical_entry(created.main.id, Some("CVAR ALL"))
        .unwrap()
        .unwrap();

    assert_eq!(entry.main.date, "2025-10-03");
    assert_eq!(entry.main.common.prc_mail_status, "Green");

    assert_eq!(entry.prbs.len(), 1);
    let prb = entry.prbs[0].as_ref().unwrap();
    assert_eq!(prb.prb_id_number, "101");
    assert_eq!(
        prb.prb_link,
        "https://unity.itsm.socgen/saw/Problem/101/general"
    );

    // no HIIM was entered anywhere
    assert!(entry.hiims.iter().all(Option::is_none));

    let issue = entry.issues[0].as_ref().unwrap();
    assert_eq!(issue.description, "net issue");
    assert_eq!(issue.time_loss, "15 min");
}

#[test]
fn null_slots_keep_item_set_alignment() {
    // prbs=[null, X], hiims=[null, null], issues=[Y, Z]: position 0 must
    // never merge X into Y's slot.
    let (mut manager, _dir) = setup("null_padding");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prbs": [null, {"prb_id_number": "202", "prb_id_status": "active"}],
        "hiims": [null, null],
        "issues": [
            {"description": "first issue", "time_loss": "5 min"},
            {"description": "second issue"}
        ]
    }));

    let created = manager.create_logical_entry(&input).unwrap();
    let entry = manager
        .get_logical_entry(created.main.id, None)
        .unwrap()
        .unwrap();

    assert_eq!(entry.prbs.len(), 2);
    assert!(entry.prbs[0].is_none());
    assert_eq!(entry.prbs[1].as_ref().unwrap().prb_id_number, "202");
    assert_eq!(entry.prbs[1].as_ref().unwrap().position, 1);

    assert_eq!(entry.hiims, vec![None, None]);

    assert_eq!(entry.issues[0].as_ref().unwrap().description, "first issue");
    assert_eq!(entry.issues[1].as_ref().unwrap().description, "second issue");

    // Item-set view zips the same alignment
    let sets = entry.item_sets();
    assert_eq!(sets.len(), 2);
    assert!(sets[0].prb.is_none());
    assert_eq!(sets[0].issue.as_ref().unwrap().description, "first issue");
    assert_eq!(sets[1].prb.as_ref().unwrap().prb_id_number, "202");
}

#[test]
fn equal_length_lists_come_back_with_identical_values() {
    let (mut manager, _dir) = setup("round_trip_lengths");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-06",
        "application_name": "XVA",
        "valo_status": "Green",
        "prbs": [
            {"prb_id_number": "1", "prb_id_status": "active"},
            {"prb_id_number": "2", "prb_id_status": "closed"}
        ],
        "hiims": [
            {"hiim_id_number": "10", "hiim_id_status": "active"},
            {"hiim_id_number": "20", "hiim_id_status": "active"}
        ],
        "issues": [
            {"description": "a"},
            {"description": "b"}
        ]
    }));
    let created = manager.create_logical_entry(&input).unwrap();
    let entry = manager.get_logical_entry(created.main.id, None).unwrap().unwrap();

    assert_eq!(entry.prbs.len(), 2);
    assert_eq!(entry.hiims.len(), 2);
    assert_eq!(entry.issues.len(), 2);
    assert!(entry.prbs.iter().all(Option::is_some));
    assert!(entry.hiims.iter().all(Option::is_some));
    assert_eq!(entry.prbs[1].as_ref().unwrap().prb_id_number, "2");
    assert_eq!(entry.hiims[0].as_ref().unwrap().hiim_id_number, "10");
    assert_eq!(entry.issues[1].as_ref().unwrap().description, "b");
}

#[test]
fn duplicate_create_is_rejected() {
    let (mut manager, _dir) = setup("duplicate");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "REG"
    }));
    manager.create_logical_entry(&input).unwrap();

    let err = manager.create_logical_entry(&input).unwrap_err();
    match err {
        AppError::DuplicateEntry { application, date } => {
            assert_eq!(application, "REG");
            assert_eq!(date, "2025-10-03");
        }
        other => panic!("expected DuplicateEntry, got {other}"),
    }

    // Same date in a different application is a different logical entry
    let other_app = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "OTHERS"
    }));
    manager.create_logical_entry(&other_app).unwrap();
}

#[test]
fn deleting_one_child_row_leaves_siblings_untouched() {
    let (mut manager, dir) = setup("row_delete");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR NYQ",
        "issues": [
            {"description": "slot zero", "time_loss": "5 min"},
            {"description": "slot one"}
        ]
    }));
    let created = manager.create_logical_entry(&input).unwrap();
    let key = created.main.grouping_key.clone();
    let issue0_id = created.issues[0].as_ref().unwrap().id.unwrap();

    let store = prodvision::db::Store::open(&dir.join("cvar_nyq.db")).unwrap();
    let before = store::rows_by_grouping_key(&store.conn, &key).unwrap();
    assert_eq!(before.len(), 3); // main + 2 issues

    assert!(manager.delete_row(issue0_id, Some("CVAR NYQ")).unwrap());

    let after = store::rows_by_grouping_key(&store.conn, &key).unwrap();
    assert_eq!(after.len(), 2);
    // surviving rows are byte-identical to before
    for row in &after {
        let prior = before.iter().find(|r| r.id == row.id).unwrap();
        assert_eq!(prior, row);
    }

    // slot one keeps its position, slot zero is an empty slot now
    let entry = manager.get_logical_entry(created.main.id, None).unwrap().unwrap();
    assert!(entry.issues[0].is_none());
    assert_eq!(entry.issues[1].as_ref().unwrap().description, "slot one");
}

#[test]
fn logical_delete_cascades_to_the_whole_group_and_nothing_else() {
    let (mut manager, dir) = setup("cascade_delete");
    let first = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prbs": [{"prb_id_number": "1", "prb_id_status": "active"}],
        "issues": [{"description": "x"}]
    }));
    let second = entry_json(serde_json::json!({
        "date": "2025-10-04",
        "application_name": "CVAR ALL",
        "issues": [{"description": "y"}]
    }));
    let created = manager.create_logical_entry(&first).unwrap();
    manager.create_logical_entry(&second).unwrap();

    assert!(manager
        .delete_logical_entry(created.main.id, Some("CVAR ALL"))
        .unwrap());

    let store = prodvision::db::Store::open(&dir.join("cvar_all.db")).unwrap();
    assert_eq!(
        store::count_by_grouping_key(&store.conn, &grouping_key("2025-10-03", "CVAR ALL")).unwrap(),
        0
    );
    assert_eq!(
        store::count_by_grouping_key(&store.conn, &grouping_key("2025-10-04", "CVAR ALL")).unwrap(),
        2
    );

    // Deleting again reports false, not an error
    assert!(!manager.delete_logical_entry(created.main.id, None).unwrap());
}

#[test]
fn caller_supplied_grouping_key_is_ignored_everywhere() {
    let (mut manager, dir) = setup("derived_key");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "REG",
        "grouping_key": "totally_wrong",
        "issues": [{"description": "drift check"}]
    }));
    let created = manager.create_logical_entry(&input).unwrap();

    let store = prodvision::db::Store::open(&dir.join("reg.db")).unwrap();
    let rows =
        store::rows_by_grouping_key(&store.conn, &grouping_key("2025-10-03", "REG")).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.grouping_key, "2025-10-03_REG");
    }

    // Moving the entry to a new date re-derives the key on every row
    let update = entry_json(serde_json::json!({
        "date": "2025-10-07",
        "application_name": "REG",
        "grouping_key": "still_wrong"
    }));
    manager
        .update_logical_entry(created.main.id, &update, Some("REG"))
        .unwrap();

    let moved =
        store::rows_by_grouping_key(&store.conn, &grouping_key("2025-10-07", "REG")).unwrap();
    assert_eq!(moved.len(), 2);
    assert_eq!(
        store::count_by_grouping_key(&store.conn, &grouping_key("2025-10-03", "REG")).unwrap(),
        0
    );
}

#[test]
fn shrinking_a_child_list_deletes_exactly_the_trailing_rows() {
    let (mut manager, dir) = setup("shrink");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prbs": [{"prb_id_number": "101", "prb_id_status": "active"}],
        "issues": [{"description": "net issue", "time_loss": "15 min"}]
    }));
    let created = manager.create_logical_entry(&input).unwrap();
    let key = created.main.grouping_key.clone();

    let store = prodvision::db::Store::open(&dir.join("cvar_all.db")).unwrap();
    let before = store::count_by_grouping_key(&store.conn, &key).unwrap();

    let update = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prbs": []
    }));
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    assert!(updated.prbs.iter().all(Option::is_none));
    let after = store::count_by_grouping_key(&store.conn, &key).unwrap();
    assert_eq!(before - after, 1);
    // the issue row was left alone
    assert_eq!(updated.issues[0].as_ref().unwrap().description, "net issue");
}

#[test]
fn update_patches_existing_children_and_forces_positions() {
    let (mut manager, _dir) = setup("reorder");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prbs": [
            {"prb_id_number": "1", "prb_id_status": "active"},
            {"prb_id_number": "2", "prb_id_status": "active"}
        ]
    }));
    let created = manager.create_logical_entry(&input).unwrap();
    let id1 = created.prbs[0].as_ref().unwrap().id;
    let id2 = created.prbs[1].as_ref().unwrap().id;

    // Swap the two PRBs and close the second one
    let update = EntryInput {
        date: "2025-10-03".into(),
        application_name: "CVAR ALL".into(),
        prbs: Some(vec![
            Some(PrbItem {
                id: id2,
                prb_id_number: "2".into(),
                prb_id_status: "closed".into(),
                ..Default::default()
            }),
            Some(PrbItem {
                id: id1,
                prb_id_number: "1".into(),
                ..Default::default()
            }),
        ]),
        ..Default::default()
    };
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    let first = updated.prbs[0].as_ref().unwrap();
    let second = updated.prbs[1].as_ref().unwrap();
    assert_eq!(first.id, id2);
    assert_eq!(first.prb_id_status, "closed");
    assert_eq!(first.position, 0);
    assert_eq!(second.id, id1);
    assert_eq!(second.position, 1);
}

#[test]
fn update_with_null_slot_deletes_that_position_only() {
    let (mut manager, _dir) = setup("null_update");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "issues": [
            {"description": "keep me gone"},
            {"description": "survivor"}
        ]
    }));
    let created = manager.create_logical_entry(&input).unwrap();
    let survivor_id = created.issues[1].as_ref().unwrap().id;

    let update = EntryInput {
        date: "2025-10-03".into(),
        application_name: "CVAR ALL".into(),
        issues: Some(vec![
            None,
            Some(IssueItem {
                id: survivor_id,
                description: "survivor".into(),
                ..Default::default()
            }),
        ]),
        ..Default::default()
    };
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    assert!(updated.issues[0].is_none());
    assert_eq!(updated.issues[1].as_ref().unwrap().id, survivor_id);
    assert_eq!(updated.issues[1].as_ref().unwrap().position, 1);
}

#[test]
fn missing_child_list_leaves_that_kind_untouched() {
    let (mut manager, _dir) = setup("untouched_kind");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "hiims": [{"hiim_id_number": "7", "hiim_id_status": "active"}]
    }));
    let created = manager.create_logical_entry(&input).unwrap();

    // Update only common fields; no hiims array in the payload
    let update = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "remarks": "quiet day"
    }));
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    assert_eq!(updated.main.common.remarks, "quiet day");
    assert_eq!(updated.hiims[0].as_ref().unwrap().hiim_id_number, "7");
}

#[test]
fn update_keeps_common_fields_absent_from_the_payload() {
    let (mut manager, _dir) = setup("partial_update");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prc_mail_status": "Green",
        "cp_alerts_text": "two alerts"
    }));
    let created = manager.create_logical_entry(&input).unwrap();

    // Touch one field; everything else must survive
    let update = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "remarks": "late batch"
    }));
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    assert_eq!(updated.main.common.remarks, "late batch");
    assert_eq!(updated.main.common.prc_mail_status, "Green");
    assert_eq!(updated.main.common.cp_alerts_text, "two alerts");
}

#[test]
fn update_keeps_legacy_single_fields_absent_from_the_payload() {
    let (mut manager, _dir) = setup("partial_legacy");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prb_id_number": "999",
        "prb_id_status": "active",
        "time_loss": "10 min",
        "issue_description": "slow close"
    }));
    let created = manager.create_logical_entry(&input).unwrap();

    let update = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "remarks": "still open"
    }));
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();

    assert_eq!(updated.main.prb_id_number, "999");
    assert_eq!(updated.main.prb_id_status, "active");
    assert_eq!(updated.main.time_loss, "10 min");
    assert_eq!(updated.main.issue_description, "slow close");

    // An explicitly supplied value still overwrites
    let update = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "time_loss": ""
    }));
    let updated = manager
        .update_logical_entry(created.main.id, &update, Some("CVAR ALL"))
        .unwrap();
    assert_eq!(updated.main.time_loss, "");
    assert_eq!(updated.main.prb_id_number, "999");
}

#[test]
fn row_patch_is_validated_before_storage() {
    let (mut manager, _dir) = setup("patch_validation");
    let input = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prc_mail_status": "Green"
    }));
    let created = manager.create_logical_entry(&input).unwrap();

    let mut bad = serde_json::Map::new();
    bad.insert("prc_mail_status".to_string(), serde_json::json!("Purple"));
    assert!(matches!(
        manager.update_row_fields(created.main.id, &bad, Some("CVAR ALL")),
        Err(AppError::Validation(_))
    ));

    let mut bad_id = serde_json::Map::new();
    bad_id.insert("prb_id_number".to_string(), serde_json::json!("PRB-1"));
    assert!(manager
        .update_row_fields(created.main.id, &bad_id, Some("CVAR ALL"))
        .is_err());

    // Stored value untouched, and a valid patch still goes through
    let entry = manager.get_logical_entry(created.main.id, None).unwrap().unwrap();
    assert_eq!(entry.main.common.prc_mail_status, "Green");

    let mut ok = serde_json::Map::new();
    ok.insert("prc_mail_status".to_string(), serde_json::json!("Yellow"));
    manager
        .update_row_fields(created.main.id, &ok, Some("CVAR ALL"))
        .unwrap();
    let entry = manager.get_logical_entry(created.main.id, None).unwrap().unwrap();
    assert_eq!(entry.main.common.prc_mail_status, "Yellow");
}

#[test]
fn update_to_an_occupied_date_is_a_duplicate() {
    let (mut manager, _dir) = setup("update_duplicate");
    let a = entry_json(serde_json::json!({"date": "2025-10-03", "application_name": "OTHERS"}));
    let b = entry_json(serde_json::json!({"date": "2025-10-04", "application_name": "OTHERS"}));
    manager.create_logical_entry(&a).unwrap();
    let created_b = manager.create_logical_entry(&b).unwrap();

    let update = entry_json(serde_json::json!({"date": "2025-10-03", "application_name": "OTHERS"}));
    let err = manager
        .update_logical_entry(created_b.main.id, &update, Some("OTHERS"))
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry { .. }));
}

#[test]
fn validation_rejects_before_storage() {
    let (mut manager, dir) = setup("validation");
    let bad_status = entry_json(serde_json::json!({
        "date": "2025-10-03",
        "application_name": "CVAR ALL",
        "prc_mail_status": "Purple"
    }));
    assert!(matches!(
        manager.create_logical_entry(&bad_status),
        Err(AppError::Validation(_))
    ));

    let bad_date = entry_json(serde_json::json!({
        "date": "not-a-date",
        "application_name": "CVAR ALL"
    }));
    assert!(matches!(
        manager.create_logical_entry(&bad_date),
        Err(AppError::Validation(_))
    ));

    // nothing was written
    let store = prodvision::db::Store::open(&dir.join("cvar_all.db")).unwrap();
    let rows = store::fetch_by_filter(&store.conn, "CVAR ALL", None, None, None).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn list_entries_groups_by_date_newest_first() {
    let (mut manager, _dir) = setup("listing");
    for date in ["2025-10-01", "2025-10-02", "2025-10-03"] {
        let input = entry_json(serde_json::json!({
            "date": date,
            "application_name": "XVA",
            "issues": [{"description": format!("issue {date}")}]
        }));
        manager.create_logical_entry(&input).unwrap();
    }

    let entries = manager
        .list_logical_entries("XVA", None, None)
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].main.date, "2025-10-03");
    assert_eq!(entries[2].main.date, "2025-10-01");

    let ranged = manager
        .list_logical_entries("XVA", Some("2025-10-02"), Some("2025-10-02"))
        .unwrap();
    assert_eq!(ranged.len(), 1);
    assert_eq!(ranged[0].main.date, "2025-10-02");
}

#[test]
fn orphaned_children_still_produce_readable_entries() {
    let (manager, dir) = setup("orphans");
    drop(manager);

    // Simulate a partially-migrated store: child rows, no main row
    let store = prodvision::db::Store::open(&dir.join("cvar_all.db")).unwrap();
    let mut prb = prodvision::models::row::EntryRow::blank(
        "2025-10-03",
        "CVAR ALL",
        prodvision::models::row_kind::RowKind::Prb,
        0,
    );
    prb.prb_id_number = "404".into();
    store::insert_row(&store.conn, &prb).unwrap();
    drop(store);

    let manager = EntryManager::open(&dir).unwrap();
    let entries = manager.list_logical_entries("CVAR ALL", None, None).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].orphaned);
    assert_eq!(entries[0].main.prb_id_number, "404");
}

#[test]
fn settings_sidecar_round_trips() {
    let (mut manager, _dir) = setup("settings");
    assert_eq!(manager.get_setting("password_hash", None).unwrap(), None);
    manager.set_setting("password_hash", "s3cret", None).unwrap();
    assert_eq!(
        manager.get_setting("password_hash", None).unwrap().as_deref(),
        Some("s3cret")
    );
    // per-store isolation
    assert_eq!(manager.get_setting("password_hash", Some("REG")).unwrap(), None);
}
