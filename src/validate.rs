//! Input validation for logical-entry writes. Everything here runs before
//! any storage is touched; a rejection never leaves partial rows behind.

use chrono::NaiveDate;

use crate::errors::{AppError, AppResult};
use crate::models::application::Application;
use crate::models::items::EntryInput;
use crate::models::row::CommonFields;

const TRAFFIC_LIGHT: [&str; 3] = ["Red", "Yellow", "Green"];
const ITEM_STATUSES: [&str; 2] = ["active", "closed"];
// Legacy and current REG status spellings are both accepted.
const REG_STATUSES: [&str; 7] = [
    "ongoing",
    "open",
    "closed",
    "Open",
    "In Progress",
    "Resolved",
    "Closed",
];

fn fail(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

fn check_one_of(value: &str, allowed: &[&str], what: &str) -> AppResult<()> {
    if value.is_empty() || allowed.contains(&value) {
        Ok(())
    } else {
        Err(fail(format!("invalid {what}: {value}")))
    }
}

fn check_numeric_id(value: &str, what: &str) -> AppResult<()> {
    if value.trim().is_empty() || value.trim().parse::<i64>().is_ok() {
        Ok(())
    } else {
        Err(fail(format!("invalid {what}: {value}")))
    }
}

fn check_item_date(item_date: &Option<String>, entry_date: &str) -> AppResult<()> {
    if let Some(d) = item_date
        && !d.trim().is_empty()
        && d.trim() != entry_date
    {
        return Err(fail(format!(
            "child item date {d} does not match entry date {entry_date}"
        )));
    }
    Ok(())
}

pub fn validate_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| fail(format!("invalid date: {date} (expected YYYY-MM-DD)")))
}

fn check_common_statuses(app: Application, input: &EntryInput) -> AppResult<()> {
    match app {
        Application::Xva => {
            check_one_of(input.common_text("valo_status"), &TRAFFIC_LIGHT, "VALO status")?;
            check_one_of(input.common_text("sensi_status"), &TRAFFIC_LIGHT, "SENSI status")?;
            check_one_of(input.common_text("cf_ra_status"), &TRAFFIC_LIGHT, "CF RA status")?;
            check_one_of(
                input.common_text("quality_legacy"),
                &TRAFFIC_LIGHT,
                "quality legacy status",
            )?;
            check_one_of(
                input.common_text("quality_target"),
                &TRAFFIC_LIGHT,
                "quality target status",
            )?;
        }
        Application::Reg => {
            check_one_of(input.common_text("reg_status"), &REG_STATUSES, "REG status")?;
        }
        Application::Others => {
            // Only date and application_name are required; the rest of the
            // OTHERS fields are free-form.
        }
        Application::CvarAll | Application::CvarNyq => {
            check_one_of(
                input.common_text("prc_mail_status"),
                &TRAFFIC_LIGHT,
                "PRC mail status",
            )?;
            check_one_of(
                input.common_text("cp_alerts_status"),
                &TRAFFIC_LIGHT,
                "CP alerts status",
            )?;
            check_one_of(input.common_text("quality_status"), &TRAFFIC_LIGHT, "quality status")?;
        }
    }
    Ok(())
}

/// Validate a create/update payload for the given application. Status
/// vocabularies differ per application family; child items are checked both
/// at the top level and inside the arrays.
pub fn validate_entry_input(input: &EntryInput) -> AppResult<Application> {
    if input.date.trim().is_empty() {
        return Err(fail("missing required field: date"));
    }
    if input.application_name.trim().is_empty() {
        return Err(fail("missing required field: application_name"));
    }
    validate_date(&input.date)?;
    let app = Application::from_name(&input.application_name)
        .ok_or_else(|| AppError::UnknownApplication(input.application_name.clone()))?;

    // Surfaces wrongly-typed common values before any of them are stored.
    input.merged_common(&CommonFields::default())?;
    check_common_statuses(app, input)?;

    // Legacy single-value item fields
    let text = |v: &Option<String>| v.as_deref().unwrap_or("").to_string();
    check_numeric_id(&text(&input.prb_id_number), "PRB id number")?;
    check_one_of(&text(&input.prb_id_status), &ITEM_STATUSES, "PRB id status")?;
    check_numeric_id(&text(&input.hiim_id_number), "HIIM id number")?;
    check_one_of(&text(&input.hiim_id_status), &ITEM_STATUSES, "HIIM id status")?;

    // Array items; child rows must never couple to another date
    let entry_date = input.date.trim();
    for prb in input.prbs.iter().flatten().flatten() {
        check_numeric_id(&prb.prb_id_number, "PRB id number")?;
        check_one_of(&prb.prb_id_status, &ITEM_STATUSES, "PRB id status")?;
        check_item_date(&prb.date, entry_date)?;
    }
    for hiim in input.hiims.iter().flatten().flatten() {
        check_numeric_id(&hiim.hiim_id_number, "HIIM id number")?;
        check_one_of(&hiim.hiim_id_status, &ITEM_STATUSES, "HIIM id status")?;
        check_item_date(&hiim.date, entry_date)?;
    }
    for issue in input.issues.iter().flatten().flatten() {
        check_item_date(&issue.date, entry_date)?;
    }

    Ok(app)
}

/// Validate a row-scoped field patch before it reaches storage: only the
/// supplied columns are checked, against the same vocabularies a full
/// payload would face for this application.
pub fn validate_row_patch(
    app: Application,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> AppResult<()> {
    let text = |key: &str| -> &str { fields.get(key).and_then(|v| v.as_str()).unwrap_or("") };

    if fields.contains_key("date") {
        validate_date(text("date"))?;
    }

    let statuses: &[&str] = match app {
        Application::Xva => &[
            "valo_status",
            "sensi_status",
            "cf_ra_status",
            "quality_legacy",
            "quality_target",
        ],
        Application::Reg => &[],
        Application::Others => &[],
        Application::CvarAll | Application::CvarNyq => {
            &["prc_mail_status", "cp_alerts_status", "quality_status"]
        }
    };
    for &key in statuses {
        if fields.contains_key(key) {
            check_one_of(text(key), &TRAFFIC_LIGHT, key)?;
        }
    }
    if app == Application::Reg && fields.contains_key("reg_status") {
        check_one_of(text("reg_status"), &REG_STATUSES, "REG status")?;
    }

    if fields.contains_key("prb_id_number") {
        check_numeric_id(text("prb_id_number"), "PRB id number")?;
    }
    if fields.contains_key("prb_id_status") {
        check_one_of(text("prb_id_status"), &ITEM_STATUSES, "PRB id status")?;
    }
    if fields.contains_key("hiim_id_number") {
        check_numeric_id(text("hiim_id_number"), "HIIM id number")?;
    }
    if fields.contains_key("hiim_id_status") {
        check_one_of(text("hiim_id_status"), &ITEM_STATUSES, "HIIM id status")?;
    }
    Ok(())
}
