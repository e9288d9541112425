use serde::{Deserialize, Serialize};

use super::row_kind::RowKind;

/// Derive the grouping key a row must carry. This is the only source of
/// truth: caller-supplied values are ignored and recomputed on every write.
pub fn grouping_key(date: &str, application_name: &str) -> String {
    format!("{}_{}", date, application_name)
}

/// The ~30 attributes copied verbatim onto every row of a logical entry so
/// that any single row stays readable without a join. Centralizing them in
/// one struct makes the duplication a single assignment at row-construction
/// time instead of a repeated field list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonFields {
    #[serde(default)]
    pub day: String,

    // CVAR timing/quality fields
    #[serde(default)]
    pub prc_mail_text: String,
    #[serde(default)]
    pub prc_mail_status: String,
    #[serde(default)]
    pub cp_alerts_text: String,
    #[serde(default)]
    pub cp_alerts_status: String,
    #[serde(default)]
    pub quality_status: String,
    #[serde(default)]
    pub quality_legacy: String,
    #[serde(default)]
    pub quality_target: String,
    #[serde(default)]
    pub remarks: String,

    // XVA-specific fields
    #[serde(default)]
    pub valo_text: String,
    #[serde(default)]
    pub valo_status: String,
    #[serde(default)]
    pub sensi_text: String,
    #[serde(default)]
    pub sensi_status: String,
    #[serde(default)]
    pub cf_ra_text: String,
    #[serde(default)]
    pub cf_ra_status: String,
    #[serde(default)]
    pub acq_text: String,
    #[serde(default)]
    pub root_cause_application: String,
    #[serde(default)]
    pub root_cause_type: String,
    #[serde(default)]
    pub xva_remarks: String,

    // REG-specific fields
    #[serde(default)]
    pub closing: String,
    #[serde(default)]
    pub iteration: String,
    #[serde(default)]
    pub reg_issue: String,
    #[serde(default)]
    pub action_taken_and_update: String,
    #[serde(default)]
    pub reg_status: String,
    #[serde(default)]
    pub reg_prb: String,
    #[serde(default)]
    pub reg_hiim: String,
    #[serde(default)]
    pub backlog_item: String,

    // OTHERS-specific fields
    #[serde(default)]
    pub timings: String,
    #[serde(default)]
    pub timings_status: String,
    #[serde(default)]
    pub puntuality_issue: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub quality_issue: String,
    #[serde(default)]
    pub others_prb: String,
    #[serde(default)]
    pub others_hiim: String,
    #[serde(default)]
    pub business_chain: String,

    // NULL = auto-detect 3rd Monday, 0 = manually unchecked, 1 = checked
    #[serde(default)]
    pub infra_weekend_manual: Option<i64>,
}

/// One persisted row, the only stored entity. Kind-specific fields for
/// other kinds are always blank (row independence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    pub id: i64,
    pub date: String,
    pub application_name: String,
    pub row_kind: RowKind,
    pub grouping_key: String,
    pub position: i64,

    #[serde(flatten)]
    pub common: CommonFields,

    #[serde(default)]
    pub prb_id_number: String,
    #[serde(default)]
    pub prb_id_status: String,
    #[serde(default)]
    pub prb_link: String,

    #[serde(default)]
    pub hiim_id_number: String,
    #[serde(default)]
    pub hiim_id_status: String,
    #[serde(default)]
    pub hiim_link: String,

    #[serde(default)]
    pub issue_description: String,
    #[serde(default)]
    pub time_loss: String,

    pub created_at: String,
    pub updated_at: String,
}

impl EntryRow {
    /// Blank row skeleton for a given group; the caller fills kind fields.
    pub fn blank(date: &str, application_name: &str, row_kind: RowKind, position: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        EntryRow {
            id: 0,
            date: date.to_string(),
            application_name: application_name.to_string(),
            row_kind,
            grouping_key: grouping_key(date, application_name),
            position,
            common: CommonFields::default(),
            prb_id_number: String::new(),
            prb_id_status: String::new(),
            prb_link: String::new(),
            hiim_id_number: String::new(),
            hiim_id_status: String::new(),
            hiim_link: String::new(),
            issue_description: String::new(),
            time_loss: String::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn has_prb(&self) -> bool {
        !self.prb_id_number.trim().is_empty()
    }

    pub fn has_hiim(&self) -> bool {
        !self.hiim_id_number.trim().is_empty()
    }

    pub fn has_issue(&self) -> bool {
        !self.issue_description.trim().is_empty()
    }
}

/// Time-loss values treated as placeholders rather than data.
pub const TIME_LOSS_PLACEHOLDERS: [&str; 4] = ["N/A", "NA", "NONE", "NULL"];

/// A time-loss value counts only when non-empty and not a placeholder
/// (case-insensitive).
pub fn meaningful_time_loss(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return false;
    }
    let upper = v.to_uppercase();
    !TIME_LOSS_PLACEHOLDERS.contains(&upper.as_str())
}
