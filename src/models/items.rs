//! API-boundary value types: child items, the grouped logical-entry view,
//! and the first-class item-set triple.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

use super::row::{CommonFields, EntryRow};

/// A Problem Record as entered in one item-set slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrbItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub prb_id_number: String,
    #[serde(default)]
    pub prb_id_status: String,
    #[serde(default)]
    pub prb_link: String,
    #[serde(default)]
    pub position: i64,
    /// Forms may echo a date per item; it must match the entry date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A High-Impact Incident as entered in one item-set slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiimItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub hiim_id_number: String,
    #[serde(default)]
    pub hiim_id_status: String,
    #[serde(default)]
    pub hiim_link: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A free-text issue; time-loss is attached to the issue, not the entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub time_loss: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl PrbItem {
    pub fn from_row(row: &EntryRow) -> Self {
        PrbItem {
            id: Some(row.id),
            prb_id_number: row.prb_id_number.clone(),
            prb_id_status: row.prb_id_status.clone(),
            prb_link: row.prb_link.clone(),
            position: row.position,
            date: None,
        }
    }
}

impl HiimItem {
    pub fn from_row(row: &EntryRow) -> Self {
        HiimItem {
            id: Some(row.id),
            hiim_id_number: row.hiim_id_number.clone(),
            hiim_id_status: row.hiim_id_status.clone(),
            hiim_link: row.hiim_link.clone(),
            position: row.position,
            date: None,
        }
    }
}

impl IssueItem {
    pub fn from_row(row: &EntryRow) -> Self {
        IssueItem {
            id: Some(row.id),
            description: row.issue_description.clone(),
            time_loss: row.time_loss.clone(),
            position: row.position,
            date: None,
        }
    }
}

/// The grouped view of one logical entry: the main row plus the three
/// position-aligned child arrays. `None` marks an intentionally empty slot,
/// which is what keeps item set N's PRB visually aligned with item set N's
/// issue even when N has no HIIM.
#[derive(Debug, Clone, Serialize)]
pub struct LogicalEntry {
    #[serde(flatten)]
    pub main: EntryRow,
    pub prbs: Vec<Option<PrbItem>>,
    pub hiims: Vec<Option<HiimItem>>,
    pub issues: Vec<Option<IssueItem>>,
    /// True when the group had no main row and this entry was synthesized
    /// from an orphaned child.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub orphaned: bool,
}

/// One aligned (issue, PRB, HIIM) triple at a given position.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSet {
    pub position: i64,
    pub prb: Option<PrbItem>,
    pub hiim: Option<HiimItem>,
    pub issue: Option<IssueItem>,
}

impl LogicalEntry {
    /// Zip the aligned arrays back into first-class item sets.
    pub fn item_sets(&self) -> Vec<ItemSet> {
        let len = self
            .prbs
            .len()
            .max(self.hiims.len())
            .max(self.issues.len());
        (0..len)
            .map(|i| ItemSet {
                position: i as i64,
                prb: self.prbs.get(i).cloned().flatten(),
                hiim: self.hiims.get(i).cloned().flatten(),
                issue: self.issues.get(i).cloned().flatten(),
            })
            .collect()
    }
}

/// Desired state for a create or comprehensive update. Children arrays use
/// `None` slots to keep item-set positions; a missing array on update means
/// "leave that kind untouched". Common fields are kept as the raw supplied
/// map so an update can merge them over stored values instead of clearing
/// everything the caller left out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryInput {
    pub date: String,
    pub application_name: String,

    #[serde(flatten)]
    pub common: serde_json::Map<String, serde_json::Value>,

    // Legacy single-value fields, honored only when the matching array is
    // empty; they land on the main row.
    #[serde(default)]
    pub prb_id_number: Option<String>,
    #[serde(default)]
    pub prb_id_status: Option<String>,
    #[serde(default)]
    pub prb_link: Option<String>,
    #[serde(default)]
    pub hiim_id_number: Option<String>,
    #[serde(default)]
    pub hiim_id_status: Option<String>,
    #[serde(default)]
    pub hiim_link: Option<String>,
    #[serde(default)]
    pub issue_description: Option<String>,
    #[serde(default)]
    pub time_loss: Option<String>,

    #[serde(default)]
    pub prbs: Option<Vec<Option<PrbItem>>>,
    #[serde(default)]
    pub hiims: Option<Vec<Option<HiimItem>>>,
    #[serde(default)]
    pub issues: Option<Vec<Option<IssueItem>>>,

    // Accepted for payload compatibility; the key is derived on every
    // write, never taken from the caller.
    #[serde(default)]
    pub grouping_key: Option<String>,
}

impl EntryInput {
    /// One supplied common field as text, empty when absent.
    pub fn common_text(&self, key: &str) -> &str {
        self.common.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Typed view of the supplied common fields; everything else defaults.
    pub fn common_fields(&self) -> AppResult<CommonFields> {
        self.merged_common(&CommonFields::default())
    }

    /// Supplied common fields merged over `base`. Fields absent from the
    /// payload keep their base values; a supplied null clears.
    pub fn merged_common(&self, base: &CommonFields) -> AppResult<CommonFields> {
        let mut value = serde_json::to_value(base)
            .map_err(|e| AppError::Other(format!("cannot serialize common fields: {e}")))?;
        if let Some(map) = value.as_object_mut() {
            for (key, supplied) in &self.common {
                map.insert(key.clone(), supplied.clone());
            }
        }
        serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("malformed common field: {e}")))
    }
}

/// One row from the row-level filter path, enriched with sibling data so the
/// caller sees a complete-enough record even though only one kind matched.
#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    #[serde(flatten)]
    pub row: EntryRow,
    pub prbs: Vec<PrbItem>,
    pub hiims: Vec<HiimItem>,
    pub issues: Vec<IssueItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::row_kind::RowKind;

    #[test]
    fn item_sets_zip_aligned_arrays() {
        let main = EntryRow::blank("2025-10-03", "CVAR ALL", RowKind::Main, 0);
        let prb = PrbItem {
            prb_id_number: "101".into(),
            position: 1,
            ..Default::default()
        };
        let issue = IssueItem {
            description: "net issue".into(),
            position: 0,
            ..Default::default()
        };
        let entry = LogicalEntry {
            main,
            prbs: vec![None, Some(prb)],
            hiims: vec![None, None],
            issues: vec![Some(issue), None],
            orphaned: false,
        };
        let sets = entry.item_sets();
        assert_eq!(sets.len(), 2);
        assert!(sets[0].prb.is_none());
        assert_eq!(sets[0].issue.as_ref().unwrap().description, "net issue");
        assert_eq!(sets[1].prb.as_ref().unwrap().prb_id_number, "101");
        assert!(sets[1].hiim.is_none());
    }

    #[test]
    fn entry_input_accepts_sparse_json() {
        let input: EntryInput = serde_json::from_str(
            r#"{
                "date": "2025-10-03",
                "application_name": "CVAR ALL",
                "prc_mail_status": "Green",
                "prbs": [null, {"prb_id_number": "101", "prb_id_status": "active"}]
            }"#,
        )
        .unwrap();
        assert_eq!(input.common_text("prc_mail_status"), "Green");
        let typed = input.common_fields().unwrap();
        assert_eq!(typed.prc_mail_status, "Green");
        assert_eq!(typed.remarks, "");
        let prbs = input.prbs.as_ref().unwrap();
        assert!(prbs[0].is_none());
        assert_eq!(prbs[1].as_ref().unwrap().prb_id_number, "101");
        assert!(input.hiims.is_none());
    }

    #[test]
    fn merged_common_keeps_unsupplied_base_values() {
        let mut base = CommonFields::default();
        base.prc_mail_status = "Green".into();
        base.remarks = "stable".into();

        let input: EntryInput = serde_json::from_str(
            r#"{
                "date": "2025-10-03",
                "application_name": "CVAR ALL",
                "remarks": "late batch"
            }"#,
        )
        .unwrap();
        let merged = input.merged_common(&base).unwrap();
        assert_eq!(merged.remarks, "late batch");
        assert_eq!(merged.prc_mail_status, "Green");
    }
}
