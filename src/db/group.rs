//! Grouping Engine: reassemble flat independent rows into the logical-entry
//! view consumed by display and export. Pure in-memory logic; the Row Store
//! supplies rows already ordered by `(date desc, grouping_key, position)`.

use std::collections::HashMap;

use crate::models::items::{HiimItem, IssueItem, LogicalEntry, PrbItem};
use crate::models::row::EntryRow;
use crate::models::row_kind::RowKind;

#[derive(Default)]
struct Partition {
    main: Option<EntryRow>,
    prbs: Vec<EntryRow>,
    hiims: Vec<EntryRow>,
    issues: Vec<EntryRow>,
}

impl Partition {
    fn push(&mut self, row: EntryRow) {
        match row.row_kind {
            // A second main row cannot exist while the unique index holds;
            // keep the first if a corrupted store produces one anyway.
            RowKind::Main => {
                if self.main.is_none() {
                    self.main = Some(row);
                }
            }
            RowKind::Prb => self.prbs.push(row),
            RowKind::Hiim => self.hiims.push(row),
            RowKind::Issue => self.issues.push(row),
        }
    }

    fn max_position(&self) -> Option<i64> {
        self.prbs
            .iter()
            .chain(&self.hiims)
            .chain(&self.issues)
            .map(|r| r.position)
            .max()
    }

    /// Position-aligned arrays, padded with `None` up to the partition-wide
    /// max position. A group with a main row but no children yields empty,
    /// not null, arrays.
    fn aligned_arrays(
        &self,
    ) -> (
        Vec<Option<PrbItem>>,
        Vec<Option<HiimItem>>,
        Vec<Option<IssueItem>>,
    ) {
        let Some(max) = self.max_position() else {
            return (Vec::new(), Vec::new(), Vec::new());
        };
        let slots = (max + 1) as usize;

        let mut prbs: Vec<Option<PrbItem>> = vec![None; slots];
        let mut hiims: Vec<Option<HiimItem>> = vec![None; slots];
        let mut issues: Vec<Option<IssueItem>> = vec![None; slots];

        // First row wins a slot; a negative position from a corrupted store
        // is skipped rather than panicking.
        for row in &self.prbs {
            if let Ok(i) = usize::try_from(row.position)
                && prbs[i].is_none()
            {
                prbs[i] = Some(PrbItem::from_row(row));
            }
        }
        for row in &self.hiims {
            if let Ok(i) = usize::try_from(row.position)
                && hiims[i].is_none()
            {
                hiims[i] = Some(HiimItem::from_row(row));
            }
        }
        for row in &self.issues {
            if let Ok(i) = usize::try_from(row.position)
                && issues[i].is_none()
            {
                issues[i] = Some(IssueItem::from_row(row));
            }
        }
        (prbs, hiims, issues)
    }
}

/// Group a flat row sequence into logical entries, preserving the order in
/// which grouping keys first appear. Groups without a main row degrade to
/// one pseudo-entry per orphaned child instead of failing.
pub fn group_rows(rows: Vec<EntryRow>) -> Vec<LogicalEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut partitions: HashMap<String, Partition> = HashMap::new();

    for row in rows {
        let key = row.grouping_key.clone();
        if !partitions.contains_key(&key) {
            order.push(key.clone());
        }
        partitions.entry(key).or_default().push(row);
    }

    let mut entries = Vec::new();
    for key in order {
        let partition = &partitions[&key];
        let (prbs, hiims, issues) = partition.aligned_arrays();

        if let Some(main) = &partition.main {
            entries.push(LogicalEntry {
                main: main.clone(),
                prbs,
                hiims,
                issues,
                orphaned: false,
            });
        } else {
            eprintln!(
                "warning: no main row for grouping key {key}; emitting {} orphaned child row(s)",
                partition.prbs.len() + partition.hiims.len() + partition.issues.len()
            );
            for child in partition
                .prbs
                .iter()
                .chain(&partition.hiims)
                .chain(&partition.issues)
            {
                let pseudo = enrich_orphan(child, partition);
                entries.push(LogicalEntry {
                    main: pseudo,
                    prbs: prbs.clone(),
                    hiims: hiims.clone(),
                    issues: issues.clone(),
                    orphaned: true,
                });
            }
        }
    }
    entries
}

/// Copy sibling child data onto an orphaned row so its pseudo-entry stays
/// readable: missing PRB/HIIM/issue fields come from the first sibling of
/// that kind, time-loss from the first issue that carries one.
fn enrich_orphan(child: &EntryRow, partition: &Partition) -> EntryRow {
    let mut row = child.clone();

    if !row.has_prb()
        && let Some(prb) = partition.prbs.first()
    {
        row.prb_id_number = prb.prb_id_number.clone();
        row.prb_id_status = prb.prb_id_status.clone();
        row.prb_link = prb.prb_link.clone();
    }
    if !row.has_hiim()
        && let Some(hiim) = partition.hiims.first()
    {
        row.hiim_id_number = hiim.hiim_id_number.clone();
        row.hiim_id_status = hiim.hiim_id_status.clone();
        row.hiim_link = hiim.hiim_link.clone();
    }
    if !row.has_issue()
        && let Some(issue) = partition.issues.first()
    {
        row.issue_description = issue.issue_description.clone();
    }
    if row.time_loss.trim().is_empty()
        && let Some(issue) = partition
            .issues
            .iter()
            .find(|r| !r.time_loss.trim().is_empty())
    {
        row.time_loss = issue.time_loss.clone();
    }
    row
}
