pub mod application;
pub mod items;
pub mod row;
pub mod row_kind;

pub use application::{ALL_APPLICATIONS, Application};
pub use items::{EntryInput, HiimItem, IssueItem, ItemSet, LogicalEntry, PrbItem, RowView};
pub use row::{CommonFields, EntryRow, grouping_key, meaningful_time_loss};
pub use row_kind::{RowFilter, RowKind};
