use clap::{Parser, Subcommand};

/// ProdVision production-health entry store.
#[derive(Parser, Debug)]
#[command(name = "prodvision", version, about)]
pub struct Cli {
    /// Override the data directory holding the per-application databases
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config file and data directory
    Init,

    /// Create a logical entry from a JSON payload (file or stdin)
    Add {
        /// Path to a JSON payload; omit to read stdin
        #[arg(long)]
        file: Option<String>,
    },

    /// Print one logical entry as JSON
    Get {
        id: i64,
        /// Application to search first
        #[arg(long)]
        app: Option<String>,
        /// Render the aligned child arrays as item sets
        #[arg(long)]
        item_sets: bool,
    },

    /// List grouped entries for an application
    List {
        app: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Ungrouped row-level listing by kind (prb, hiim, issue, time_loss)
    Rows {
        kind: String,
        /// Restrict to one application; omit to scan all five
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Patch whitelisted fields of exactly one row, never its siblings
    Patch {
        id: i64,
        /// Path to a JSON object of column/value pairs; omit to read stdin
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        app: Option<String>,
    },

    /// Update a logical entry from a JSON payload (file or stdin)
    Update {
        id: i64,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        app: Option<String>,
    },

    /// Delete a logical entry (all rows of its group), or one row with --row
    Del {
        id: i64,
        #[arg(long)]
        app: Option<String>,
        /// Delete only this row, keep the rest of the group
        #[arg(long)]
        row: bool,
    },

    /// Read or write a settings key (value present = write)
    Setting {
        key: String,
        value: Option<String>,
        #[arg(long)]
        app: Option<String>,
    },
}
