//! Entity types and their schema tables.
//!
//! Every entity carries a static table describing how each field is named in
//! the source (document store, camelCase) and in the target (REST store,
//! snake_case), what kind of value it holds, which field orders records by
//! recency, and which target fields are compared during validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Field on a target record that points back at the source record id.
pub const SOURCE_REF_FIELD: &str = "source_ref";

/// Owner field in the source schema.
pub const SOURCE_OWNER_FIELD: &str = "userId";

/// Owner field in the target schema.
pub const TARGET_OWNER_FIELD: &str = "user_id";

/// Source field stamped when rollback updates an existing record.
pub const SOURCE_UPDATED_AT_FIELD: &str = "updatedAt";

/// The kinds of value a schema field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Number (may arrive as a numeric string).
    Number,
    /// Boolean flag.
    Bool,
    /// Point in time.
    Timestamp,
    /// Calendar date without time of day.
    Date,
    /// Unordered list of values.
    List,
    /// Nested object.
    Object,
}

/// One field in an entity schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Name in the source store.
    pub source: &'static str,
    /// Name in the target store.
    pub target: &'static str,
    /// Value kind.
    pub kind: FieldKind,
}

const fn field(source: &'static str, target: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        source,
        target,
        kind,
    }
}

/// Static description of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    /// Mapped fields.
    pub fields: &'static [FieldSpec],
    /// Source field used for newest-first ordering.
    pub recency_field: &'static str,
    /// Target field names compared during validation.
    pub compare_fields: &'static [&'static str],
}

impl EntitySchema {
    /// Looks up a field by its source name.
    #[must_use]
    pub fn by_source(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.source == name)
    }

    /// Looks up a field by its target name.
    #[must_use]
    pub fn by_target(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.target == name)
    }
}

use FieldKind::{Bool, Date, List, Number, Object, Text, Timestamp};

static TRADE_SCHEMA: EntitySchema = EntitySchema {
    fields: &[
        field("userId", "user_id", Text),
        field("symbol", "symbol", Text),
        field("direction", "direction", Text),
        field("status", "status", Text),
        field("entryPrice", "entry_price", Number),
        field("exitPrice", "exit_price", Number),
        field("quantity", "quantity", Number),
        field("stopLoss", "stop_loss", Number),
        field("takeProfit", "take_profit", Number),
        field("fees", "fees", Number),
        field("pnl", "pnl", Number),
        field("entryTime", "entry_time", Timestamp),
        field("exitTime", "exit_time", Timestamp),
        field("setup", "setup", Text),
        field("notes", "notes", Text),
        field("isPaperTrade", "is_paper_trade", Bool),
        field("tags", "tags", List),
        field("screenshots", "screenshots", List),
        field("createdAt", "created_at", Timestamp),
        field("updatedAt", "updated_at", Timestamp),
    ],
    recency_field: "entryTime",
    compare_fields: &[
        "symbol",
        "direction",
        "entry_price",
        "exit_price",
        "quantity",
        "entry_time",
        "exit_time",
        "pnl",
        "tags",
    ],
};

static DAILY_PLAN_SCHEMA: EntitySchema = EntitySchema {
    fields: &[
        field("userId", "user_id", Text),
        field("date", "date", Date),
        field("marketBias", "market_bias", Text),
        field("keyLevels", "key_levels", List),
        field("watchlist", "watchlist", List),
        field("goals", "goals", List),
        field("riskLimits", "risk_limits", Object),
        field("notes", "notes", Text),
        field("createdAt", "created_at", Timestamp),
        field("updatedAt", "updated_at", Timestamp),
    ],
    recency_field: "date",
    compare_fields: &[
        "date",
        "market_bias",
        "key_levels",
        "watchlist",
        "goals",
        "risk_limits",
        "notes",
    ],
};

static JOURNAL_ENTRY_SCHEMA: EntitySchema = EntitySchema {
    fields: &[
        field("userId", "user_id", Text),
        field("date", "date", Date),
        field("title", "title", Text),
        field("content", "content", Text),
        field("mood", "mood", Text),
        field("lessons", "lessons", List),
        field("tags", "tags", List),
        field("tradeIds", "trade_ids", List),
        field("createdAt", "created_at", Timestamp),
        field("updatedAt", "updated_at", Timestamp),
    ],
    recency_field: "date",
    compare_fields: &[
        "date",
        "title",
        "content",
        "mood",
        "lessons",
        "tags",
        "trade_ids",
    ],
};

/// The three entity kinds moved by the pipeline.
///
/// The derived ordering is the order `*_all` operations and reports use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A single executed trade.
    Trade,
    /// A pre-market plan for one day.
    DailyPlan,
    /// A free-form journal entry.
    JournalEntry,
}

impl EntityType {
    /// All entity types in pipeline order.
    pub const ALL: [EntityType; 3] = [Self::Trade, Self::DailyPlan, Self::JournalEntry];

    /// Collection name in the source store.
    #[must_use]
    pub const fn source_collection(self) -> &'static str {
        match self {
            Self::Trade => "trades",
            Self::DailyPlan => "dailyPlans",
            Self::JournalEntry => "journalEntries",
        }
    }

    /// Resource name in the target store.
    #[must_use]
    pub const fn target_resource(self) -> &'static str {
        match self {
            Self::Trade => "trades",
            Self::DailyPlan => "daily_plans",
            Self::JournalEntry => "journal_entries",
        }
    }

    /// Human readable label used in reports and progress details.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trade => "Trade",
            Self::DailyPlan => "Daily Plan",
            Self::JournalEntry => "Journal Entry",
        }
    }

    /// Schema table for this entity.
    #[must_use]
    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Self::Trade => &TRADE_SCHEMA,
            Self::DailyPlan => &DAILY_PLAN_SCHEMA,
            Self::JournalEntry => &JOURNAL_ENTRY_SCHEMA,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "trade" | "trades" => Ok(Self::Trade),
            "daily_plan" | "daily_plans" | "dailyplan" => Ok(Self::DailyPlan),
            "journal_entry" | "journal_entries" | "journalentry" => Ok(Self::JournalEntry),
            _ => Err(Error::Config(format!("Unknown entity type: {}", s))),
        }
    }
}
