use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

/// One model's standing in a training run.
///
/// Entries are value objects: a new snapshot always carries fresh entries,
/// nothing is patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub model_name: String,
    /// Ensemble weight multiplier. Nominal domain is [0.5, 1.5] but any value is accepted.
    pub weight: f64,
    pub val_loss: Option<f64>,
    pub lr_multiplier: Option<f64>,
}

impl LeaderboardEntry {
    pub fn new(model_name: impl Into<String>, weight: f64) -> Self {
        Self {
            model_name: model_name.into(),
            weight,
            val_loss: None,
            lr_multiplier: None,
        }
    }

    pub fn with_val_loss(mut self, val_loss: f64) -> Self {
        self.val_loss = Some(val_loss);
        self
    }

    pub fn with_lr_multiplier(mut self, lr_multiplier: f64) -> Self {
        self.lr_multiplier = Some(lr_multiplier);
        self
    }
}

/// Display tier derived from a 0-based rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayTier {
    Best,
    Runner,
    Rest,
}

impl DisplayTier {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            0 => DisplayTier::Best,
            1 => DisplayTier::Runner,
            _ => DisplayTier::Rest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub entry: LeaderboardEntry,
}

impl RankedEntry {
    pub fn model_name(&self) -> &str {
        &self.entry.model_name
    }

    pub fn tier(&self) -> DisplayTier {
        DisplayTier::for_rank(self.rank)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoStopInfo {
    EpochsRemaining(u32),
    Triggered,
}

/// Which channel produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotOrigin {
    Push,
    /// Per-run live metrics endpoint.
    PrimaryPoll,
    /// General training status endpoint; entries are placeholders.
    SecondaryPoll,
}

/// A complete leaderboard state at one instant.
///
/// Consumers only ever see whole snapshots behind an `Arc`; an update replaces
/// the pointer, so a reader can never observe a mix of old and new fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSnapshot {
    pub current_epoch: u32,
    pub total_epochs: u32,
    /// Always within [0, 100].
    pub progress_percent: f64,
    pub auto_stop: Option<AutoStopInfo>,
    pub validation_accuracy: Option<f64>,
    /// Run-level loss reported by the status endpoint, when that is all we have.
    pub aggregate_loss: Option<f64>,
    /// Ranked, best first.
    pub entries: Vec<RankedEntry>,
    pub origin: SnapshotOrigin,
    /// Entries were synthesized from model names only (no loss/weight data).
    pub degraded: bool,
}

impl TrainingSnapshot {
    pub fn leader(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    pub fn entry(&self, model_name: &str) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.model_name() == model_name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(RankedEntry::model_name)
    }

    /// Tier used for coloring. Degraded snapshots have no real ordering, so
    /// every entry renders in the same tier.
    pub fn display_tier(&self, entry: &RankedEntry) -> DisplayTier {
        if self.degraded {
            DisplayTier::Rest
        } else {
            entry.tier()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
    Errored,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    /// Short label for the connection indicator.
    pub fn indicator(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Live",
            ConnectionState::Closed => "Disconnected",
            ConnectionState::Errored => "Error",
        }
    }
}

/// Identifies the training run currently being observed.
///
/// Cheap to clone; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunHandle(Arc<str>);

impl RunHandle {
    /// Returns `None` for an empty or whitespace-only identifier.
    pub fn new(run_id: &str) -> Option<Self> {
        let trimmed = run_id.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for RunHandle {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
