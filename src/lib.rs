//! # trainwatch
//!
//! Live telemetry and leaderboard ranking for a running training job.
//!
//! The monitor follows one run over a push channel (WebSocket) and keeps a
//! fixed-period pull loop alive next to it. Whatever arrives is normalized into
//! one [`TrainingSnapshot`](snapshot::TrainingSnapshot), ranked by validation
//! loss, and published through a `watch` channel.
//!
//! ## Quick Start
//!
//! ```
//! use trainwatch::prelude::*;
//!
//! let board = rank([
//!     LeaderboardEntry::new("m1", 1.0).with_val_loss(0.5),
//!     LeaderboardEntry::new("m2", 1.2).with_val_loss(0.3),
//!     LeaderboardEntry::new("m3", 0.8),
//! ]);
//! assert_eq!(board[0].model_name(), "m2");
//! assert_eq!(board[2].model_name(), "m3"); // no loss yet, ranked last
//! assert_eq!(scale(1.2).round(), 70.0);
//! ```
//!
//! Following a live run:
//!
//! ```no_run
//! use trainwatch::prelude::*;
//!
//! # async fn follow() -> Result<(), Box<dyn std::error::Error>> {
//! trainwatch::logging::init();
//! let config = MonitorConfig::load(&AppPaths::new()?)?;
//! let mut monitor = LiveMonitor::connect(config)?;
//! monitor.activate("run-2024-06-01")?;
//!
//! let mut updates = monitor.subscribe();
//! while updates.changed().await.is_ok() {
//!     let view = updates.borrow_and_update().clone();
//!     if let Some(snapshot) = &view.snapshot {
//!         for (name, bar) in weight_bars(snapshot) {
//!             println!("{name:>12} {:5.1}%", bar.percent);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `ws` (default): WebSocket push channel via tokio-tungstenite
//! - `http` (default): HTTP pull endpoints via reqwest
//!
//! ## Modules
//!
//! - [`normalize`]: Wire payloads into snapshots
//! - [`ranking`]: Leaderboard ordering
//! - [`weight_bar`]: Weight to bar length
//! - [`supervisor`]: Push channel lifecycle
//! - [`poller`]: Fixed-period pull fallback
//! - [`monitor`]: Run scopes and teardown

#[path = "core/snapshot.rs"]
pub mod snapshot;

#[path = "core/wire.rs"]
pub mod wire;

#[path = "core/ranking.rs"]
pub mod ranking;

#[path = "core/weight_bar.rs"]
pub mod weight_bar;

#[path = "core/normalize.rs"]
pub mod normalize;

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod paths;
pub mod poller;
pub mod supervisor;
pub mod transport;
pub mod view;

#[cfg(test)]
mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{MonitorConfig, POLL_PERIOD};
    pub use crate::error::{ConfigError, FetchError, MonitorError, TransportError};
    pub use crate::monitor::LiveMonitor;
    pub use crate::paths::AppPaths;
    pub use crate::poller::PollStats;
    pub use crate::ranking::rank;
    pub use crate::snapshot::{
        AutoStopInfo, ConnectionState, DisplayTier, LeaderboardEntry, RankedEntry, RunHandle,
        SnapshotOrigin, TrainingSnapshot,
    };
    pub use crate::transport::{PushTransport, TelemetrySource};
    pub use crate::view::{MonitorView, ViewPhase};
    pub use crate::weight_bar::{scale, weight_bars, WeightBar};
}
