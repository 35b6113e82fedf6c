//! Turns any inbound payload into one canonical [`TrainingSnapshot`].

use hashbrown::HashSet;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::ranking;
use crate::snapshot::{AutoStopInfo, LeaderboardEntry, SnapshotOrigin, TrainingSnapshot};
use crate::wire::{MetricsPayload, PushEvent, StatusPayload};

/// Weight assumed for a model that has no weight reported.
pub const DEFAULT_WEIGHT: f64 = 1.0;

pub fn parse_push_event(raw: &str) -> Result<PushEvent, DecodeError> {
    Ok(serde_json::from_str(raw)?)
}

/// Snapshot from a push event or the live metrics endpoint.
pub fn from_metrics(payload: &MetricsPayload, origin: SnapshotOrigin) -> TrainingSnapshot {
    TrainingSnapshot {
        current_epoch: payload.current_epoch.or(payload.epoch).unwrap_or(0),
        total_epochs: payload.total_epochs.unwrap_or(0),
        progress_percent: progress(payload.progress_percent),
        auto_stop: payload.auto_stop_info.as_ref().and_then(auto_stop),
        validation_accuracy: payload.validation_accuracy,
        aggregate_loss: None,
        entries: ranking::rank(collect_entries(payload)),
        origin,
        degraded: false,
    }
}

/// Snapshot from the status endpoint.
///
/// That endpoint only names the participating models, so every entry is a
/// placeholder at the default weight with no loss, and the snapshot is
/// flagged as degraded.
pub fn from_status(payload: &StatusPayload) -> TrainingSnapshot {
    let mut seen = HashSet::new();
    let placeholders = payload
        .model_names()
        .filter(|name| seen.insert(*name))
        .map(|name| LeaderboardEntry::new(name, DEFAULT_WEIGHT))
        .collect::<Vec<_>>();

    TrainingSnapshot {
        current_epoch: payload.current_epoch.unwrap_or(0),
        total_epochs: payload.total_epochs.unwrap_or(0),
        progress_percent: progress(payload.progress),
        auto_stop: None,
        validation_accuracy: payload.accuracy,
        aggregate_loss: payload.loss,
        entries: ranking::rank(placeholders),
        origin: SnapshotOrigin::SecondaryPoll,
        degraded: true,
    }
}

/// Models named by the weights map come first, in wire order; models that
/// only appear in the loss map are appended after them.
fn collect_entries(payload: &MetricsPayload) -> Vec<LeaderboardEntry> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(payload.weights.len());
    let names = payload
        .weights
        .keys()
        .chain(payload.val_losses.keys())
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect::<Vec<_>>();

    names
        .into_iter()
        .map(|name| LeaderboardEntry {
            model_name: name.to_string(),
            weight: number(&payload.weights, name).unwrap_or(DEFAULT_WEIGHT),
            val_loss: number(&payload.val_losses, name),
            lr_multiplier: number(&payload.lr_multipliers, name),
        })
        .collect()
}

fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn progress(raw: Option<f64>) -> f64 {
    raw.unwrap_or(0.0).clamp(0.0, 100.0)
}

fn auto_stop(raw: &Value) -> Option<AutoStopInfo> {
    match raw {
        Value::Bool(true) => Some(AutoStopInfo::Triggered),
        Value::Number(n) => remaining(n.as_f64()?),
        Value::Object(o) => {
            let triggered = o.get("triggered").and_then(Value::as_bool).unwrap_or(false);
            if triggered {
                return Some(AutoStopInfo::Triggered);
            }
            o.get("epochs_remaining")
                .or_else(|| o.get("remaining"))
                .and_then(Value::as_f64)
                .and_then(remaining)
        }
        _ => None,
    }
}

fn remaining(n: f64) -> Option<AutoStopInfo> {
    (n.is_finite() && n >= 0.0).then(|| AutoStopInfo::EpochsRemaining(n.min(u32::MAX as f64) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RankedEntry;

    fn metrics(json: &str) -> MetricsPayload {
        serde_json::from_str(json).unwrap()
    }

    fn names(snap: &TrainingSnapshot) -> Vec<&str> {
        snap.entries.iter().map(RankedEntry::model_name).collect()
    }

    #[test]
    fn epoch_end_scenario() {
        let event = parse_push_event(
            r#"{"type":"epoch_end","val_losses":{"m1":0.5,"m2":0.3},
                "weights":{"m1":1.0,"m2":1.2},"current_epoch":2,"total_epochs":5}"#,
        )
        .unwrap();
        let PushEvent::EpochEnd(payload) = event else {
            panic!("expected epoch_end");
        };
        let snap = from_metrics(&payload, SnapshotOrigin::Push);

        assert_eq!(names(&snap), vec!["m2", "m1"]);
        assert_eq!(snap.entries[0].entry.val_loss, Some(0.3));
        assert_eq!(snap.entries[0].rank, 0);
        assert_eq!(snap.entries[1].entry.val_loss, Some(0.5));
        assert_eq!(snap.entries[1].rank, 1);
        assert_eq!(snap.current_epoch, 2);
        assert_eq!(snap.total_epochs, 5);
        assert_eq!(snap.origin, SnapshotOrigin::Push);
        assert!(!snap.degraded);
    }

    #[test]
    fn weights_are_authoritative_and_losses_fill_in() {
        let snap = from_metrics(
            &metrics(
                r#"{"weights":{"b":1.1,"a":0.9},"val_losses":{"a":0.4,"c":0.2},
                    "lr_multipliers":{"b":0.5}}"#,
            ),
            SnapshotOrigin::PrimaryPoll,
        );
        // c only appears in the loss map but still gets an entry.
        assert_eq!(names(&snap), vec!["c", "a", "b"]);
        let c = snap.entry("c").unwrap();
        assert_eq!(c.entry.weight, DEFAULT_WEIGHT);
        let b = snap.entry("b").unwrap();
        assert_eq!(b.entry.val_loss, None);
        assert_eq!(b.entry.lr_multiplier, Some(0.5));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let snap = from_metrics(&metrics("{}"), SnapshotOrigin::Push);
        assert_eq!(snap.current_epoch, 0);
        assert_eq!(snap.total_epochs, 0);
        assert_eq!(snap.progress_percent, 0.0);
        assert_eq!(snap.auto_stop, None);
        assert!(snap.entries.is_empty());
    }

    #[test]
    fn epoch_alias_and_progress_clamp() {
        let snap = from_metrics(
            &metrics(r#"{"epoch":4,"progress_percent":140.0,"weights":{"m":"heavy"}}"#),
            SnapshotOrigin::Push,
        );
        assert_eq!(snap.current_epoch, 4);
        assert_eq!(snap.progress_percent, 100.0);
        assert_eq!(snap.entry("m").unwrap().entry.weight, DEFAULT_WEIGHT);
    }

    #[test]
    fn auto_stop_shapes() {
        let cases = [
            (r#"{"auto_stop_info": 3}"#, Some(AutoStopInfo::EpochsRemaining(3))),
            (r#"{"auto_stop_info": {"epochs_remaining": 2}}"#, Some(AutoStopInfo::EpochsRemaining(2))),
            (r#"{"auto_stop_info": {"remaining": 1, "triggered": false}}"#, Some(AutoStopInfo::EpochsRemaining(1))),
            (r#"{"auto_stop_info": {"triggered": true}}"#, Some(AutoStopInfo::Triggered)),
            (r#"{"auto_stop_info": true}"#, Some(AutoStopInfo::Triggered)),
            (r#"{"auto_stop_info": -2}"#, None),
            (r#"{"auto_stop_info": null}"#, None),
        ];
        for (json, expected) in cases {
            let snap = from_metrics(&metrics(json), SnapshotOrigin::Push);
            assert_eq!(snap.auto_stop, expected, "{json}");
        }
    }

    #[test]
    fn status_payload_synthesizes_placeholders() {
        let status: StatusPayload = serde_json::from_str(
            r#"{"status":"training","currentEpoch":3,"totalEpochs":10,"progress":30,
                "baseModels":["qwen","llama","qwen"],"loss":0.8,"accuracy":0.71}"#,
        )
        .unwrap();
        let snap = from_status(&status);
        assert_eq!(names(&snap), vec!["qwen", "llama"]);
        assert!(snap.degraded);
        assert_eq!(snap.origin, SnapshotOrigin::SecondaryPoll);
        assert!(snap
            .entries
            .iter()
            .all(|e| e.entry.weight == DEFAULT_WEIGHT && e.entry.val_loss.is_none()));
        assert_eq!(snap.progress_percent, 30.0);
        assert_eq!(snap.aggregate_loss, Some(0.8));
        assert_eq!(snap.validation_accuracy, Some(0.71));
    }

    #[test]
    fn malformed_push_is_an_error() {
        assert!(parse_push_event("not json").is_err());
        assert!(parse_push_event(r#"{"type":"mystery"}"#).is_err());
    }
}
