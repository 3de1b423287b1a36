//! Deterministic trace replay: a JSON file declares targets and a
//! batch sequence; the engine runs them and prints the final target
//! states. Doubles as the offline debugging harness for a table.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{SurfaceSpec, TargetSpec, Thresholds};
use crate::detector::{ContactBatch, Phase, PointDetector};
use crate::evaluate;
use crate::target::{RectTarget, TargetRegistry};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace declares no events")]
    NoEvents,
    #[error("trace declares no targets")]
    NoTargets,
    #[error("event {index} goes back in time ({timestamp_ms} ms)")]
    NonMonotonic { index: usize, timestamp_ms: u64 },
}

#[derive(Debug, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub surface: SurfaceSpec,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub targets: Vec<TargetSpec>,
    pub events: Vec<ContactBatch>,
}

impl Trace {
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.events.is_empty() {
            return Err(TraceError::NoEvents);
        }
        if self.targets.is_empty() {
            return Err(TraceError::NoTargets);
        }
        let mut last = 0;
        for (index, b) in self.events.iter().enumerate() {
            if b.timestamp_ms < last {
                return Err(TraceError::NonMonotonic {
                    index,
                    timestamp_ms: b.timestamp_ms,
                });
            }
            last = b.timestamp_ms;
        }
        Ok(())
    }
}

/// Runs every batch of a trace through a fresh engine and returns the
/// registry in its final state.
pub fn run_batches(trace: &Trace) -> TargetRegistry {
    let mut targets = TargetRegistry::new();
    for spec in &trace.targets {
        targets.register(Box::new(RectTarget::from_spec(spec, &trace.surface)));
    }
    let mut detector = PointDetector::new(trace.thresholds.clone());

    for batch in &trace.events {
        detector.update(batch, &mut targets);
        match batch.phase {
            Phase::Move => {
                evaluate::evaluate_touch(&mut detector, batch.timestamp_ms, &mut targets)
            }
            Phase::End => evaluate::evaluate_clicks(&mut detector, &mut targets),
            Phase::Start => {}
        }
        targets.animate_all(batch.timestamp_ms);
    }
    targets
}

pub fn run_trace(path: &Path) -> Result<()> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    let trace: Trace = serde_json::from_str(&txt)
        .with_context(|| format!("failed to parse trace {}", path.display()))?;
    trace.validate()?;
    info!(
        "replaying {} events against {} targets",
        trace.events.len(),
        trace.targets.len()
    );
    let targets = run_batches(&trace);
    println!("{}", serde_json::to_string_pretty(&targets.describe_all())?);
    Ok(())
}
