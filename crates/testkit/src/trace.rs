//! Tick-trace harness for deterministic worldtests.
//!
//! A trace steps a small simulation for a fixed number of ticks and snapshots
//! selected state after each step. Two runs from the same seed must produce
//! identical traces; [`assert_traces_match`] reports the first divergent tick.

use crate::{EventRecord, JsonlSink};
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use tilecraft_core::SimTick;

/// Single snapshot frame captured at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFrame<S> {
    /// Tick number.
    pub tick: u64,
    /// Snapshot payload.
    pub snapshot: S,
}

/// Run `ticks` steps and collect snapshots.
///
/// Captures the initial snapshot at tick 0, then steps `ticks` times,
/// capturing a snapshot after each step (so the trace holds `ticks + 1`
/// frames). Returns the final state alongside the trace.
pub fn run_tick_trace<State, Snapshot, StepFn, SnapFn>(
    ticks: u64,
    mut state: State,
    mut step: StepFn,
    mut snapshot: SnapFn,
) -> Result<(State, Vec<TickFrame<Snapshot>>)>
where
    StepFn: FnMut(SimTick, &mut State) -> Result<()>,
    SnapFn: FnMut(SimTick, &State) -> Snapshot,
{
    let mut frames = Vec::with_capacity(ticks as usize + 1);

    let mut tick = SimTick::ZERO;
    frames.push(TickFrame {
        tick: tick.0,
        snapshot: snapshot(tick, &state),
    });

    for _ in 0..ticks {
        tick = tick.advance(1);
        step(tick, &mut state)?;
        frames.push(TickFrame {
            tick: tick.0,
            snapshot: snapshot(tick, &state),
        });
    }

    Ok((state, frames))
}

/// Fail with the first tick at which two traces differ.
pub fn assert_traces_match<S>(left: &[TickFrame<S>], right: &[TickFrame<S>]) -> Result<()>
where
    S: PartialEq + std::fmt::Debug,
{
    if left.len() != right.len() {
        bail!("trace lengths differ: {} vs {}", left.len(), right.len());
    }
    if let Some((a, b)) = left.iter().zip(right).find(|(a, b)| a != b) {
        bail!(
            "traces diverge at tick {}: {:?} vs {:?}",
            a.tick,
            a.snapshot,
            b.snapshot
        );
    }
    Ok(())
}

/// Dump a trace as JSONL, one `frame` event per tick.
pub fn write_trace<S: Serialize>(path: impl AsRef<Path>, frames: &[TickFrame<S>]) -> Result<()> {
    let mut sink = JsonlSink::create(path)?;
    for frame in frames {
        let payload = serde_json::to_string(&frame.snapshot)?;
        sink.write(&EventRecord {
            tick: SimTick(frame.tick),
            kind: "frame",
            payload: &payload,
        })?;
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScratchDir;

    fn counter(ticks: u64, bump: u64) -> Vec<TickFrame<u64>> {
        let (_, frames) = run_tick_trace(
            ticks,
            0u64,
            |tick, state| {
                *state += tick.0 * bump;
                Ok(())
            },
            |_, state| *state,
        )
        .expect("trace runs");
        frames
    }

    #[test]
    fn trace_has_initial_frame_plus_one_per_tick() {
        let frames = counter(4, 1);
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], TickFrame { tick: 0, snapshot: 0 });
        assert_eq!(frames[4], TickFrame { tick: 4, snapshot: 10 });
    }

    #[test]
    fn divergence_is_reported_with_tick() {
        assert!(assert_traces_match(&counter(5, 1), &counter(5, 1)).is_ok());
        let err = assert_traces_match(&counter(5, 1), &counter(5, 2)).unwrap_err();
        assert!(err.to_string().contains("tick 1"));
    }

    #[test]
    fn step_errors_abort_the_trace() {
        let result = run_tick_trace(
            3,
            (),
            |tick, _| {
                if tick.0 == 2 {
                    bail!("boom");
                }
                Ok(())
            },
            |_, _| (),
        );
        assert!(result.is_err());
    }

    #[test]
    fn write_trace_emits_jsonl() {
        let scratch = ScratchDir::new("trace").expect("scratch dir");
        let path = scratch.path().join("trace.jsonl");
        write_trace(&path, &counter(2, 1)).expect("write trace");
        let contents = std::fs::read_to_string(&path).expect("readable");
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("\"frame\""));
    }
}
