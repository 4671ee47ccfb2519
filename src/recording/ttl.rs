// src/recording/ttl.rs
//! TTL pulse parsing for stream synchronization.
//!
//! Auxiliary boards record digital sync pulses on analog channels; the rising
//! edge of a pulse marks an event start in the board's time basis.

use crate::error::Result;
use crate::recording::Recording;

/// Frame indices of TTL transitions in a trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TtlEdges {
    pub rising: Vec<u64>,
    pub falling: Vec<u64>,
}

/// Find rising and falling edges in a TTL trace.
///
/// The trace is binarized at the midpoint of its observed range; an edge is
/// the frame index of the first sample on the new side of the threshold. A
/// trace with no dynamic range yields no edges, and a trace that starts high
/// does not report a rising edge at frame 0.
pub fn parse_rising_and_falling_edges(trace: &[i16]) -> TtlEdges {
    let mut edges = TtlEdges::default();
    let Some((&min, &max)) = trace
        .iter()
        .min()
        .zip(trace.iter().max())
    else {
        return edges;
    };
    if min == max {
        return edges;
    }

    let threshold = (min as f64 + max as f64) / 2.0;
    let mut was_high = trace[0] as f64 > threshold;
    for (index, &value) in trace.iter().enumerate().skip(1) {
        let is_high = value as f64 > threshold;
        if is_high && !was_high {
            edges.rising.push(index as u64);
        } else if !is_high && was_high {
            edges.falling.push(index as u64);
        }
        was_high = is_high;
    }
    edges
}

/// Event start times in seconds from the rising edges of a TTL channel.
pub fn event_times_from_ttl(recording: &dyn Recording, channel: usize) -> Result<Vec<f64>> {
    let trace = recording.get_traces(0..recording.num_frames(), channel..channel + 1)?;
    let edges = parse_rising_and_falling_edges(&trace);
    let rate = recording.sampling_frequency();
    Ok(edges.rising.iter().map(|&frame| frame as f64 / rate).collect())
}
