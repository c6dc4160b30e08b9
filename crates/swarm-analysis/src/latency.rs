//! Latency segmentation: estimated swarm vs. sequential ("classic") time.
//!
//! A run is cut into segments at orchestrator re-planning boundaries. Within
//! a segment each worker is active from its first to its last timestamped
//! event. Swarm time assumes those windows ran concurrently, classic time
//! assumes they ran back to back. Time outside any worker window is charged
//! to the orchestrator and counted in both models.
//!
//! This is an estimate built from event timestamps, not a measurement.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use swarm_protocol::{AgentId, EventType, ProtocolTokens, SwarmEvent};
use tracing::debug;

/// Time span of one segment. Only the final segment includes its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub closed_end: bool,
}

impl SegmentSpan {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && (at < self.end || (self.closed_end && at == self.end))
    }

    fn millis(&self) -> i64 {
        (self.end - self.start).num_milliseconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerWindow {
    pub agent_id: AgentId,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    #[serde(flatten)]
    pub span: SegmentSpan,
    pub duration_seconds: f64,
    pub overhead_seconds: f64,
    pub windows: Vec<WorkerWindow>,
    /// Most worker windows overlapping at any instant of the segment.
    pub peak_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDuration {
    pub agent_id: AgentId,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub wall_seconds: f64,
    pub orchestrator_seconds: f64,
    pub swarm_seconds: f64,
    pub classic_seconds: f64,
    /// `classic / swarm`; absent when either side is zero.
    pub speedup: Option<f64>,
    /// Orchestrator first, then workers by numeric id suffix.
    pub agents: Vec<AgentDuration>,
    pub segments: Vec<SegmentReport>,
}

/// Cut `[start, finish]` at every boundary strictly after `start`.
///
/// Boundaries outside the run window are ignored. With no usable boundary
/// the result is the single span `[start, finish]`.
pub fn partition_segments(
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
    boundaries: &BTreeSet<DateTime<Utc>>,
) -> Vec<SegmentSpan> {
    let mut cuts = vec![start];
    cuts.extend(
        boundaries
            .iter()
            .copied()
            .filter(|boundary| *boundary > start && *boundary <= finish),
    );

    let mut spans: Vec<SegmentSpan> = cuts
        .windows(2)
        .map(|pair| SegmentSpan {
            start: pair[0],
            end: pair[1],
            closed_end: false,
        })
        .collect();
    let last = cuts.last().copied().unwrap_or(start);
    spans.push(SegmentSpan {
        start: last,
        end: finish,
        closed_end: true,
    });
    spans
}

struct TimedEvent<'a> {
    at: DateTime<Utc>,
    event: &'a SwarmEvent,
}

fn seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

fn run_bounds(events: &[SwarmEvent]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = events
        .iter()
        .find(|event| event.event_type == EventType::SwarmStarted)?
        .resolved_timestamp()?;
    let finish = events
        .iter()
        .rev()
        .find(|event| event.event_type == EventType::SwarmFinished)?
        .resolved_timestamp()?;
    (finish >= start).then_some((start, finish))
}

fn replan_boundaries(
    timed: &[TimedEvent<'_>],
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
    tokens: &ProtocolTokens,
) -> BTreeSet<DateTime<Utc>> {
    timed
        .iter()
        .filter(|timed| {
            let event = timed.event;
            event.event_type == EventType::AgentStatus
                && event.status() == Some(tokens.plan_ready_status.as_str())
                && event.is_orchestrator(tokens)
        })
        .map(|timed| timed.at)
        .filter(|at| *at >= start && *at <= finish)
        .collect()
}

/// Closed windows: one ending exactly when another begins still overlaps it.
fn peak_concurrency(windows: &[WorkerWindow]) -> usize {
    let mut edges: Vec<(DateTime<Utc>, i32)> = Vec::with_capacity(windows.len() * 2);
    for window in windows {
        edges.push((window.first_seen, 1));
        edges.push((window.last_seen, -1));
    }
    edges.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

    let mut current = 0i32;
    let mut peak = 0i32;
    for (_, delta) in edges {
        current += delta;
        peak = peak.max(current);
    }
    peak.max(0) as usize
}

fn worker_windows(
    timed: &[TimedEvent<'_>],
    span: &SegmentSpan,
    tokens: &ProtocolTokens,
) -> Vec<WorkerWindow> {
    let mut bounds: IndexMap<&str, (DateTime<Utc>, DateTime<Utc>)> = IndexMap::new();
    for timed in timed.iter().filter(|timed| span.contains(timed.at)) {
        if timed.event.is_orchestrator(tokens) {
            continue;
        }
        let Some(agent) = timed.event.agent() else {
            continue;
        };
        bounds
            .entry(agent)
            .and_modify(|(first, last)| {
                *first = (*first).min(timed.at);
                *last = (*last).max(timed.at);
            })
            .or_insert((timed.at, timed.at));
    }

    bounds
        .into_iter()
        .map(|(agent, (first_seen, last_seen))| WorkerWindow {
            agent_id: AgentId::from(agent),
            first_seen,
            last_seen,
            seconds: seconds((last_seen - first_seen).num_milliseconds()),
        })
        .collect()
}

fn compare_workers(a: &AgentId, b: &AgentId) -> Ordering {
    match (a.numeric_suffix(), b.numeric_suffix()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[derive(Default)]
struct Totals {
    orchestrator_ms: i64,
    swarm_ms: i64,
    classic_ms: i64,
    per_agent_ms: IndexMap<AgentId, i64>,
}

/// Estimate swarm and classic durations for one run's events.
///
/// `None` when the run has no readable start or finish, or finishes before it
/// starts. Events with unreadable timestamps are skipped.
pub fn analyze_latency(events: &[SwarmEvent], tokens: &ProtocolTokens) -> Option<LatencyReport> {
    let (start, finish) = run_bounds(events)?;

    let mut timed: Vec<TimedEvent<'_>> = events
        .iter()
        .filter_map(|event| {
            event
                .resolved_timestamp()
                .map(|at| TimedEvent { at, event })
        })
        .collect();
    timed.sort_by_key(|timed| timed.at);

    let boundaries = replan_boundaries(&timed, start, finish, tokens);
    let spans = partition_segments(start, finish, &boundaries);

    let mut totals = Totals::default();
    let mut segments = Vec::with_capacity(spans.len());
    for span in spans {
        let segment_ms = span.millis();
        let windows = worker_windows(&timed, &span, tokens);

        let overhead_ms = if windows.is_empty() {
            totals.swarm_ms += segment_ms;
            totals.classic_ms += segment_ms;
            segment_ms
        } else {
            let first_start = windows.iter().map(|w| w.first_seen).min().unwrap_or(span.start);
            let last_end = windows.iter().map(|w| w.last_seen).max().unwrap_or(span.end);
            let overhead_ms = (first_start - span.start).num_milliseconds().max(0)
                + (span.end - last_end).num_milliseconds().max(0);

            let mut longest_ms = 0;
            let mut sum_ms = 0;
            for window in &windows {
                let window_ms = (window.last_seen - window.first_seen).num_milliseconds();
                longest_ms = longest_ms.max(window_ms);
                sum_ms += window_ms;
                *totals
                    .per_agent_ms
                    .entry(window.agent_id.clone())
                    .or_insert(0) += window_ms;
            }
            totals.swarm_ms += overhead_ms + longest_ms;
            totals.classic_ms += overhead_ms + sum_ms;
            overhead_ms
        };
        totals.orchestrator_ms += overhead_ms;

        segments.push(SegmentReport {
            span,
            duration_seconds: seconds(segment_ms),
            overhead_seconds: seconds(overhead_ms),
            peak_concurrency: peak_concurrency(&windows),
            windows,
        });
    }

    let speedup = (totals.swarm_ms > 0 && totals.classic_ms > 0)
        .then(|| totals.classic_ms as f64 / totals.swarm_ms as f64)
        .filter(|ratio| ratio.is_finite());

    let mut workers: Vec<AgentDuration> = totals
        .per_agent_ms
        .into_iter()
        .filter(|(_, millis)| *millis > 0)
        .map(|(agent_id, millis)| AgentDuration {
            agent_id,
            seconds: seconds(millis),
        })
        .collect();
    workers.sort_by(|a, b| compare_workers(&a.agent_id, &b.agent_id));

    let mut agents = Vec::with_capacity(workers.len() + 1);
    if totals.orchestrator_ms > 0 {
        agents.push(AgentDuration {
            agent_id: AgentId::from(tokens.orchestrator_agent_id.as_str()),
            seconds: seconds(totals.orchestrator_ms),
        });
    }
    agents.extend(workers);

    debug!(
        segments = segments.len(),
        swarm_ms = totals.swarm_ms,
        classic_ms = totals.classic_ms,
        "latency estimate computed"
    );

    Some(LatencyReport {
        started_at: start,
        finished_at: finish,
        wall_seconds: seconds((finish - start).num_milliseconds()),
        orchestrator_seconds: seconds(totals.orchestrator_ms),
        swarm_seconds: seconds(totals.swarm_ms),
        classic_seconds: seconds(totals.classic_ms),
        speedup,
        agents,
        segments,
    })
}
