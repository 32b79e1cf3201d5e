//! Availability check benchmarks
//!
//! Conflict detection scans the whole collection on every submission:
//! - free window against a growing collection
//! - blocked window found early
//! - full submit path through the orchestrator

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plant_orchestrator::collaborators::{
    CallResult, Collaborators, ProcessSupervisor, ScheduleRemoval, ScheduleRequest, Scheduler,
    TelemetryLogger, TopicRegistry,
};
use plant_orchestrator::experiment::{
    is_available, ExperimentEntry, ExperimentRecord, ExperimentStore, StateMachine,
};
use plant_orchestrator::persistence::MemoryStore;
use plant_orchestrator::{Orchestrator, OrchestratorConfig};

struct Idle;

#[async_trait]
impl ProcessSupervisor for Idle {
    async fn agents_are_installed(&self, _: &[String]) -> CallResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl Scheduler for Idle {
    async fn submit_experiment_schedule(&self, _: &ScheduleRequest) -> CallResult<bool> {
        Ok(true)
    }
    async fn remove_experiment_schedule(&self, _: &ScheduleRemoval) -> CallResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl TelemetryLogger for Idle {
    async fn start_logging_topics(&self, _: &str, _: &[String]) -> CallResult<bool> {
        Ok(true)
    }
    async fn stop_logging_topics(&self, _: &str) -> CallResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl TopicRegistry for Idle {
    async fn get_feedback_topics(&self, _: &[String]) -> CallResult<Vec<String>> {
        Ok(Vec::new())
    }
    async fn get_plant_topics(&self, _: &[String]) -> CallResult<Vec<String>> {
        Ok(Vec::new())
    }
}

fn t0() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2030-01-01T00:00:00+00:00").unwrap()
}

/// `n` back-to-back one-hour reservations spread over 10 plants
fn create_store(n: usize) -> ExperimentStore {
    let records = (0..n).map(|i| {
        let start = t0() + Duration::hours(i64::try_from(i / 10).unwrap());
        ExperimentRecord::builder(format!("exp-{i:06}"), start, start + Duration::hours(1))
            .plant(format!("plant_{}", i % 10))
            .build()
            .unwrap()
    });
    let mut store = ExperimentStore::new();
    for record in records {
        store
            .insert(ExperimentEntry::new(record, StateMachine::new()))
            .unwrap();
    }
    store
}

fn bench_is_available(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_available");

    for size in [100, 1_000, 10_000] {
        let store = create_store(size);
        let plants = vec!["plant_3".to_string()];
        let end = t0() + Duration::hours(i64::try_from(size).unwrap());

        group.bench_with_input(BenchmarkId::new("free", size), &size, |b, _| {
            b.iter(|| {
                is_available(
                    store.entries(),
                    "candidate",
                    black_box(&plants),
                    black_box(end),
                    black_box(end + Duration::hours(1)),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("blocked", size), &size, |b, _| {
            b.iter(|| {
                is_available(
                    store.entries(),
                    "candidate",
                    black_box(&plants),
                    black_box(t0()),
                    black_box(t0() + Duration::hours(1)),
                )
            });
        });
    }

    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let idle = Arc::new(Idle);
    let collaborators = Collaborators {
        supervisor: idle.clone(),
        scheduler: idle.clone(),
        logger: idle.clone(),
        topics: idle,
    };
    let config = OrchestratorConfig::default();

    c.bench_function("submit_1000", |b| {
        b.iter(|| {
            let mut orch = Orchestrator::open(&config, MemoryStore::new(), collaborators.clone());
            for i in 0..1000_i64 {
                let start = t0() + Duration::hours(i);
                let payload = serde_json::json!({
                    "experiment_id": format!("exp-{i}"),
                    "experimenter": "bench",
                    "description": "bench",
                    "start_time": start.to_rfc3339(),
                    "stop_time": (start + Duration::hours(1)).to_rfc3339(),
                    "plants": ["plant_0"]
                });
                black_box(orch.submit(&payload).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_is_available, bench_submit);
criterion_main!(benches);
