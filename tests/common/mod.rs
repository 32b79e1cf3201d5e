//! Shared fixtures: a scriptable fake platform and submission payloads.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};

use plant_orchestrator::collaborators::{
    CallError, CallResult, Collaborators, ProcessSupervisor, ScheduleRemoval, ScheduleRequest,
    Scheduler, TelemetryLogger, TopicRegistry,
};
use plant_orchestrator::persistence::MemoryStore;
use plant_orchestrator::{Orchestrator, OrchestratorConfig};

/// Reference instant all test windows are relative to.
pub const T0: &str = "2030-01-01T10:00:00+00:00";

/// How the fake answers a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Answer `true` (or the configured topics)
    Ack,
    /// Answer `false`
    Reject,
    /// Transport error
    Fail,
    /// Never answer
    Hang,
}

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub experiment_id: Option<String>,
    pub args: Vec<String>,
}

/// Fake supervisor, scheduler, logger and topic registry in one.
#[derive(Default)]
pub struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    behaviours: Mutex<HashMap<&'static str, Behaviour>>,
    feedback_topics: Mutex<Vec<String>>,
    plant_topics: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, call: &'static str, behaviour: Behaviour) {
        self.behaviours.lock().unwrap().insert(call, behaviour);
    }

    pub fn set_feedback_topics(&self, topics: &[&str]) {
        *self.feedback_topics.lock().unwrap() = topics.iter().map(ToString::to_string).collect();
    }

    pub fn set_plant_topics(&self, topics: &[&str]) {
        *self.plant_topics.lock().unwrap() = topics.iter().map(ToString::to_string).collect();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.name == name).count()
    }

    pub fn last(&self, name: &str) -> Option<Call> {
        self.calls().into_iter().rev().find(|c| c.name == name)
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, name: &'static str, experiment_id: Option<&str>, args: &[String]) -> Behaviour {
        self.calls.lock().unwrap().push(Call {
            name,
            experiment_id: experiment_id.map(ToString::to_string),
            args: args.to_vec(),
        });
        self.behaviours
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(Behaviour::Ack)
    }

    async fn answer<T>(&self, name: &'static str, behaviour: Behaviour, ack: T, reject: T) -> CallResult<T> {
        match behaviour {
            Behaviour::Ack => Ok(ack),
            Behaviour::Reject => Ok(reject),
            Behaviour::Fail => Err(CallError::failed(name, "connection refused")),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ack)
            }
        }
    }
}

#[async_trait]
impl ProcessSupervisor for FakePlatform {
    async fn agents_are_installed(&self, agents: &[String]) -> CallResult<bool> {
        let b = self.record("agents_are_installed", None, agents);
        self.answer("agents_are_installed", b, true, false).await
    }
}

#[async_trait]
impl Scheduler for FakePlatform {
    async fn submit_experiment_schedule(&self, request: &ScheduleRequest) -> CallResult<bool> {
        let b = self.record(
            "submit_experiment_schedule",
            Some(&request.experiment_id),
            &request.agents,
        );
        self.answer("submit_experiment_schedule", b, true, false).await
    }

    async fn remove_experiment_schedule(&self, removal: &ScheduleRemoval) -> CallResult<bool> {
        let b = self.record(
            "remove_experiment_schedule",
            Some(&removal.experiment_id),
            &removal.agents,
        );
        self.answer("remove_experiment_schedule", b, true, false).await
    }
}

#[async_trait]
impl TelemetryLogger for FakePlatform {
    async fn start_logging_topics(&self, experiment_id: &str, topics: &[String]) -> CallResult<bool> {
        let b = self.record("start_logging_topics", Some(experiment_id), topics);
        self.answer("start_logging_topics", b, true, false).await
    }

    async fn stop_logging_topics(&self, experiment_id: &str) -> CallResult<bool> {
        let b = self.record("stop_logging_topics", Some(experiment_id), &[]);
        self.answer("stop_logging_topics", b, true, false).await
    }
}

#[async_trait]
impl TopicRegistry for FakePlatform {
    async fn get_feedback_topics(&self, topics: &[String]) -> CallResult<Vec<String>> {
        let b = self.record("get_feedback_topics", None, topics);
        let found = self.feedback_topics.lock().unwrap().clone();
        self.answer("get_feedback_topics", b, found, Vec::new()).await
    }

    async fn get_plant_topics(&self, plants: &[String]) -> CallResult<Vec<String>> {
        let b = self.record("get_plant_topics", None, plants);
        let found = self.plant_topics.lock().unwrap().clone();
        self.answer("get_plant_topics", b, found, Vec::new()).await
    }
}

pub fn collaborators(platform: &Arc<FakePlatform>) -> Collaborators {
    Collaborators {
        supervisor: platform.clone(),
        scheduler: platform.clone(),
        logger: platform.clone(),
        topics: platform.clone(),
    }
}

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_call_timeout(Duration::from_secs(2))
        .with_plant_topics(false)
}

pub fn orchestrator(platform: &Arc<FakePlatform>, store: MemoryStore) -> Orchestrator {
    Orchestrator::open(&config(), store, collaborators(platform))
}

pub fn t0() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(T0).unwrap()
}

/// `T0` shifted by `minutes`, as an RFC 3339 string.
pub fn at(minutes: i64) -> String {
    (t0() + chrono::Duration::minutes(minutes)).to_rfc3339()
}

/// A valid submission on `plants` from `T0+start_min` to `T0+stop_min`.
pub fn submission(id: &str, plants: &[&str], start_min: i64, stop_min: i64) -> Value {
    json!({
        "experiment_id": id,
        "experimenter": "alice",
        "description": "Step response of the heat pump",
        "start_time": at(start_min),
        "stop_time": at(stop_min),
        "plants": plants,
        "external_control": false,
        "simulation_flag": true
    })
}

pub fn agents() -> Vec<String> {
    vec!["controller_agent".to_string(), "monitor_agent".to_string()]
}

pub fn topics() -> Vec<String> {
    vec!["heatpump_A/setpoint".to_string()]
}
