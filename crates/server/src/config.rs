use std::{collections::HashMap, fs, time::Duration};

use serde::Deserialize;

use crate::jobs::JobQueueConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    /// Quote backend; the simulated backend is used when unset.
    pub backend_url: Option<String>,
    /// Analytics ingestion root; events are only logged when unset.
    pub analytics_url: Option<String>,
    pub simulated_latency_ms: u64,
    pub max_stored_events: usize,
    pub tracker_queue_capacity: usize,
    pub job_queue_capacity: usize,
    pub job_history: usize,
    pub job_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            backend_url: None,
            analytics_url: None,
            simulated_latency_ms: 1000,
            max_stored_events: 10_000,
            tracker_queue_capacity: 256,
            job_queue_capacity: 64,
            job_history: 1000,
            job_timeout_secs: 3600,
        }
    }
}

impl Settings {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    pub fn job_queue(&self) -> JobQueueConfig {
        JobQueueConfig {
            capacity: self.job_queue_capacity,
            history: self.job_history,
            timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("ignoring server.toml: expected a flat table of strings");
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("backend_url") {
        settings.backend_url = non_empty(v.clone());
    }
    if let Some(v) = file_cfg.get("analytics_url") {
        settings.analytics_url = non_empty(v.clone());
    }
    if let Some(v) = file_cfg.get("simulated_latency_ms") {
        set_parsed(&mut settings.simulated_latency_ms, v);
    }
    if let Some(v) = file_cfg.get("max_stored_events") {
        set_parsed(&mut settings.max_stored_events, v);
    }
    if let Some(v) = file_cfg.get("tracker_queue_capacity") {
        set_parsed(&mut settings.tracker_queue_capacity, v);
    }
    if let Some(v) = file_cfg.get("job_queue_capacity") {
        set_parsed(&mut settings.job_queue_capacity, v);
    }
    if let Some(v) = file_cfg.get("job_history") {
        set_parsed(&mut settings.job_history, v);
    }
    if let Some(v) = file_cfg.get("job_timeout_secs") {
        set_parsed(&mut settings.job_timeout_secs, v);
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__BACKEND_URL") {
        settings.backend_url = non_empty(v);
    }
    if let Some(v) = var("APP__ANALYTICS_URL") {
        settings.analytics_url = non_empty(v);
    }

    if let Some(v) = var("APP__SIMULATED_LATENCY_MS") {
        set_parsed(&mut settings.simulated_latency_ms, &v);
    }
    if let Some(v) = var("APP__MAX_STORED_EVENTS") {
        set_parsed(&mut settings.max_stored_events, &v);
    }
    if let Some(v) = var("APP__TRACKER_QUEUE_CAPACITY") {
        set_parsed(&mut settings.tracker_queue_capacity, &v);
    }
    if let Some(v) = var("APP__JOB_QUEUE_CAPACITY") {
        set_parsed(&mut settings.job_queue_capacity, &v);
    }
    if let Some(v) = var("APP__JOB_HISTORY") {
        set_parsed(&mut settings.job_history, &v);
    }
    if let Some(v) = var("APP__JOB_TIMEOUT_SECS") {
        set_parsed(&mut settings.job_timeout_secs, &v);
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(value = raw, "ignoring unparseable setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
