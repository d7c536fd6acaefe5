//! UMA Organ Interface for rcp_utils
//!
//! Exposes the RCP utility layer (clock, generator, named locks) as a UMA
//! organ so that separate RCP client processes can share one epoch and one
//! seeded generator, and can observe the named locks held inside the daemon
//! process. [`UtilsOrgan::process_wide`] reports the same registry that
//! `crate::api::lock` acquires.
//!
//! ## Available Operations
//!
//! 1. `rcp.timestamp` - Milliseconds since the organ's clock epoch
//! 2. `rcp.rand` - Pseudo-random integers
//! 3. `rcp.mutex.status` - Probe the named locks
//! 4. `rcp.capabilities` - Capability card query
//! 5. `metrics` - Counter snapshot
//!
//! The organ never blocks on a named lock; lock ownership stays with the
//! in-process callers of [`MutexRegistry`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use rcp_utils::organ::{UtilsOrgan, Organ, Stimulus};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let organ = UtilsOrgan::new();
//!
//! let response = organ.stimulate(Stimulus {
//!     op: "rcp.rand".to_string(),
//!     input: json!({"count": 4}),
//!     context: HashMap::new(),
//! }).await?;
//! println!("{}", response.output["values"]);
//! # Ok(())
//! # }
//! ```

use crate::api;
use crate::clock::TimeSource;
use crate::config::UtilsConfig;
use crate::error::RcpError;
use crate::metrics::{Metrics, Timer};
use crate::mutex::{MutexId, MutexRegistry};
use crate::random::{FixedSeeder, RandomSource, WallClockSeeder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Upper bound on `count` for a single `rcp.rand` request
pub const MAX_RANDOM_COUNT: u64 = 1024;

const OPERATIONS: [&str; 5] = [
    "rcp.timestamp",
    "rcp.rand",
    "rcp.mutex.status",
    "rcp.capabilities",
    "metrics",
];

/// UMA Stimulus - input to organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    pub op: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// UMA Response - output from organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub output: Value,
    pub latency_ms: u64,
    pub cost: Option<f64>,
}

/// Organ trait - the UMA request/response interface
#[async_trait]
pub trait Organ: Send + Sync {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError>;
    fn describe(&self) -> OrganCard;
}

/// Organ-level errors
#[derive(Debug, Error)]
pub enum OrganError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Organ capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub division: String,
    pub subsystem: String,
    pub tags: Vec<String>,
    pub execution_modes: Vec<String>,
    pub functions: Vec<FunctionCard>,
}

/// Function capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCard {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub idempotent: bool,
    pub input_schema: Option<Value>,
    pub output_schema: Value,
}

/// RCP utility organ
pub struct UtilsOrgan {
    registry: Arc<MutexRegistry>,
    clock: Arc<TimeSource>,
    random: Arc<RandomSource>,
    metrics: Arc<Metrics>,
}

impl UtilsOrgan {
    pub fn new() -> Self {
        Self::from_config(&UtilsConfig::default())
    }

    /// Standalone organ with its own registry and counters
    pub fn from_config(config: &UtilsConfig) -> Self {
        let metrics = Metrics::new();

        Self {
            registry: Arc::new(MutexRegistry::with_metrics(Arc::clone(&metrics))),
            clock: Arc::new(TimeSource::new(config.clock_mode)),
            random: Arc::new(random_source(config)),
            metrics,
        }
    }

    /// Organ over the process-wide registry and counters behind `crate::api`
    pub fn process_wide(config: &UtilsConfig) -> Self {
        Self::with_parts(
            api::registry(),
            Arc::new(TimeSource::new(config.clock_mode)),
            Arc::new(random_source(config)),
            api::metrics(),
        )
    }

    /// Organ over existing components, e.g. a registry shared with in-process callers
    pub fn with_parts(
        registry: Arc<MutexRegistry>,
        clock: Arc<TimeSource>,
        random: Arc<RandomSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            clock,
            random,
            metrics,
        }
    }

    pub fn registry(&self) -> Arc<MutexRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Run one operation directly, without the response envelope or request metrics.
    pub fn invoke(&self, op: &str, input: &Value) -> crate::Result<Value> {
        self.dispatch(op, input).map_err(RcpError::from)
    }

    /// Handle rcp.timestamp operation
    fn handle_timestamp(&self) -> Value {
        self.metrics.record_timestamp();
        json!({
            "elapsed_ms": self.clock.elapsed_millis(),
            "mode": self.clock.mode().as_str(),
        })
    }

    /// Handle rcp.rand operation
    fn handle_rand(&self, input: &Value) -> Result<Value, OrganError> {
        let count = match input.get("count") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| {
                OrganError::InvalidInput("count must be a positive integer".to_string())
            })?),
        };

        match count {
            None => {
                self.metrics.record_random(1);
                Ok(json!({ "value": self.random.next() }))
            }
            Some(n) if (1..=MAX_RANDOM_COUNT).contains(&n) => {
                self.metrics.record_random(n);
                let values: Vec<i32> = (0..n).map(|_| self.random.next()).collect();
                Ok(json!({ "values": values }))
            }
            Some(n) => Err(OrganError::InvalidInput(format!(
                "count must be between 1 and {}, got {}",
                MAX_RANDOM_COUNT, n
            ))),
        }
    }

    /// Handle rcp.mutex.status operation
    fn handle_mutex_status(&self, input: &Value) -> Result<Value, OrganError> {
        let Some(name) = input.get("mutex") else {
            let mut status = serde_json::Map::new();
            for id in MutexId::ALL {
                status.insert(
                    id.name().to_string(),
                    json!({ "locked": self.registry.is_locked(id) }),
                );
            }
            return Ok(Value::Object(status));
        };

        let name = name
            .as_str()
            .ok_or_else(|| OrganError::InvalidInput("mutex must be a string".to_string()))?;

        Ok(match MutexId::from_name(name) {
            Some(id) => json!({
                "mutex": id.name(),
                "locked": self.registry.is_locked(id),
            }),
            None => {
                self.metrics.record_ignored_id();
                json!({ "mutex": name, "ignored": true })
            }
        })
    }

    /// Handle rcp.capabilities operation
    fn handle_capabilities(&self) -> Result<Value, OrganError> {
        let card = self.describe();
        serde_json::to_value(&card).map_err(OrganError::SerializationError)
    }

    fn dispatch(&self, op: &str, input: &Value) -> Result<Value, OrganError> {
        match op {
            "rcp.timestamp" => Ok(self.handle_timestamp()),
            "rcp.rand" => self.handle_rand(input),
            "rcp.mutex.status" => self.handle_mutex_status(input),
            "rcp.capabilities" => self.handle_capabilities(),
            "metrics" => Ok(json!(self.metrics.snapshot())),
            other => Err(OrganError::UnsupportedOperation(other.to_string())),
        }
    }
}

fn random_source(config: &UtilsConfig) -> RandomSource {
    match config.seed {
        Some(seed) => RandomSource::with_seeder(Arc::new(FixedSeeder(seed))),
        None => RandomSource::with_seeder(Arc::new(WallClockSeeder)),
    }
}

impl From<OrganError> for RcpError {
    fn from(e: OrganError) -> Self {
        match e {
            OrganError::UnsupportedOperation(op) => RcpError::UnsupportedOperation(op),
            OrganError::InvalidInput(msg) => RcpError::InvalidInput(msg),
            OrganError::SerializationError(e) => RcpError::Serialization(e),
        }
    }
}

impl Default for UtilsOrgan {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Organ for UtilsOrgan {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError> {
        let timer = Timer::new();
        let result = self.dispatch(&stimulus.op, &stimulus.input);
        let latency = timer.elapsed_ms();

        let (ok, output) = match result {
            Ok(output) => (true, output),
            Err(OrganError::UnsupportedOperation(op)) => (
                false,
                json!({
                    "error": "UnsupportedOperation",
                    "op": op,
                    "available_operations": OPERATIONS,
                }),
            ),
            Err(e) => (false, json!({ "error": e.to_string() })),
        };

        self.metrics.record_request(ok, latency);
        debug!(op = %stimulus.op, ok, latency_ms = latency, "Stimulus handled");

        Ok(Response {
            ok,
            output,
            latency_ms: latency,
            cost: None,
        })
    }

    fn describe(&self) -> OrganCard {
        OrganCard {
            name: "rcp_utils".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Shared clock, random source and named locks for RCP camera clients".to_string(),
            division: "camera".to_string(),
            subsystem: "rcp".to_string(),
            tags: vec![
                "rcp".to_string(),
                "timestamp".to_string(),
                "random".to_string(),
                "mutex".to_string(),
            ],
            execution_modes: vec![
                "embedded".to_string(),
                "server".to_string(),
            ],
            functions: vec![
                FunctionCard {
                    name: "rcp.timestamp".to_string(),
                    description: "Milliseconds elapsed since the organ clock epoch (u32, wrapping)".to_string(),
                    tags: vec!["time".to_string(), "timeout".to_string()],
                    idempotent: false,
                    input_schema: None,
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "elapsed_ms": { "type": "integer" },
                            "mode": { "type": "string", "enum": ["frozen", "live"] }
                        }
                    }),
                },
                FunctionCard {
                    name: "rcp.rand".to_string(),
                    description: "Non-cryptographic pseudo-random integers in 0..=i32::MAX".to_string(),
                    tags: vec!["random".to_string(), "jitter".to_string()],
                    idempotent: false,
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "count": { "type": "integer", "minimum": 1, "maximum": MAX_RANDOM_COUNT }
                        }
                    })),
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "value": { "type": "integer" },
                            "values": { "type": "array", "items": { "type": "integer" } }
                        }
                    }),
                },
                FunctionCard {
                    name: "rcp.mutex.status".to_string(),
                    description: "Report whether the connection and discovery locks are held".to_string(),
                    tags: vec!["mutex".to_string(), "connection".to_string(), "discovery".to_string()],
                    idempotent: true,
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "mutex": { "type": "string", "enum": ["connection", "discovery"] }
                        }
                    })),
                    output_schema: json!({ "type": "object" }),
                },
                FunctionCard {
                    name: "rcp.capabilities".to_string(),
                    description: "Return organ capability card with all available functions".to_string(),
                    tags: vec!["metadata".to_string(), "discovery".to_string()],
                    idempotent: true,
                    input_schema: None,
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "version": { "type": "string" },
                            "functions": { "type": "array" }
                        }
                    }),
                },
                FunctionCard {
                    name: "metrics".to_string(),
                    description: "Snapshot of lock, clock, generator and request counters".to_string(),
                    tags: vec!["metrics".to_string()],
                    idempotent: true,
                    input_schema: None,
                    output_schema: json!({ "type": "object" }),
                },
            ],
        }
    }
}
