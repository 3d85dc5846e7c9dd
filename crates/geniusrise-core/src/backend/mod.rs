//! Output and state backends selected by name on the command line.
//!
//! Every backend is a catalog type with a declared constructor, so its
//! parameters become CLI flags the same way a spout's do. Backends that talk
//! to an external service (object stores, message queues, key-value stores)
//! get their client from a [`Connector`] registered by the embedding binary.

mod output;
mod state;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::catalog::{Catalog, TypeInfo, OUTPUT_BASE, STATE_BASE};
use crate::error::{BackendError, ConfigurationError, DispatchError};
use crate::introspect::inspect_signature;
use crate::schema::{ParameterSchema, Signature, INT, STR};
use crate::value::{Kwargs, Value};

pub use output::{BatchOutput, Output, S3Mirror, StreamToBatchOutput, StreamingOutput};
pub use state::{InMemoryState, NoState, RemoteState, State, StateValue};

pub const DEFAULT_BUFFER_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    Batch,
    Streaming,
    StreamToBatch,
}

impl OutputMode {
    pub const ALL: [OutputMode; 3] = [
        OutputMode::Batch,
        OutputMode::Streaming,
        OutputMode::StreamToBatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Batch => "batch",
            OutputMode::Streaming => "streaming",
            OutputMode::StreamToBatch => "stream_to_batch",
        }
    }

    /// Catalog name of the backend type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutputMode::Batch => "BatchOutput",
            OutputMode::Streaming => "StreamingOutput",
            OutputMode::StreamToBatch => "StreamToBatchOutput",
        }
    }

    fn signature(&self) -> fn() -> Option<Signature> {
        match self {
            OutputMode::Batch => batch_signature,
            OutputMode::Streaming => streaming_signature,
            OutputMode::StreamToBatch => stream_to_batch_signature,
        }
    }
}

impl FromStr for OutputMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownOutputMode(s.to_string()))
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateMode {
    None,
    InMemory,
    Redis,
    Postgres,
    DynamoDb,
    Prometheus,
}

impl StateMode {
    pub const ALL: [StateMode; 6] = [
        StateMode::None,
        StateMode::InMemory,
        StateMode::Redis,
        StateMode::Postgres,
        StateMode::DynamoDb,
        StateMode::Prometheus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateMode::None => "none",
            StateMode::InMemory => "in_memory",
            StateMode::Redis => "redis",
            StateMode::Postgres => "postgres",
            StateMode::DynamoDb => "dynamodb",
            StateMode::Prometheus => "prometheus",
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StateMode::None => "NoState",
            StateMode::InMemory => "InMemoryState",
            StateMode::Redis => "RedisState",
            StateMode::Postgres => "PostgresState",
            StateMode::DynamoDb => "DynamoDBState",
            StateMode::Prometheus => "PrometheusState",
        }
    }

    /// Whether the mode stores state outside this process.
    pub fn is_external(&self) -> bool {
        !matches!(self, StateMode::None | StateMode::InMemory)
    }

    fn signature(&self) -> fn() -> Option<Signature> {
        match self {
            StateMode::None | StateMode::InMemory => receiver_signature,
            StateMode::Redis => redis_signature,
            StateMode::Postgres => postgres_signature,
            StateMode::DynamoDb => dynamodb_signature,
            StateMode::Prometheus => prometheus_signature,
        }
    }
}

impl FromStr for StateMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownStateMode(s.to_string()))
    }
}

impl fmt::Display for StateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(output_mode, state_mode)` pair chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSelector {
    pub output: OutputMode,
    pub state: StateMode,
}

impl BackendSelector {
    pub fn new(output: OutputMode, state: StateMode) -> Self {
        Self { output, state }
    }

    pub fn parse(output: &str, state: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            output: output.parse()?,
            state: state.parse()?,
        })
    }
}

fn receiver_signature() -> Option<Signature> {
    Some(Signature::receiver_only())
}

fn batch_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output_folder", STR)
            .optional("output_s3_bucket", STR)
            .optional("output_s3_folder", STR),
    )
}

fn streaming_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output_kafka_topic", STR)
            .required("output_kafka_cluster_connection_string", STR),
    )
}

fn stream_to_batch_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output_folder", STR)
            .optional("output_s3_bucket", STR)
            .optional("output_s3_folder", STR)
            .with_default("buffer_size", INT, DEFAULT_BUFFER_SIZE),
    )
}

fn redis_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("redis_host", STR)
            .with_default("redis_port", INT, 6379)
            .with_default("redis_db", INT, 0),
    )
}

fn postgres_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("postgres_host", STR)
            .with_default("postgres_port", INT, 5432)
            .required("postgres_user", STR)
            .required("postgres_password", STR)
            .required("postgres_database", STR)
            .with_default("postgres_table", STR, "geniusrise_state"),
    )
}

fn dynamodb_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("dynamodb_table_name", STR)
            .required("dynamodb_region_name", STR),
    )
}

fn prometheus_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("prometheus_gateway", STR),
    )
}

/// Catalog entries for every backend type.
pub fn builtin_types() -> Vec<TypeInfo> {
    let outputs = OutputMode::ALL
        .into_iter()
        .map(|mode| TypeInfo::backend(mode.type_name(), OUTPUT_BASE, mode.signature()));
    let states = StateMode::ALL
        .into_iter()
        .map(|mode| TypeInfo::backend(mode.type_name(), STATE_BASE, mode.signature()));
    outputs.chain(states).collect()
}

fn schema_of(signature: fn() -> Option<Signature>) -> ParameterSchema {
    let signature = signature().expect("every backend declares its constructor");
    // Primitive annotations only, so the empty catalog is never consulted.
    inspect_signature(&Catalog::new(), &signature)
        .expect("backend constructors use primitive annotations only")
}

pub fn schema_for_output(mode: OutputMode) -> ParameterSchema {
    schema_of(mode.signature())
}

pub fn schema_for_state(mode: StateMode) -> ParameterSchema {
    schema_of(mode.signature())
}

/// Parameters of every backend mode, deduplicated by name (first wins).
pub fn all_backend_parameters() -> ParameterSchema {
    let mut seen = IndexMap::new();
    let schemas = OutputMode::ALL
        .into_iter()
        .map(schema_for_output)
        .chain(StateMode::ALL.into_iter().map(schema_for_state));
    for schema in schemas {
        for param in schema.iter() {
            seen.entry(param.name.clone())
                .or_insert_with(|| param.clone());
        }
    }
    ParameterSchema::new(seen.into_values().collect())
}

/// Bound parameters handed to a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub backend: &'static str,
    pub params: Kwargs,
}

impl Endpoint {
    pub fn new(backend: &'static str, params: Kwargs) -> Self {
        Self { backend, params }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(Value::as_i64)
    }
}

/// Byte-oriented key-value client behind the external state modes.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError>;
}

/// Object storage used to mirror batch output folders.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), BackendError>;
}

/// Message queue producer behind the streaming output.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BackendError>;

    async fn flush(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Opens a client of type `C` for a bound endpoint.
#[async_trait]
pub trait Connector<C: ?Sized>: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<C>, BackendError>;
}

/// Builds backends from raw flag values.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    state_clients: HashMap<StateMode, Arc<dyn Connector<dyn KeyValueClient>>>,
    object_store: Option<Arc<dyn Connector<dyn ObjectStore>>>,
    producer: Option<Arc<dyn Connector<dyn MessageProducer>>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes: Vec<&str> = self.state_clients.keys().map(StateMode::as_str).collect();
        modes.sort_unstable();
        f.debug_struct("BackendRegistry")
            .field("state_clients", &modes)
            .field("object_store", &self.object_store.is_some())
            .field("producer", &self.producer.is_some())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a key-value connector for an external state mode.
    pub fn register_state_client(
        &mut self,
        mode: StateMode,
        connector: impl Connector<dyn KeyValueClient> + 'static,
    ) -> &mut Self {
        if !mode.is_external() {
            tracing::warn!(mode = %mode, "state mode does not use a client; connector ignored");
            return self;
        }
        self.state_clients.insert(mode, Arc::new(connector));
        self
    }

    pub fn with_object_store(
        mut self,
        connector: impl Connector<dyn ObjectStore> + 'static,
    ) -> Self {
        self.object_store = Some(Arc::new(connector));
        self
    }

    pub fn with_producer(
        mut self,
        connector: impl Connector<dyn MessageProducer> + 'static,
    ) -> Self {
        self.producer = Some(Arc::new(connector));
        self
    }

    pub fn bind_output(
        &self,
        mode: OutputMode,
        raw: &IndexMap<String, String>,
    ) -> Result<Kwargs, ConfigurationError> {
        let kwargs = schema_for_output(mode).bind(raw)?;
        if mode == OutputMode::StreamToBatch {
            let size = kwargs.get("buffer_size").and_then(Value::as_i64);
            if let Some(size) = size.filter(|n| *n < 1) {
                return Err(ConfigurationError::InvalidValue {
                    name: "buffer_size".to_string(),
                    value: size.to_string(),
                    expected: "a positive integer",
                });
            }
        }
        Ok(kwargs)
    }

    pub fn bind_state(
        &self,
        mode: StateMode,
        raw: &IndexMap<String, String>,
    ) -> Result<Kwargs, ConfigurationError> {
        schema_for_state(mode).bind(raw)
    }

    pub async fn build_output(
        &self,
        mode: OutputMode,
        kwargs: Kwargs,
    ) -> Result<Box<dyn Output>, BackendError> {
        let endpoint = Endpoint::new(mode.as_str(), kwargs);
        match mode {
            OutputMode::Batch => Ok(Box::new(self.batch(&endpoint).await?)),
            OutputMode::Streaming => {
                let topic = required_str(&endpoint, "output_kafka_topic")?;
                let connector = self.producer.as_ref().ok_or_else(|| {
                    BackendError::construction(mode.as_str(), "no message producer is linked")
                })?;
                let producer = connector.connect(&endpoint).await?;
                Ok(Box::new(StreamingOutput::new(topic, producer)))
            }
            OutputMode::StreamToBatch => {
                let batch = self.batch(&endpoint).await?;
                let buffer_size = endpoint
                    .int("buffer_size")
                    .unwrap_or(DEFAULT_BUFFER_SIZE)
                    .max(1) as usize;
                Ok(Box::new(StreamToBatchOutput::new(batch, buffer_size)))
            }
        }
    }

    pub async fn build_state(
        &self,
        mode: StateMode,
        kwargs: Kwargs,
    ) -> Result<Box<dyn State>, BackendError> {
        match mode {
            StateMode::None => Ok(Box::new(NoState)),
            StateMode::InMemory => Ok(Box::new(InMemoryState::new())),
            _ => {
                let endpoint = Endpoint::new(mode.as_str(), kwargs);
                let connector = self.state_clients.get(&mode).ok_or_else(|| {
                    BackendError::construction(
                        mode.as_str(),
                        "no client connector is linked into this binary",
                    )
                })?;
                let client = connector.connect(&endpoint).await?;
                tracing::debug!(mode = %mode, "connected state backend");
                Ok(Box::new(RemoteState::new(mode, client)))
            }
        }
    }

    /// Bind and build the output backend, keeping the failing stage's error kind.
    pub async fn construct_output(
        &self,
        mode: OutputMode,
        raw: &IndexMap<String, String>,
    ) -> Result<Box<dyn Output>, DispatchError> {
        let kwargs = self.bind_output(mode, raw)?;
        self.build_output(mode, kwargs)
            .await
            .map_err(DispatchError::BackendConstruction)
    }

    pub async fn construct_state(
        &self,
        mode: StateMode,
        raw: &IndexMap<String, String>,
    ) -> Result<Box<dyn State>, DispatchError> {
        let kwargs = self.bind_state(mode, raw)?;
        self.build_state(mode, kwargs)
            .await
            .map_err(DispatchError::BackendConstruction)
    }

    async fn batch(&self, endpoint: &Endpoint) -> Result<BatchOutput, BackendError> {
        let folder = required_str(endpoint, "output_folder")?;
        let mirror = match endpoint.str("output_s3_bucket") {
            Some(bucket) => {
                let connector = self.object_store.as_ref().ok_or_else(|| {
                    BackendError::construction(endpoint.backend, "no object store is linked")
                })?;
                Some(S3Mirror {
                    store: connector.connect(endpoint).await?,
                    bucket: bucket.to_string(),
                    prefix: endpoint.str("output_s3_folder").unwrap_or_default().to_string(),
                })
            }
            None => None,
        };
        BatchOutput::new(folder, mirror)
    }
}

fn required_str(endpoint: &Endpoint, name: &str) -> Result<String, BackendError> {
    endpoint
        .str(name)
        .map(str::to_string)
        .ok_or_else(|| BackendError::construction(endpoint.backend, format!("'{name}' is not set")))
}
