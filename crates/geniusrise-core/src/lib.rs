//! Core of the geniusrise spout runner.
//!
//! Spout types register themselves in a [`Catalog`]; the [`Discoverer`] finds
//! the packages that export them and introspects their constructors; the
//! [`Dispatcher`] builds the selected backends and the spout, then invokes one
//! of its methods.

pub mod backend;
pub mod catalog;
pub mod discover;
pub mod dispatch;
pub mod error;
pub mod introspect;
pub mod schema;
pub mod spout;
pub mod value;

pub use backend::{
    BackendRegistry, BackendSelector, Connector, Endpoint, KeyValueClient, MessageProducer,
    ObjectStore, Output, OutputMode, State, StateMode, StateValue,
};
pub use catalog::{Catalog, TypeInfo, OUTPUT_BASE, SPOUT_BASE, STATE_BASE};
pub use discover::{ComponentDescriptor, Discoverer, ScanPolicy, ScanResult, ScanWarning};
pub use dispatch::{DispatchOutcome, Dispatcher, InvocationRequest};
pub use error::{
    BackendError, ConfigurationError, ConstructionError, DiscoveryError, DispatchError,
    IntrospectionError, InvocationError, MethodNotFoundError, ModuleLoadError,
};
pub use introspect::{inspect_constructor, inspect_signature};
pub use schema::{ParamDefault, ParamType, Parameter, ParameterSchema, Primitive, Signature, TypeRef};
pub use spout::{MethodInfo, Spout, SpoutContext, SpoutFactory};
pub use value::{CallArgs, Kwargs, Value};
