//! The contract every discoverable spout implements.

use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::{Output, State};
use crate::error::{ConstructionError, InvocationError};
use crate::value::{CallArgs, Kwargs};

/// Backends and flags handed to a spout when it is constructed.
pub struct SpoutContext {
    pub id: Uuid,
    pub output: Box<dyn Output>,
    pub state: Box<dyn State>,
    /// Set by `--evaluate`; spouts may skip side effects when true.
    pub evaluate: bool,
}

impl SpoutContext {
    pub fn new(output: Box<dyn Output>, state: Box<dyn State>) -> Self {
        Self {
            id: Uuid::new_v4(),
            output,
            state,
            evaluate: false,
        }
    }

    pub fn evaluating(mut self, evaluate: bool) -> Self {
        self.evaluate = evaluate;
        self
    }
}

impl std::fmt::Debug for SpoutContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoutContext")
            .field("id", &self.id)
            .field("output", &self.output.mode())
            .field("state", &self.state.mode())
            .field("evaluate", &self.evaluate)
            .finish()
    }
}

#[async_trait]
pub trait Spout: Send {
    fn context(&self) -> &SpoutContext;

    fn context_mut(&mut self) -> &mut SpoutContext;

    /// Invoke one of the methods declared in the spout's registration.
    async fn invoke(
        &mut self,
        method: &str,
        args: CallArgs,
    ) -> Result<serde_json::Value, InvocationError>;
}

/// Builds a spout from its backends and bound constructor arguments.
pub type SpoutFactory = fn(SpoutContext, Kwargs) -> Result<Box<dyn Spout>, ConstructionError>;

/// A method a spout exposes to the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: &'static str,
    /// Parameter names, with defaults rendered as `name=value`.
    pub params: &'static [&'static str],
    pub doc: &'static str,
}

impl MethodInfo {
    pub const fn new(
        name: &'static str,
        params: &'static [&'static str],
        doc: &'static str,
    ) -> Self {
        Self { name, params, doc }
    }
}
