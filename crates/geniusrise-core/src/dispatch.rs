//! Runs one invocation: backends, component, method, result.

use indexmap::IndexMap;
use tracing::Instrument;

use crate::backend::{BackendRegistry, BackendSelector, Output, State};
use crate::discover::ComponentDescriptor;
use crate::error::{ConstructionError, DispatchError, InvocationError, MethodNotFoundError};
use crate::spout::{MethodInfo, Spout, SpoutContext};
use crate::value::CallArgs;

/// Everything parsed from the command line for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub component_name: String,
    pub selector: BackendSelector,
    pub method_name: String,
    /// Raw backend flag values, bound against the selected modes' schemas.
    pub backend_kwargs: IndexMap<String, String>,
    /// Raw component flag values, bound against the component's constructor.
    pub component_kwargs: IndexMap<String, String>,
    pub evaluate: bool,
    pub call: CallArgs,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub result: Result<serde_json::Value, DispatchError>,
}

impl DispatchOutcome {
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => 0,
            Err(e) => e.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher<'a> {
    descriptor: &'a ComponentDescriptor,
    registry: &'a BackendRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(descriptor: &'a ComponentDescriptor, registry: &'a BackendRegistry) -> Self {
        Self {
            descriptor,
            registry,
        }
    }

    pub async fn run(&self, request: InvocationRequest) -> DispatchOutcome {
        let span = tracing::info_span!(
            "invocation",
            component = %self.descriptor.name,
            method = %request.method_name,
            output = %request.selector.output,
            state = %request.selector.state,
            evaluate = request.evaluate,
        );
        let result = async {
            let result = self.dispatch(request).await;
            if let Err(e) = &result {
                tracing::error!(exit_code = e.exit_code(), error = %e, "invocation failed");
            }
            result
        }
        .instrument(span)
        .await;
        DispatchOutcome { result }
    }

    async fn dispatch(&self, request: InvocationRequest) -> Result<serde_json::Value, DispatchError> {
        let InvocationRequest {
            selector,
            method_name,
            backend_kwargs,
            component_kwargs,
            evaluate,
            call,
            ..
        } = request;

        let output = self
            .registry
            .construct_output(selector.output, &backend_kwargs)
            .await?;
        let state = self
            .registry
            .construct_state(selector.state, &backend_kwargs)
            .await?;
        tracing::debug!(output = %selector.output, state = %selector.state, "constructed backends");

        let mut spout = self
            .construct(output, state, &component_kwargs, evaluate)
            .map_err(|source| DispatchError::ComponentConstruction {
                component: self.descriptor.name.clone(),
                source,
            })?;

        let method = self.resolve(&method_name)?;
        tracing::info!(
            component = %self.descriptor.name,
            method = method.name,
            id = %spout.context().id,
            "invoking"
        );

        let invocation_failed = |source: InvocationError| DispatchError::Invocation {
            method: method.name.to_string(),
            source,
        };
        let result = spout
            .invoke(method.name, call)
            .await
            .map_err(invocation_failed)?;
        spout
            .context_mut()
            .output
            .flush()
            .await
            .map_err(|e| invocation_failed(e.into()))?;
        Ok(result)
    }

    fn construct(
        &self,
        output: Box<dyn Output>,
        state: Box<dyn State>,
        raw: &IndexMap<String, String>,
        evaluate: bool,
    ) -> Result<Box<dyn Spout>, ConstructionError> {
        let info = &self.descriptor.component_type;
        let factory = info
            .factory
            .ok_or_else(|| ConstructionError::Abstract(info.name.to_string()))?;
        let kwargs = self.descriptor.init_schema.bind(raw)?;
        let context = SpoutContext::new(output, state).evaluating(evaluate);
        factory(context, kwargs)
    }

    fn resolve(&self, method: &str) -> Result<&'static MethodInfo, MethodNotFoundError> {
        self.descriptor
            .component_type
            .method(method)
            .ok_or_else(|| MethodNotFoundError {
                component: self.descriptor.name.clone(),
                method: method.to_string(),
                available: self.descriptor.component_type.method_names(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use async_trait::async_trait;

    use crate::backend::{OutputMode, StateMode, StateValue};
    use crate::catalog::{Catalog, TypeInfo, SPOUT_BASE};
    use crate::introspect::inspect_constructor;
    use crate::schema::{Signature, TypeRef, INT};
    use crate::spout::SpoutFactory;
    use crate::value::Kwargs;

    thread_local! {
        // Each #[tokio::test] drives its spout on its own current-thread runtime.
        static INVOCATIONS: Cell<usize> = const { Cell::new(0) };
    }

    fn invocations() -> usize {
        INVOCATIONS.with(Cell::get)
    }

    struct Adder {
        context: SpoutContext,
        offset: i64,
    }

    #[async_trait]
    impl Spout for Adder {
        fn context(&self) -> &SpoutContext {
            &self.context
        }

        fn context_mut(&mut self) -> &mut SpoutContext {
            &mut self.context
        }

        async fn invoke(
            &mut self,
            method: &str,
            args: CallArgs,
        ) -> Result<serde_json::Value, InvocationError> {
            INVOCATIONS.with(|n| n.set(n.get() + 1));
            match method {
                "add" => {
                    let sum = args.int("a", 0)? + args.int("b", 1)? + self.offset;
                    let mut doc = StateValue::new();
                    doc.insert("last".into(), sum.into());
                    self.context.state.set_state("add", doc).await?;
                    Ok(serde_json::json!(sum))
                }
                "fail" => Err(InvocationError::Failed("requested failure".into())),
                other => Err(InvocationError::UnsupportedMethod(other.to_string())),
            }
        }
    }

    fn adder_signature() -> Option<Signature> {
        Some(
            Signature::new()
                .receiver()
                .required("output", TypeRef::Named("Output"))
                .required("state", TypeRef::Named("State"))
                .with_default("offset", INT, 0),
        )
    }

    fn build_adder(context: SpoutContext, kwargs: Kwargs) -> Result<Box<dyn Spout>, ConstructionError> {
        let offset = kwargs.get("offset").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(Box::new(Adder { context, offset }))
    }

    const ADDER_METHODS: &[MethodInfo] = &[
        MethodInfo::new("add", &["a", "b"], "Add two numbers."),
        MethodInfo::new("fail", &[], "Always fails."),
    ];

    fn descriptor(factory: bool) -> ComponentDescriptor {
        let mut catalog = Catalog::builtin();
        let info = TypeInfo {
            name: "AdderSpout",
            extends: Some(SPOUT_BASE),
            is_abstract: false,
            signature: adder_signature,
            factory: factory.then_some(build_adder as SpoutFactory),
            methods: ADDER_METHODS,
        };
        catalog.register(info);
        ComponentDescriptor {
            name: info.name.to_string(),
            component_type: info,
            init_schema: inspect_constructor(&catalog, info.name).unwrap(),
            package: "tests".into(),
        }
    }

    fn request(method: &str, state: StateMode) -> InvocationRequest {
        let dir = std::env::temp_dir();
        let mut backend_kwargs = IndexMap::new();
        backend_kwargs.insert("output_folder".to_string(), dir.display().to_string());
        InvocationRequest {
            component_name: "AdderSpout".into(),
            selector: BackendSelector::new(OutputMode::Batch, state),
            method_name: method.into(),
            backend_kwargs,
            component_kwargs: IndexMap::new(),
            evaluate: false,
            call: CallArgs::new(),
        }
    }

    #[tokio::test]
    async fn test_successful_dispatch_returns_result() {
        let descriptor = descriptor(true);
        let registry = BackendRegistry::new();
        let mut req = request("add", StateMode::InMemory);
        req.component_kwargs.insert("offset".into(), "10".into());
        req.call = CallArgs::new().arg(1).kwarg("b", 2);
        let before = invocations();

        let outcome = Dispatcher::new(&descriptor, &registry).run(req).await;
        assert_eq!(invocations(), before + 1);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.result.unwrap(), serde_json::json!(13));
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_invoked() {
        let descriptor = descriptor(true);
        let registry = BackendRegistry::new();
        let before = invocations();

        let outcome = Dispatcher::new(&descriptor, &registry)
            .run(request("missing", StateMode::None))
            .await;
        assert_eq!(outcome.exit_code(), 5);
        match outcome.result {
            Err(DispatchError::MethodNotFound(e)) => {
                assert_eq!(e.available, vec!["add".to_string(), "fail".to_string()]);
            }
            other => panic!("expected MethodNotFound, got {other:?}"),
        }
        assert_eq!(invocations(), before);
    }

    #[tokio::test]
    async fn test_method_errors_map_to_invocation() {
        let descriptor = descriptor(true);
        let registry = BackendRegistry::new();
        let outcome = Dispatcher::new(&descriptor, &registry)
            .run(request("fail", StateMode::None))
            .await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.result.unwrap_err().to_string().contains("requested failure"));
    }

    #[tokio::test]
    async fn test_bad_component_flag_fails_construction() {
        let descriptor = descriptor(true);
        let registry = BackendRegistry::new();
        let mut req = request("add", StateMode::None);
        req.component_kwargs.insert("offset".into(), "ten".into());

        let outcome = Dispatcher::new(&descriptor, &registry).run(req).await;
        assert_eq!(outcome.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_abstract_component_fails_construction() {
        let descriptor = descriptor(false);
        let registry = BackendRegistry::new();
        let outcome = Dispatcher::new(&descriptor, &registry)
            .run(request("add", StateMode::None))
            .await;
        assert!(matches!(
            outcome.result,
            Err(DispatchError::ComponentConstruction {
                source: ConstructionError::Abstract(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_backend_failures_keep_their_kind() {
        let descriptor = descriptor(true);
        let registry = BackendRegistry::new();

        let mut missing_flag = request("add", StateMode::Redis);
        missing_flag.backend_kwargs.clear();
        let outcome = Dispatcher::new(&descriptor, &registry).run(missing_flag).await;
        assert_eq!(outcome.exit_code(), 2);

        let mut no_connector = request("add", StateMode::Redis);
        no_connector
            .backend_kwargs
            .insert("redis_host".into(), "localhost".into());
        let outcome = Dispatcher::new(&descriptor, &registry).run(no_connector).await;
        assert_eq!(outcome.exit_code(), 3);
    }
}
