use async_trait::async_trait;
use geniusrise_core::{
    CallArgs, ConstructionError, InvocationError, Kwargs, MethodInfo, Signature, Spout,
    SpoutContext, StateValue, TypeInfo, TypeRef, Value, OUTPUT_BASE, SPOUT_BASE, STATE_BASE,
};
use serde_json::json;

/// Arithmetic spout used to exercise the command line end to end.
#[derive(Debug)]
pub struct TestSpoutCtlSpout {
    context: SpoutContext,
    extra: Kwargs,
}

const METHODS: &[MethodInfo] = &[
    MethodInfo::new(
        "test_method",
        &["a", "b", "c"],
        "Return c * (a + b). Keyword arguments take precedence over positional ones.",
    ),
    MethodInfo::new(
        "sum_product",
        &["*args", "**kwargs"],
        "Return the sum of the positional arguments times the sum of the keyword arguments.",
    ),
];

fn signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output", TypeRef::Named(OUTPUT_BASE))
            .required("state", TypeRef::Named(STATE_BASE))
            .var_kwargs("kwargs"),
    )
}

fn build(context: SpoutContext, kwargs: Kwargs) -> Result<Box<dyn Spout>, ConstructionError> {
    Ok(Box::new(TestSpoutCtlSpout {
        context,
        extra: kwargs,
    }))
}

pub(crate) const TYPE_INFO: TypeInfo = TypeInfo {
    name: "TestSpoutCtlSpout",
    extends: Some(SPOUT_BASE),
    is_abstract: false,
    signature,
    factory: Some(build),
    methods: METHODS,
};

inventory::submit! { TYPE_INFO }

fn integer(value: &Value, name: &str) -> Result<i64, InvocationError> {
    value.as_i64().ok_or_else(|| InvocationError::InvalidArgument {
        name: name.to_string(),
        expected: "an integer",
        got: value.to_string(),
    })
}

fn overflow() -> InvocationError {
    InvocationError::Failed("integer overflow".to_string())
}

impl TestSpoutCtlSpout {
    pub fn extra(&self) -> &Kwargs {
        &self.extra
    }

    async fn test_method(&mut self, args: &CallArgs) -> Result<serde_json::Value, InvocationError> {
        let a = args.int("a", 0)?;
        let b = args.int("b", 1)?;
        let c = args.int("c", 2)?;
        let result = a
            .checked_add(b)
            .and_then(|sum| sum.checked_mul(c))
            .ok_or_else(overflow)?;

        let mut doc = StateValue::new();
        doc.insert("result".to_string(), json!(result));
        self.context.state.set_state("test_method", doc).await?;
        self.context
            .output
            .save(&json!({ "result": result }), "test_method.json")
            .await?;
        Ok(json!(result))
    }

    fn sum_product(&self, args: &CallArgs) -> Result<serde_json::Value, InvocationError> {
        let mut positional = 0i64;
        for (i, value) in args.args.iter().enumerate() {
            let n = integer(value, &format!("args[{i}]"))?;
            positional = positional.checked_add(n).ok_or_else(overflow)?;
        }
        let mut keyword = 0i64;
        for (name, value) in &args.kwargs {
            let n = integer(value, name)?;
            keyword = keyword.checked_add(n).ok_or_else(overflow)?;
        }
        let product = positional.checked_mul(keyword).ok_or_else(overflow)?;
        Ok(json!(product))
    }
}

#[async_trait]
impl Spout for TestSpoutCtlSpout {
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
        match method {
            "test_method" => self.test_method(&args).await,
            "sum_product" => self.sum_product(&args),
            other => Err(InvocationError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geniusrise_core::backend::{BatchOutput, InMemoryState, NoState};
    use geniusrise_core::State;
    use tempfile::TempDir;

    fn spout(dir: &TempDir) -> Box<dyn Spout> {
        let output = BatchOutput::new(dir.path(), None).unwrap();
        let context = SpoutContext::new(Box::new(output), Box::new(InMemoryState::new()));
        build(context, Kwargs::new()).unwrap()
    }

    #[tokio::test]
    async fn test_method_prefers_keyword_arguments() {
        let dir = TempDir::new().unwrap();
        let mut spout = spout(&dir);
        let call = CallArgs::from_tokens(["1", "2", "3", "a=4", "b=5", "c=6"]);

        let result = spout.invoke("test_method", call).await.unwrap();
        assert_eq!(result, json!(54));

        let state = spout.context().state.get_state("test_method").await.unwrap();
        assert_eq!(state.unwrap().get("result"), Some(&json!(54)));
        let saved = std::fs::read_to_string(dir.path().join("test_method.json")).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&saved).unwrap(), json!({"result": 54}));
    }

    #[tokio::test]
    async fn test_method_binds_positionally() {
        let dir = TempDir::new().unwrap();
        let mut spout = spout(&dir);
        let result = spout
            .invoke("test_method", CallArgs::from_tokens(["1", "2", "3"]))
            .await
            .unwrap();
        assert_eq!(result, json!(9));
    }

    #[tokio::test]
    async fn test_sum_product() {
        let dir = TempDir::new().unwrap();
        let mut spout = spout(&dir);
        let call = CallArgs::from_tokens(["1", "2", "3", "a=4", "b=5", "c=6"]);
        assert_eq!(spout.invoke("sum_product", call).await.unwrap(), json!(90));

        let bad = CallArgs::from_tokens(["x"]);
        assert!(matches!(
            spout.invoke("sum_product", bad).await,
            Err(InvocationError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_overflow_is_an_invocation_error() {
        let dir = TempDir::new().unwrap();
        let mut spout = spout(&dir);

        let big = CallArgs::from_tokens(["9223372036854775807", "1", "1"]);
        let err = spout.invoke("test_method", big).await.unwrap_err();
        assert!(matches!(err, InvocationError::Failed(ref m) if m.contains("overflow")));
        assert!(!dir.path().join("test_method.json").exists());

        let half = CallArgs::from_tokens(["4611686018427387904", "4611686018427387904", "a=1"]);
        assert!(matches!(
            spout.invoke("sum_product", half).await,
            Err(InvocationError::Failed(_))
        ));

        let product = CallArgs::from_tokens(["4294967296", "a=4294967296"]);
        assert!(spout.invoke("sum_product", product).await.is_err());
    }

    #[tokio::test]
    async fn test_none_state_records_nothing() {
        let dir = TempDir::new().unwrap();
        let output = BatchOutput::new(dir.path(), None).unwrap();
        let context = SpoutContext::new(Box::new(output), Box::new(NoState));
        let mut spout = build(context, Kwargs::new()).unwrap();

        spout
            .invoke("test_method", CallArgs::from_tokens(["1", "1", "1"]))
            .await
            .unwrap();
        assert_eq!(NoState.get_state("test_method").await.unwrap(), None);
        assert_eq!(spout.context().state.get_state("test_method").await.unwrap(), None);
    }
}
