use std::path::PathBuf;

use async_trait::async_trait;
use geniusrise_core::schema::{ParamDefault, STR};
use geniusrise_core::{
    CallArgs, ConstructionError, InvocationError, Kwargs, MethodInfo, Signature, Spout,
    SpoutContext, StateValue, TypeInfo, TypeRef, Value, OUTPUT_BASE, SPOUT_BASE, STATE_BASE,
};
use serde_json::json;

/// Reads a local text file line by line, remembering how far it got.
#[derive(Debug)]
pub struct LocalFileSpout {
    context: SpoutContext,
    path: PathBuf,
    tag: Option<Value>,
}

const METHODS: &[MethodInfo] = &[
    MethodInfo::new(
        "fetch_count",
        &[],
        "Count the lines in the file.",
    ),
    MethodInfo::new(
        "fetch_lines",
        &["limit="],
        "Save each line not read by a previous run as a record and advance the stored offset.",
    ),
];

fn signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output", TypeRef::Named(OUTPUT_BASE))
            .required("state", TypeRef::Named(STATE_BASE))
            .required("path", STR)
            .untyped("tag", ParamDefault::Absent)
            .with_default("encoding", STR, "utf-8"),
    )
}

fn build(context: SpoutContext, kwargs: Kwargs) -> Result<Box<dyn Spout>, ConstructionError> {
    let path = kwargs
        .get("path")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .ok_or_else(|| ConstructionError::Failed("'path' must be a string".to_string()))?;
    if !path.is_file() {
        return Err(ConstructionError::Failed(format!(
            "{} is not a readable file",
            path.display()
        )));
    }

    let encoding = kwargs
        .get("encoding")
        .and_then(Value::as_str)
        .unwrap_or("utf-8");
    if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
        return Err(ConstructionError::Failed(format!(
            "unsupported encoding '{encoding}'"
        )));
    }

    Ok(Box::new(LocalFileSpout {
        context,
        path,
        tag: kwargs.get("tag").cloned(),
    }))
}

pub(crate) const TYPE_INFO: TypeInfo = TypeInfo {
    name: "LocalFileSpout",
    extends: Some(SPOUT_BASE),
    is_abstract: false,
    signature,
    factory: Some(build),
    methods: METHODS,
};

inventory::submit! { TYPE_INFO }

impl LocalFileSpout {
    fn state_key(&self) -> String {
        format!("local_file:{}", self.path.display())
    }

    async fn read_lines(&self) -> Result<Vec<String>, InvocationError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| InvocationError::Failed(format!("{}: {e}", self.path.display())))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    async fn offset(&self) -> Result<usize, InvocationError> {
        let state = self.context.state.get_state(&self.state_key()).await?;
        Ok(state
            .and_then(|doc| doc.get("offset").and_then(serde_json::Value::as_u64))
            .unwrap_or(0) as usize)
    }

    async fn fetch_lines(&mut self, args: &CallArgs) -> Result<serde_json::Value, InvocationError> {
        let limit = args.optional_int("limit", 0)?;
        if let Some(n) = limit.filter(|n| *n < 0) {
            return Err(InvocationError::InvalidArgument {
                name: "limit".to_string(),
                expected: "a non-negative integer",
                got: n.to_string(),
            });
        }

        let lines = self.read_lines().await?;
        let start = self.offset().await?.min(lines.len());
        let take = limit.map_or(usize::MAX, |n| n as usize);
        let tag = self.tag.as_ref().map(Value::to_json);

        let mut read = 0;
        for (number, line) in lines.iter().enumerate().skip(start).take(take) {
            let record = json!({ "line": line, "number": number, "tag": tag });
            if !self.context.evaluate {
                self.context
                    .output
                    .save(&record, &format!("line-{number:08}.json"))
                    .await?;
            }
            read += 1;
        }

        let offset = start + read;
        if !self.context.evaluate {
            let mut doc = StateValue::new();
            doc.insert("offset".to_string(), json!(offset));
            self.context.state.set_state(&self.state_key(), doc).await?;
        }
        tracing::debug!(path = %self.path.display(), read, offset, "fetched lines");
        Ok(json!({ "read": read, "offset": offset }))
    }
}

#[async_trait]
impl Spout for LocalFileSpout {
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
            "fetch_count" => Ok(json!(self.read_lines().await?.len())),
            "fetch_lines" => self.fetch_lines(&args).await,
            other => Err(InvocationError::UnsupportedMethod(other.to_string())),
        }
    }
}
