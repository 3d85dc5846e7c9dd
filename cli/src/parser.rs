//! Per-spout argument parser synthesized from constructor schemas.
//!
//! ```text
//! <SpoutName> rise <output_mode> <state_mode> <method_name> [backend flags] [spout flags] [--evaluate] [--args TOKEN...]
//! <SpoutName> help
//! ```

use clap::{Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;

use geniusrise_core::backend::all_backend_parameters;
use geniusrise_core::{
    BackendSelector, CallArgs, ComponentDescriptor, ConfigurationError, InvocationRequest,
    ParamDefault, ParamType, Parameter, Primitive,
};

/// Flag names a spout constructor parameter can never claim.
pub const RESERVED_FLAGS: &[&str] = &["args", "evaluate", "help"];

// Argument ids are never valid parameter names, so spout flags cannot collide with them.
const OUTPUT_MODE: &str = "@output_mode";
const STATE_MODE: &str = "@state_mode";
const METHOD_NAME: &str = "@method_name";
const EVALUATE: &str = "@evaluate";
const ARGS: &str = "@args";

#[derive(Debug, Clone)]
pub struct ParserSpec {
    pub command: Command,
    /// Every backend parameter, in declaration order.
    pub backend_flags: Vec<String>,
    /// Spout constructor parameters exposed as flags of their own.
    pub component_flags: Vec<String>,
    /// Spout constructor parameters that share a backend flag and receive its value.
    pub shared_flags: Vec<String>,
    component: String,
}

/// Build the `<SpoutName>` command for a discovered spout.
///
/// Fails when a required constructor parameter is named after a reserved flag,
/// since no command line could ever supply it.
pub fn build_parser(descriptor: &ComponentDescriptor) -> Result<ParserSpec, ConfigurationError> {
    let backend = all_backend_parameters();

    let mut rise = Command::new("rise")
        .about(format!("Run a method of {}", descriptor.name))
        .arg(
            Arg::new(OUTPUT_MODE)
                .value_name("OUTPUT_MODE")
                .required(true)
                .help("Output backend: batch, streaming or stream_to_batch"),
        )
        .arg(
            Arg::new(STATE_MODE)
                .value_name("STATE_MODE")
                .required(true)
                .help("State backend: none, in_memory, redis, postgres, dynamodb or prometheus"),
        )
        .arg(
            Arg::new(METHOD_NAME)
                .value_name("METHOD_NAME")
                .required(true)
                .help("Method to invoke on the spout"),
        );

    let mut backend_flags = Vec::new();
    for param in backend.iter() {
        rise = rise.arg(flag_for(param).help_heading("Backend options"));
        backend_flags.push(param.name.clone());
    }

    let mut component_flags = Vec::new();
    let mut shared_flags = Vec::new();
    for param in descriptor.init_schema.bindable() {
        if RESERVED_FLAGS.contains(&param.name.as_str()) {
            if param.default.is_required() {
                return Err(ConfigurationError::ReservedParameter {
                    component: descriptor.name.clone(),
                    name: param.name.clone(),
                });
            }
            tracing::debug!(flag = %param.name, "optional spout parameter hidden by a reserved flag");
            continue;
        }
        if backend.get(&param.name).is_some() {
            tracing::debug!(flag = %param.name, "spout parameter takes the backend flag's value");
            shared_flags.push(param.name.clone());
            continue;
        }
        rise = rise.arg(flag_for(param).help_heading("Spout options"));
        component_flags.push(param.name.clone());
    }

    rise = rise
        .arg(
            Arg::new(EVALUATE)
                .long("evaluate")
                .action(ArgAction::SetTrue)
                .help("Run the spout in evaluation mode"),
        )
        .arg(
            Arg::new(ARGS)
                .long("args")
                .num_args(0..)
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .value_name("TOKEN")
                .help("Arguments for the method: VALUE or KEY=VALUE. Must come last"),
        );

    let command = Command::new(descriptor.name.clone())
        .about(format!("Spout {}", descriptor.name))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true)
        .subcommand(rise)
        .subcommand(Command::new("help").about("Show the spout's methods and constructor flags"));

    Ok(ParserSpec {
        command,
        backend_flags,
        component_flags,
        shared_flags,
        component: descriptor.name.clone(),
    })
}

fn flag_for(param: &Parameter) -> Arg {
    let mut help = param.type_label();
    match &param.default {
        ParamDefault::Required => help.push_str(", required"),
        ParamDefault::Value(value) => help.push_str(&format!(", default {value}")),
        ParamDefault::Absent => {}
    }

    let arg = Arg::new(param.name.clone())
        .long(param.name.clone())
        .value_name(param.type_label().to_uppercase())
        .help(help);

    match param.ty {
        ParamType::Primitive {
            primitive: Primitive::Bool,
        } => arg.num_args(0..=1).default_missing_value("true"),
        _ => arg,
    }
}

impl ParserSpec {
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Build the invocation for a parsed `rise` subcommand.
    ///
    /// `defaults` supplies backend flag values the command line left out.
    pub fn request(
        &self,
        matches: &ArgMatches,
        defaults: &IndexMap<String, String>,
    ) -> Result<InvocationRequest, ConfigurationError> {
        let positional = |id: &str| {
            matches.get_one::<String>(id).cloned().ok_or_else(|| {
                ConfigurationError::MissingArgument(id.trim_start_matches('@').to_string())
            })
        };
        let selector = BackendSelector::parse(&positional(OUTPUT_MODE)?, &positional(STATE_MODE)?)?;
        let method_name = positional(METHOD_NAME)?;

        let mut backend_kwargs = IndexMap::new();
        for flag in &self.backend_flags {
            let value = matches
                .get_one::<String>(flag)
                .or_else(|| defaults.get(flag));
            if let Some(value) = value {
                backend_kwargs.insert(flag.clone(), value.clone());
            }
        }

        let mut component_kwargs = IndexMap::new();
        for flag in &self.component_flags {
            if let Some(value) = matches.get_one::<String>(flag) {
                component_kwargs.insert(flag.clone(), value.clone());
            }
        }
        for flag in &self.shared_flags {
            if let Some(value) = backend_kwargs.get(flag) {
                component_kwargs.insert(flag.clone(), value.clone());
            }
        }

        let tokens = matches.get_many::<String>(ARGS).into_iter().flatten();

        Ok(InvocationRequest {
            component_name: self.component.clone(),
            selector,
            method_name,
            backend_kwargs,
            component_kwargs,
            evaluate: matches.get_flag(EVALUATE),
            call: CallArgs::from_tokens(tokens),
        })
    }
}
