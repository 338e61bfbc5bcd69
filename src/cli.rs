//! Command line definitions and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tabled::{Table, Tabled};

use s3hub_core::error::AppError;
use s3hub_plugin::{OperationArgs, OperationContext, PluginManager, PluginSummary, S3Operation};

/// Plugin runtime for storage object operations
#[derive(Debug, Parser)]
#[command(name = "s3hub", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overlay to merge over `config/default`
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List registered plugins
    Plugins,
    /// Run an operation through the plugin pipeline
    Exec {
        /// Operation name (get, put, create-bucket, ...)
        operation: S3Operation,
        /// Target bucket
        #[arg(long)]
        bucket: Option<String>,
        /// Target object key
        #[arg(long)]
        key: Option<String>,
        /// Extra argument, repeatable
        #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_arg)]
        args: Vec<(String, Value)>,
    },
}

impl Cli {
    /// Execute the selected command against `manager`.
    pub async fn execute(&self, manager: &PluginManager) -> Result<(), AppError> {
        match &self.command {
            Commands::Plugins => {
                let plugins = manager.get_plugins().await;
                print_plugins(&plugins, self.format)
            }
            Commands::Exec {
                operation,
                bucket,
                key,
                args,
            } => {
                let (ctx, arguments) =
                    build_request(*operation, bucket.as_deref(), key.as_deref(), args);
                let result = manager
                    .execute_operation(*operation, &ctx, arguments)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(())
            }
        }
    }
}

/// Builds the call context and arguments for `exec`.
///
/// The object key travels only in the arguments so pre-processors can
/// rewrite it before any plugin reads it.
fn build_request(
    operation: S3Operation,
    bucket: Option<&str>,
    key: Option<&str>,
    extra: &[(String, Value)],
) -> (OperationContext, OperationArgs) {
    let mut ctx = OperationContext::new(operation);
    let mut arguments = OperationArgs::new();
    if let Some(bucket) = bucket {
        ctx = ctx.with_bucket(bucket);
        arguments.insert("bucket", bucket);
    }
    if let Some(key) = key {
        arguments.insert("key", key);
    }
    for (name, value) in extra {
        arguments.insert(name, value.clone());
    }
    (ctx, arguments)
}

/// Parses `name=value`, reading the value as JSON when it is valid JSON.
fn parse_arg(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing argument name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[derive(Debug, Tabled)]
struct PluginRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Operations")]
    operations: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
}

impl From<&PluginSummary> for PluginRow {
    fn from(summary: &PluginSummary) -> Self {
        let join = |items: Vec<String>| {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        };
        Self {
            name: summary.metadata.name.clone(),
            version: summary.metadata.version.clone(),
            priority: summary.priority.to_string(),
            operations: join(summary.operations.iter().map(|o| o.to_string()).collect()),
            capabilities: join(summary.capabilities.iter().map(|c| c.to_string()).collect()),
        }
    }
}

fn print_plugins(plugins: &[PluginSummary], format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => {
            if plugins.is_empty() {
                println!("No plugins registered.");
            } else {
                let rows: Vec<PluginRow> = plugins.iter().map(PluginRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(plugins)?);
        }
    }
    Ok(())
}
