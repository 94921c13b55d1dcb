//! # pgshim-cli
//!
//! Command-line tools around the pgshim adapter: translate backend error
//! objects, preview script splitting, and run ad-hoc queries.

mod config;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pgshim_adapter::{
    DbValue, DriverAdapterFactory, Error, PgAdapterFactory, Queryable, SqlDriverAdapter, SqlQuery,
    split_script,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "pgshim")]
#[command(about = "Postgres driver adapter tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a backend error object (JSON) into a structured error
    Translate {
        /// Input file path; reads stdin when omitted
        input: Option<PathBuf>,
    },

    /// Print the statements a script is split into
    SplitScript {
        /// Script file path
        input: PathBuf,
    },

    /// Run a query and print the result set as JSON
    Query {
        /// SQL text
        sql: String,

        /// Positional arguments as a JSON array
        #[arg(short, long)]
        args: Option<String>,

        /// Path to YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database URL, overriding the configuration file
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Translate { input } => translate(input),
        Commands::SplitScript { input } => {
            let script = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            for statement in split_script(&script) {
                println!("{statement};");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query {
            sql,
            args,
            config,
            database_url,
        } => {
            let config = CliConfig::resolve(config.as_deref(), database_url)?;
            let query = SqlQuery::new(sql).with_args(parse_args(args.as_deref())?);
            run_query(config, query).await
        }
    }
}

fn translate(input: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let content = match input {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    let value: Value = serde_json::from_str(&content).context("input is not valid JSON")?;

    match pgshim_errors::translate(value) {
        Ok(structured) => {
            println!("{}", serde_json::to_string_pretty(&structured)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(value) => {
            tracing::debug!(%value, "[pgshim::translate] not a backend error");
            anyhow::bail!("input is not a backend error object")
        }
    }
}

fn parse_args(args: Option<&str>) -> anyhow::Result<Vec<DbValue>> {
    let Some(args) = args else {
        return Ok(Vec::new());
    };
    let values: Vec<Value> =
        serde_json::from_str(args).context("--args must be a JSON array")?;
    Ok(values.iter().map(DbValue::from_json).collect())
}

async fn run_query(config: CliConfig, query: SqlQuery) -> anyhow::Result<ExitCode> {
    let factory = PgAdapterFactory::postgres(config.connection, config.options);
    let adapter = factory.connect().await?;
    tracing::info!(sql = %query.sql, "[pgshim::query]");

    let result = adapter.query_raw(&query).await;
    adapter.dispose().await?;

    match result {
        Ok(result_set) => {
            println!("{}", serde_json::to_string_pretty(&result_set)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(Error::Driver(structured)) => {
            println!("{}", serde_json::to_string_pretty(&structured)?);
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}
