//! scopeql command line
//!
//! `serve` runs the MCP server; `ask`, `info` and `interactive` talk to the
//! pipeline directly.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_mcp_sdk::mcp_server::{hyper_server, HyperServerOptions};
use scopeql_duck::DuckStore;
use scopeql_server::mcp::ScopeqlServerHandler;
use scopeql_server::{logging, Config, QueryAttempt, Text2Sql};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "scopeql", version, about = "Tenant-scoped natural language queries over DuckDB")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server (SSE)
    Serve,
    /// Answer one question and exit
    Ask {
        question: String,
        /// Tenant schema to answer from
        #[arg(long)]
        tenant: String,
    },
    /// Show the tables and columns the model gets to see
    Info,
    /// Ask questions in a loop
    Interactive {
        #[arg(long)]
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables (secrets)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config))?;

    // Keep one-shot commands quiet unless asked otherwise
    if !matches!(cli.command, Command::Serve) && std::env::var("RUST_LOG").is_err() {
        config.logging.level = "warn".to_string();
    }
    logging::init(&config.logging);

    let store = Arc::new(
        DuckStore::open(&config.database.path, config.store_options())
            .with_context(|| format!("Failed to open database {}", config.database.path))?,
    );

    if let Command::Info = cli.command {
        return print_info(store).await;
    }

    let api_key = Config::get_llm_api_key()?;
    info!(model = %config.llm.model, base_url = %config.llm.base_url, "Completion service configured");
    let pipeline = Arc::new(Text2Sql::from_config(&config, store, &api_key)?);

    match cli.command {
        Command::Serve => serve(&config, pipeline).await,
        Command::Ask { question, tenant } => {
            let attempt = pipeline.process_question(&question, &tenant).await;
            print_attempt(&attempt);
            if !attempt.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Interactive { tenant } => interactive(&pipeline, &tenant).await,
        Command::Info => Ok(()),
    }
}

async fn serve(config: &Config, pipeline: Arc<Text2Sql>) -> anyhow::Result<()> {
    let handler = ScopeqlServerHandler::new(pipeline);
    let server_info = ScopeqlServerHandler::server_info();

    info!("Starting scopeql MCP server on {}:{}", config.server.host, config.server.port);
    info!("Protocol: MCP with SSE (Server-Sent Events) support");

    let server = hyper_server::create_server(
        server_info,
        handler,
        HyperServerOptions {
            host: config.server.host.clone(),
            port: config.server.port,
            sse_support: true,
            ..Default::default()
        },
    );

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server failed: {}", e))
}

async fn print_info(store: Arc<DuckStore>) -> anyhow::Result<()> {
    use scopeql_core::SchemaSource;

    let snapshot = tokio::task::spawn_blocking(move || store.snapshot())
        .await?
        .context("Failed to read schema")?;
    println!("Tables: {}", snapshot.len());
    println!("{}", snapshot.render());
    Ok(())
}

fn print_attempt(attempt: &QueryAttempt) {
    if let Some(sql) = &attempt.generated_sql {
        println!("SQL: {}", sql);
    }

    if let Some(err) = attempt.error() {
        eprintln!("Error: {}", err.user_message());
        return;
    }

    if let Some(result) = attempt.rows() {
        println!("Rows: {}", result.len());
        for row in result.rows().iter().take(PREVIEW_ROWS) {
            println!("  {}", serde_json::Value::Object(row.clone()));
        }
        if result.len() > PREVIEW_ROWS {
            println!("  ... and {} more", result.len() - PREVIEW_ROWS);
        }
    }

    if let Some(explanation) = &attempt.explanation {
        println!();
        println!("{}", explanation);
    }
}

async fn interactive(pipeline: &Text2Sql, tenant: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("scopeql interactive mode, tenant '{}'. Type 'help' for commands.", tenant);

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" => {
                println!("Ask a question about your data, or:");
                println!("  info   show tables and columns");
                println!("  quit   leave (also 'exit', 'q')");
            }
            "info" => match pipeline.schema_info().await {
                Ok(info) => println!("Tables ({}): {}", info.total_tables, info.tables.join(", ")),
                Err(e) => eprintln!("Error: {}", e),
            },
            question => {
                let attempt = pipeline.process_question(question, tenant).await;
                print_attempt(&attempt);
            }
        }
    }

    Ok(())
}
