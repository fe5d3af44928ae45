use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use knowledge_mcp::config::Config;
use knowledge_mcp::mcp_server::KnowledgeMcpServer;

#[derive(Parser)]
#[command(name = "knowledge-mcp", version, about = "MCP server for searching a local document collection")]
struct Cli {
    /// Configuration file (default: the platform config directory)
    #[arg(long, env = "KNOWLEDGE_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base root, overriding the configured value
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log filter, e.g. "info" or "knowledge_mcp=debug"
    #[arg(long, default_value = "info", env = "KNOWLEDGE_MCP_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Priority: CLI args > environment > config file > defaults
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(root) = cli.root {
        config.knowledge.root = root;
    }
    config.validate()?;

    KnowledgeMcpServer::serve_stdio(config).await?;

    Ok(())
}
