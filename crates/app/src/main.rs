use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use context_agent_core::{
    AgentConfig, AgentError, ContextAgent, CredentialProvider, FileBackend, FileCredentials,
    OpenAiChat, OpenAiEmbedder, VectorStore,
};
use credentials::EnvOverrideCredentials;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

mod credentials;

type Agent = ContextAgent<OpenAiEmbedder, OpenAiChat, EnvOverrideCredentials, FileBackend>;

#[derive(Parser)]
#[command(name = "context-agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the store, the API key and config.toml
    #[arg(long, env = "CONTEXT_AGENT_HOME", default_value = ".context-agent")]
    data_dir: PathBuf,

    /// Config file (defaults to <data-dir>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key that takes precedence over the saved one
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store text.
    Ingest {
        /// Literal text to ingest.
        #[arg(long, conflicts_with_all = ["file", "dir"])]
        text: Option<String>,
        /// File to ingest.
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,
        /// Folder whose .txt and .md files are ingested recursively.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Origin label stored with every chunk.
        #[arg(long)]
        source: Option<String>,
    },
    /// Answer a prompt grounded in the stored chunks.
    Ask {
        prompt: String,
    },
    /// Save the API key.
    SetKey {
        key: String,
    },
    /// Print the saved API key, masked.
    ShowKey,
    /// Summarize what the store holds.
    Stats,
    /// Drop every stored chunk.
    Reset,
    /// Answer JSON requests read line by line from stdin.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    // stdout carries command output and `serve` responses.
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("config.toml"));
    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let agent = build_agent(&cli, &config)?;
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        data_dir = %cli.data_dir.display(),
        "context-agent boot"
    );

    match cli.command {
        Command::Ingest {
            text,
            file,
            dir,
            source,
        } => {
            if let Some(dir) = dir {
                ingest_folder(&agent, &dir).await?;
            } else {
                let (content, source) = match (text, file) {
                    (Some(text), _) => (text, source),
                    (None, Some(file)) => {
                        let content = tokio::fs::read_to_string(&file)
                            .await
                            .with_context(|| format!("failed to read {}", file.display()))?;
                        let source = source.or_else(|| Some(file.display().to_string()));
                        (content, source)
                    }
                    (None, None) => anyhow::bail!("one of --text, --file or --dir is required"),
                };
                let report = agent.ingest(&content, source.as_deref()).await?;
                println!(
                    "{} chunks ingested ({} evicted) at {}",
                    report.entries,
                    report.evicted,
                    Utc::now().to_rfc3339()
                );
            }
        }
        Command::Ask { prompt } => {
            let text = agent.answer(&prompt).await?;
            println!("{text}");
        }
        Command::SetKey { key } => {
            agent.credentials().set(key).await?;
            println!("api key saved");
        }
        Command::ShowKey => match agent.credentials().get().await? {
            Some(key) => println!("{}", mask_secret(&key)),
            None => println!("no api key configured"),
        },
        Command::Stats => {
            let stats = agent.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Reset => {
            agent.store().reset().await?;
            println!("store cleared");
        }
        Command::Serve => serve(&agent).await?,
    }

    Ok(())
}

fn build_agent(cli: &Cli, config: &AgentConfig) -> anyhow::Result<Agent> {
    let credentials = EnvOverrideCredentials::new(
        cli.api_key.clone(),
        FileCredentials::new(cli.data_dir.join("api_key")),
    );
    let store = VectorStore::new(
        FileBackend::new(cli.data_dir.join("store.json")),
        config.store.capacity,
    )?;

    Ok(ContextAgent::new(
        config.embedder()?,
        config.chat_client()?,
        credentials,
        store,
        config.agent_options()?,
    ))
}

fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

async fn ingest_folder(agent: &Agent, folder: &Path) -> anyhow::Result<()> {
    let files = discover_text_files(folder);
    if files.is_empty() {
        anyhow::bail!("no .txt or .md files found in {}", folder.display());
    }

    let mut total = 0usize;
    let mut skipped = 0usize;
    for path in files {
        let source = path.display().to_string();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %source, reason = %error, "skipped file");
                skipped += 1;
                continue;
            }
        };

        match agent.ingest(&content, Some(&source)).await {
            Ok(report) => total += report.entries,
            Err(AgentError::NoCredential) => return Err(AgentError::NoCredential.into()),
            Err(error) => {
                warn!(path = %source, reason = %error, "skipped file");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("skipped_files={} for folder={}", skipped, folder.display());
    }
    println!(
        "{} chunks ingested from {} at {}",
        total,
        folder.display(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}

async fn serve(agent: &Agent) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = agent.handle_json(&line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
