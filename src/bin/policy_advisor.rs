//! Policy Advisor CLI
//!
//! Ingest policy documents and ask questions about them. Every command prints
//! one JSON document on stdout; logs go to stderr.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use policy_advisor_lib::{
    deduplicate_with_report, AdvisorConfig, AdvisorStatus, Answer, AnswerSource, AskOutcome,
    DedupReport, IngestReport, OllamaClient, PolicyAdvisor, PolicyTopic, TokenSavings,
};

const DEFAULT_LOG_FILTER: &str = "policy_advisor=info,policy_advisor_lib=info";

#[derive(Parser)]
#[command(name = "policy-advisor")]
#[command(about = "Policy Advisor - Ask questions about your HR, data-security and H&S policies", long_about = None)]
struct Cli {
    /// Config file (default: <data dir>/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the index and cached documents
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the policy domains
    Topics,
    /// Add a PDF or text document to the knowledge base
    Ingest {
        /// Path to the document
        file: PathBuf,
        /// Policy domain the document belongs to
        #[arg(short, long, default_value = "hr-guidelines")]
        topic: PolicyTopic,
    },
    /// Ask a question about the ingested documents
    Ask {
        question: String,
        #[arg(short, long, default_value = "hr-guidelines")]
        topic: PolicyTopic,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Similarity above which a sentence counts as a duplicate
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Remove near-duplicate sentences from text
    Dedup {
        /// Text to clean (or - to read from stdin)
        text: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Show index status
    Status,
}

// ============ Output Types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicOutput {
    slug: &'static str,
    label: &'static str,
    heading: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestOutput {
    topic: PolicyTopic,
    #[serde(flatten)]
    report: IngestReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AskOutput {
    topic: PolicyTopic,
    heading: &'static str,
    question: String,
    answer: String,
    sources: Vec<AnswerSource>,
    dedup: DedupReport,
    tokens: TokenSavings,
}

impl AskOutput {
    fn new(topic: PolicyTopic, question: &str, outcome: AskOutcome) -> Self {
        match outcome {
            AskOutcome::Answered(Answer { question, answer, sources, dedup, tokens }) => Self {
                topic,
                heading: topic.heading(),
                question,
                answer,
                sources,
                dedup,
                tokens,
            },
            AskOutcome::NoRelevantInformation => Self {
                topic,
                heading: topic.heading(),
                question: question.to_string(),
                answer: "No relevant information found in documents.".to_string(),
                sources: Vec::new(),
                dedup: DedupReport::default(),
                tokens: TokenSavings::default(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DedupOutput {
    text: String,
    #[serde(flatten)]
    report: DedupReport,
    tokens: TokenSavings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OllamaStatus {
    url: String,
    reachable: bool,
    models: Vec<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    #[serde(flatten)]
    advisor: AdvisorStatus,
    ollama: OllamaStatus,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(json) => println!("{}", json),
        Err(e) => {
            let error = ErrorOutput { error: format!("{:#}", e) };
            match serde_json::to_string(&error) {
                Ok(json) => println!("{}", json),
                Err(_) => println!(r#"{{"error": "unknown error"}}"#),
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    match cli.command {
        Commands::Topics => handle_topics(),
        Commands::Dedup { text, threshold } => {
            let config = AdvisorConfig::load(cli.config.as_deref(), cli.data_dir)?;
            handle_dedup(text, threshold.unwrap_or(config.dedup_threshold))
        }
        Commands::Ingest { file, topic } => {
            let config = AdvisorConfig::load(cli.config.as_deref(), cli.data_dir)?;
            handle_ingest(config, file, topic).await
        }
        Commands::Ask { question, topic, top_k, threshold } => {
            let mut config = AdvisorConfig::load(cli.config.as_deref(), cli.data_dir)?;
            if let Some(k) = top_k {
                config.top_k = k;
            }
            if let Some(t) = threshold {
                config.dedup_threshold = t;
            }
            config.validate()?;
            handle_ask(config, question, topic).await
        }
        Commands::Status => {
            let config = AdvisorConfig::load(cli.config.as_deref(), cli.data_dir)?;
            handle_status(config).await
        }
    }
}

// ============ Handlers ============

fn handle_topics() -> anyhow::Result<String> {
    let topics: Vec<TopicOutput> = PolicyTopic::ALL.iter().map(|t| TopicOutput {
        slug: t.slug(),
        label: t.label(),
        heading: t.heading(),
        description: t.description(),
    }).collect();

    Ok(serde_json::to_string(&topics)?)
}

fn handle_dedup(text: String, threshold: f64) -> anyhow::Result<String> {
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("threshold must be within [0, 1], got {}", threshold);
    }

    let input = if text == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("reading stdin")?;
        buffer
    } else {
        text
    };

    let (cleaned, report) = deduplicate_with_report(&input, threshold);
    let output = DedupOutput {
        tokens: TokenSavings::measure(&input, &cleaned),
        text: cleaned,
        report,
    };

    Ok(serde_json::to_string(&output)?)
}

async fn handle_ingest(config: AdvisorConfig, file: PathBuf, topic: PolicyTopic) -> anyhow::Result<String> {
    let mut advisor = PolicyAdvisor::connect(config).await?;
    let report = advisor.ingest(&file).await
        .with_context(|| format!("ingesting {}", file.display()))?;
    advisor.close()?;

    Ok(serde_json::to_string(&IngestOutput { topic, report })?)
}

async fn handle_ask(config: AdvisorConfig, question: String, topic: PolicyTopic) -> anyhow::Result<String> {
    let advisor = PolicyAdvisor::connect(config).await?;
    if let Some(reason) = advisor.load_error() {
        tracing::warn!(error = %reason, "Existing policy index could not be loaded");
    }

    let outcome = advisor.ask(&question).await?;
    advisor.close()?;

    Ok(serde_json::to_string(&AskOutput::new(topic, &question, outcome))?)
}

async fn handle_status(config: AdvisorConfig) -> anyhow::Result<String> {
    let client = OllamaClient::new(&config.ollama_url, config.request_timeout());
    let ollama = match client.heartbeat().await {
        Ok(models) => OllamaStatus {
            url: client.base_url().to_string(),
            reachable: true,
            models,
            error: None,
        },
        Err(e) => OllamaStatus {
            url: client.base_url().to_string(),
            reachable: false,
            models: Vec::new(),
            error: Some(e.to_string()),
        },
    };

    let advisor = PolicyAdvisor::connect(config).await?;
    let status = StatusOutput {
        advisor: advisor.status()?,
        ollama,
    };
    advisor.close()?;

    Ok(serde_json::to_string(&status)?)
}
