//! Insight CLI: talk to the analysis service about a CSV dataset.
//!
//! Usage:
//!   insight chat --file data.csv [--goal "..."]
//!   insight submit --file data.csv --goal "..."
//!   insight show [--save-visualization]
//!   insight classify <json | path | ->
//!   insight download [path]
//!   insight samples

use clap::{Parser, Subcommand};
use insight::continuity::{ContinuityStore, OpenStore, SqliteStore};
use insight::gateway::{asset_name, HttpGateway};
use insight::intake::{IntakeFile, SAMPLE_GOALS};
use insight::result::{classify_text, Renderer, VisualPresentation};
use insight::workflow::{
    EntryId, StageStatus, Workflow, WorkflowError, WorkflowObserver, WorkflowState,
};
use insight::{submit_direct, AnalysisContext, Config};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "insight",
    version,
    about = "Conversational dataset analysis client"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Path to the YAML config file
    #[arg(long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,
    /// Analysis service base URL
    #[arg(long, global = true, env = "INSIGHT_BACKEND_URL")]
    backend: Option<String>,
    /// Path to the continuity database
    #[arg(long, global = true, env = "INSIGHT_STORE")]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a dataset and describe what you want in conversation
    Chat {
        /// CSV dataset to analyze
        #[arg(long)]
        file: PathBuf,
        /// Goal to send; read goals from stdin when omitted
        #[arg(long)]
        goal: Option<String>,
    },
    /// Send dataset and goal in a single request
    Submit {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        goal: String,
    },
    /// Show the last saved analysis result
    Show {
        /// Download the result's visualization image into the current directory
        #[arg(long)]
        save_visualization: bool,
    },
    /// Classify and render a result envelope without contacting the service
    Classify {
        /// Envelope JSON, a file containing it, or `-` for stdin
        input: String,
    },
    /// Download a trained model artifact
    Download {
        /// Server-side model path; defaults to the last saved result's
        path: Option<String>,
    },
    /// List example goals
    Samples,
}

/// Prints new transcript entries and stage starts as the workflow advances.
#[derive(Default)]
struct ConsoleObserver {
    seen: Mutex<Option<EntryId>>,
    running: Mutex<Option<u8>>,
}

impl ConsoleObserver {
    /// Lines not yet shown for `state`, marking them as shown.
    fn fresh_lines(&self, state: &WorkflowState) -> Vec<String> {
        let mut lines = Vec::new();
        if let Ok(mut seen) = self.seen.lock() {
            let fresh = state.transcript().since(*seen);
            lines.extend(fresh.iter().map(|entry| entry.to_string()));
            if let Some(last) = fresh.last() {
                *seen = Some(last.id);
            }
        }
        let running = state
            .stages()
            .iter()
            .find(|s| s.status() == StageStatus::Running);
        if let (Ok(mut shown), Some(stage)) = (self.running.lock(), running) {
            if *shown != Some(stage.id()) {
                let total = state.stages().len();
                lines.push(format!("  ... {} ({}/{})", stage.label(), stage.id(), total));
                *shown = Some(stage.id());
            }
        }
        lines
    }
}

impl WorkflowObserver for ConsoleObserver {
    fn on_transition(&self, state: &WorkflowState) {
        for line in self.fresh_lines(state) {
            println!("{}", line);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(backend) = &cli.backend {
        config.backend_url = backend.clone();
    }
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    Ok(config)
}

fn open_gateway(config: &Config) -> Result<HttpGateway, String> {
    HttpGateway::new(&config.backend_url, config.request_timeout())
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}

fn open_store(config: &Config) -> Result<SqliteStore, String> {
    let path = config.resolved_store_path().map_err(|e| e.to_string())?;
    SqliteStore::open(&path).map_err(|e| format!("Failed to open continuity store: {}", e))
}

/// The store is optional for commands that only write to it.
fn open_store_lenient(config: &Config) -> Option<Arc<dyn ContinuityStore>> {
    match open_store(config) {
        Ok(store) => {
            let store: Arc<dyn ContinuityStore> = Arc::new(store);
            Some(store)
        }
        Err(e) => {
            warn!(error = %e, "continuing without continuity store");
            None
        }
    }
}

async fn cmd_chat(config: &Config, file: &Path, goal: Option<String>) -> i32 {
    let file = match IntakeFile::from_path(file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let gateway = match open_gateway(config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut workflow = Workflow::new(Arc::new(gateway))
        .with_timing(config.timing())
        .with_observer(Arc::new(ConsoleObserver::default()));
    if let Some(store) = open_store_lenient(config) {
        workflow = workflow.with_store(store);
    }
    println!("Uploaded {} ({})", file.name, file.display_size());
    if let Err(e) = workflow.accept_file(file) {
        eprintln!("Error: {}", e);
        return 1;
    }

    let renderer = Renderer::new(config.backend_url.as_str());
    if let Some(goal) = goal {
        return match workflow.submit(goal).await {
            Ok(context) => {
                let (view, code) = chat_outcome(&renderer, &context);
                if let Some(view) = view {
                    print!("{}", view);
                }
                code
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut code = 1;
    loop {
        eprint!("> ");
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        match workflow.submit(line).await {
            Ok(context) => {
                let (view, status) = chat_outcome(&renderer, &context);
                code = status;
                match view {
                    Some(view) => {
                        print!("{}", view);
                        break;
                    }
                    None => eprintln!("{}", RETRY_HINT),
                }
            }
            Err(WorkflowError::Validation(e)) => eprintln!("Error: {}", e),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    code
}

async fn cmd_submit(config: &Config, file: &Path, goal: &str) -> i32 {
    let file = match IntakeFile::from_path(file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let gateway = match open_gateway(config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match submit_direct(&gateway, Some(&file), goal).await {
        Ok(context) => {
            if let Some(store) = open_store_lenient(config) {
                context.persist(store.as_ref());
            }
            show_context(&Renderer::new(config.backend_url.as_str()), &context)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_show(config: &Config, save_visualization: bool) -> i32 {
    let store = match open_store(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let Some(context) = AnalysisContext::resolve(None, Some(&store as &dyn ContinuityStore)) else {
        println!("No analysis results found. Run `insight chat` to start an analysis.");
        return 1;
    };
    let renderer = Renderer::new(config.backend_url.as_str());
    let code = show_context(&renderer, &context);
    if !save_visualization {
        return code;
    }

    let url = match context
        .envelope()
        .map(|e| renderer.render(e))
        .and_then(|view| view.visualization)
    {
        Some(VisualPresentation::Image { url }) => url,
        _ => {
            println!("No visualization image in this result");
            return code;
        }
    };
    let gateway = match open_gateway(config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match gateway.fetch_visualization(&url).await {
        Ok(bytes) => save_bytes(asset_name(&url), &bytes),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_classify(config: &Config, input: &str) -> i32 {
    let text = if input == "-" {
        let mut buf = String::new();
        if let Err(e) = tokio::io::stdin().read_to_string(&mut buf).await {
            eprintln!("Error: {}", e);
            return 1;
        }
        buf
    } else if Path::new(input).is_file() {
        match tokio::fs::read_to_string(input).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error: cannot read '{}': {}", input, e);
                return 1;
            }
        }
    } else {
        input.to_string()
    };

    let envelope = classify_text(&text);
    println!("Kind: {}", envelope.kind());
    println!();
    print!("{}", Renderer::new(config.backend_url.as_str()).render(&envelope));
    0
}

async fn cmd_download(config: &Config, path: Option<String>) -> i32 {
    let path = match path {
        Some(p) => p,
        None => {
            let saved = open_store(config)
                .ok()
                .and_then(|store| AnalysisContext::rehydrate(&store));
            match saved
                .as_ref()
                .and_then(|c| c.envelope())
                .and_then(|e| e.artifact_path())
            {
                Some(p) => p.to_string(),
                None => {
                    println!("No model available for download");
                    return 1;
                }
            }
        }
    };
    let gateway = match open_gateway(config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match gateway.download_artifact(&path).await {
        Ok(bytes) => save_bytes(asset_name(&path), &bytes),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_samples() -> i32 {
    for (i, goal) in SAMPLE_GOALS.iter().enumerate() {
        println!("{}. {}", i + 1, goal);
    }
    0
}

const RETRY_HINT: &str = "Enter another goal to retry, or press Ctrl-D to quit.";

/// Result view for a finished chat cycle.
///
/// A failure yields no view: the transcript already carries the failure line,
/// and the detailed error stays in the saved context for `show`.
fn chat_outcome(renderer: &Renderer, context: &AnalysisContext) -> (Option<String>, i32) {
    if context.is_success() {
        (Some(format!("\n{}", renderer.render_context(context))), 0)
    } else {
        (None, 1)
    }
}

fn show_context(renderer: &Renderer, context: &AnalysisContext) -> i32 {
    println!();
    print!("{}", renderer.render_context(context));
    if context.is_success() {
        0
    } else {
        1
    }
}

fn save_bytes(name: &str, bytes: &[u8]) -> i32 {
    match std::fs::write(name, bytes) {
        Ok(()) => {
            println!("Saved {} ({} bytes)", name, bytes.len());
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write '{}': {}", name, e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Chat { file, goal } => cmd_chat(&config, &file, goal).await,
        Commands::Submit { file, goal } => cmd_submit(&config, &file, &goal).await,
        Commands::Show { save_visualization } => cmd_show(&config, save_visualization).await,
        Commands::Classify { input } => cmd_classify(&config, &input).await,
        Commands::Download { path } => cmd_download(&config, path).await,
        Commands::Samples => cmd_samples(),
    };
    std::process::exit(code);
}
