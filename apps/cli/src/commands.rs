//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, warn};

use rivalscope_core::{
    FactTable, ProgressReporter, REPORT_PLACEHOLDER, ResearchState, StageSettings, export_run,
    reconciled_workflow, standard_workflow,
};
use rivalscope_docqa::{VectorIndex, answer, chunk_documents, corpus_hash, load_documents};
use rivalscope_providers::{
    Embedder, GeminiEmbedder, GeminiGenerator, SearchProvider, TavilySearch, TextGenerator,
};
use rivalscope_shared::{AppConfig, init_config, load_config, require_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rivalscope: competitive analysis reports from web research.
#[derive(Parser)]
#[command(
    name = "rivalscope",
    version,
    about = "Research a company on the web, write a competitive-analysis report, and question past reports.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a subject and write its competitive-analysis report.
    Analyze {
        /// Company or organisation to analyse.
        subject: String,

        /// Directory for the report and CSV (defaults to output.dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Static fact table (JSON) enabling the reconciled workflow.
        #[arg(long)]
        facts: Option<PathBuf>,

        /// Print the report without writing any files.
        #[arg(long)]
        no_save: bool,
    },

    /// Embed local report files into the vector index.
    Index {
        /// Directory holding .md/.csv documents (defaults to docqa.docs_dir).
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Index directory (defaults to docqa.index_dir).
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Ask questions about the indexed documents.
    Ask {
        /// Directory holding .md/.csv documents (defaults to docqa.docs_dir).
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Index directory (defaults to docqa.index_dir).
        #[arg(long)]
        store: Option<PathBuf>,

        /// Answer this question and exit instead of starting a session.
        #[arg(short, long)]
        question: Option<String>,

        /// Chunks retrieved per question (defaults to docqa.top_k).
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rivalscope=info",
        1 => "rivalscope=debug",
        _ => "rivalscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            subject,
            out,
            facts,
            no_save,
        } => cmd_analyze(&subject, out, facts, no_save).await,
        Command::Index { docs, store } => cmd_index(docs, store).await,
        Command::Ask {
            docs,
            store,
            question,
            top_k,
        } => cmd_ask(docs, store, question, top_k).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    subject: &str,
    out: Option<PathBuf>,
    facts: Option<PathBuf>,
    no_save: bool,
) -> Result<()> {
    let config = load_config()?;

    // Both keys are checked before any stage runs
    let gemini_key = require_api_key(&config.gemini.api_key_env)?;
    let tavily_key = require_api_key(&config.tavily.api_key_env)?;

    let generator: Arc<dyn TextGenerator> =
        Arc::new(GeminiGenerator::new(&config.gemini, gemini_key)?);
    let search: Arc<dyn SearchProvider> = Arc::new(TavilySearch::new(&config.tavily, tavily_key)?);
    let settings = StageSettings::from(&config);

    let workflow = match facts.or_else(|| config.research.facts_file.clone()) {
        Some(path) => {
            let table = FactTable::load(&path)?;
            reconciled_workflow(generator, search, Arc::new(table), &settings)?
        }
        None => standard_workflow(generator, search, &settings)?,
    };

    info!(subject, stages = ?workflow.stage_names(), "starting competitive analysis");
    println!("Analysing '{subject}'. Collecting and synthesising information...");

    let reporter = CliProgress::new();
    let state = match workflow.run(subject, &reporter).await {
        Ok(state) => state,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let report = state
        .final_report
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(REPORT_PLACEHOLDER);

    println!();
    println!("--- FINAL REPORT ---");
    println!("{report}");

    if no_save {
        return Ok(());
    }

    let out_dir = out.unwrap_or_else(|| config.output.dir.clone());
    let timestamp = chrono::Local::now().naive_local();
    let outcome = export_run(&out_dir, subject, timestamp, report, state.extracted_records())?;

    println!();
    match outcome.report {
        Ok(path) => println!("  Report saved:  {}", display_absolute(&path)),
        Err(e) => eprintln!("  Could not save report: {e}"),
    }
    match outcome.csv {
        Some(Ok(path)) => println!("  CSV saved:     {}", display_absolute(&path)),
        Some(Err(e)) => eprintln!("  Could not save CSV: {e}"),
        None => println!("  No structured data to save."),
    }
    println!();

    Ok(())
}

fn display_absolute(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

// ---------------------------------------------------------------------------
// index / ask
// ---------------------------------------------------------------------------

async fn cmd_index(docs: Option<PathBuf>, store: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let key = require_api_key(&config.gemini.api_key_env)?;
    let embedder = GeminiEmbedder::new(&config.gemini, key)?;

    let docs_dir = docs.unwrap_or_else(|| config.docqa.docs_dir.clone());
    let store_dir = store.unwrap_or_else(|| config.docqa.index_dir.clone());

    build_index(&config, &docs_dir, &store_dir, &embedder).await?;
    Ok(())
}

async fn cmd_ask(
    docs: Option<PathBuf>,
    store: Option<PathBuf>,
    question: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let key = require_api_key(&config.gemini.api_key_env)?;
    let embedder = GeminiEmbedder::new(&config.gemini, key.clone())?;
    let generator = GeminiGenerator::new(&config.gemini, key)?;

    let docs_dir = docs.unwrap_or_else(|| config.docqa.docs_dir.clone());
    let store_dir = store.unwrap_or_else(|| config.docqa.index_dir.clone());
    let k = top_k.unwrap_or(config.docqa.top_k);
    if k == 0 {
        return Err(eyre!("--top-k must be at least 1"));
    }

    let index = if VectorIndex::exists(&store_dir) {
        let index = VectorIndex::load(&store_dir, embedder.model())?;
        warn_if_stale(&config, &docs_dir, &index);
        index
    } else {
        println!("No index found at {}, building it first.", store_dir.display());
        build_index(&config, &docs_dir, &store_dir, &embedder).await?
    };

    if let Some(question) = question {
        let reply = answer(&question, &index, &embedder, &generator, k).await?;
        print_answer(&reply.text, &reply.sources);
        return Ok(());
    }

    println!();
    println!("--- Document Q&A ---");
    println!("Ask about your competitive analyses. Type 'exit' or 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(question) = next_question(&mut lines).await? {
        match answer(&question, &index, &embedder, &generator, k).await {
            Ok(reply) => print_answer(&reply.text, &reply.sources),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

/// Prompt until a non-blank line arrives. `None` on `exit`, `quit`, or EOF.
async fn next_question<R>(lines: &mut Lines<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        print!("\nYour question: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            return Ok(None);
        }
        if !question.is_empty() {
            return Ok(Some(question.to_string()));
        }
    }
}

/// Load, chunk, embed, and persist the documents in `docs_dir`.
async fn build_index(
    config: &AppConfig,
    docs_dir: &Path,
    store_dir: &Path,
    embedder: &dyn Embedder,
) -> Result<VectorIndex> {
    let docs = load_documents(docs_dir, &config.docqa.extensions)?;
    if docs.is_empty() {
        return Err(eyre!(
            "no documents with extensions {:?} found in {}",
            config.docqa.extensions,
            docs_dir.display()
        ));
    }
    println!("Documents loaded: {}", docs.len());

    let chunks = chunk_documents(&docs, config.docqa.chunk_size, config.docqa.chunk_overlap)?;
    println!("Text chunks created: {}", chunks.len());

    let spinner = spinner("Embedding chunks...");
    let index = VectorIndex::build(chunks, embedder).await;
    spinner.finish_and_clear();
    let index = index?;

    let path = index.save(store_dir)?;
    println!("Vector index saved to {}", path.display());
    Ok(index)
}

/// Warn when the documents on disk no longer match what was indexed.
fn warn_if_stale(config: &AppConfig, docs_dir: &Path, index: &VectorIndex) {
    let current = load_documents(docs_dir, &config.docqa.extensions).and_then(|docs| {
        chunk_documents(&docs, config.docqa.chunk_size, config.docqa.chunk_overlap)
    });
    match current {
        Ok(chunks) if corpus_hash(&chunks) != index.meta().corpus_hash => {
            warn!("documents changed since the index was built; run `rivalscope index` to refresh");
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "could not check index freshness"),
    }
}

fn print_answer(text: &str, sources: &[String]) {
    println!("\nAnswer:");
    println!("{text}");
    println!("\nSources used:");
    for source in sources {
        println!("- {source}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

/// Narrates workflow stages on an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Starting..."),
        }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, name: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{index}/{total}] {}", stage_label(name)));
    }

    fn detail(&self, message: &str) {
        self.spinner.println(format!("  {message}"));
    }

    fn stage_finished(&self, name: &str) {
        self.spinner
            .println(format!("✓ {}", stage_label(name)));
    }

    fn done(&self, state: &ResearchState) {
        self.spinner.finish_and_clear();
        println!(
            "Research complete: {} web findings, {} structured records.",
            state.web_findings().len(),
            state.extracted_records().len()
        );
    }
}

fn stage_label(name: &str) -> &str {
    match name {
        "planning" => "Planning research",
        "research" => "Running web searches",
        "lookup" => "Looking up structured facts",
        "reconciliation" => "Reconciling sources",
        "report" => "Writing report and extracting data",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn questions_skip_blank_lines_and_stop_on_quit() {
        let input: &[u8] = b"\n   \n  Who are Acme's clients?  \nQUIT\nnever read\n";
        let mut lines = BufReader::new(input).lines();

        assert_eq!(
            next_question(&mut lines).await.unwrap().as_deref(),
            Some("Who are Acme's clients?")
        );
        assert_eq!(next_question(&mut lines).await.unwrap(), None);
    }

    #[tokio::test]
    async fn questions_end_at_eof() {
        let input: &[u8] = b"first\n";
        let mut lines = BufReader::new(input).lines();

        assert_eq!(next_question(&mut lines).await.unwrap().as_deref(), Some("first"));
        assert_eq!(next_question(&mut lines).await.unwrap(), None);
    }

    #[test]
    fn analyze_parses_flags() {
        let cli = Cli::try_parse_from([
            "rivalscope",
            "-v",
            "analyze",
            "Acme Corp",
            "--facts",
            "facts.json",
            "--no-save",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Analyze {
                subject,
                out,
                facts,
                no_save,
            } => {
                assert_eq!(subject, "Acme Corp");
                assert!(out.is_none());
                assert_eq!(facts, Some(PathBuf::from("facts.json")));
                assert!(no_save);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn ask_parses_question_and_top_k() {
        let cli = Cli::try_parse_from([
            "rivalscope",
            "ask",
            "--question",
            "Who are Acme's clients?",
            "-k",
            "5",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Command::Ask {
                question, top_k, ..
            } => {
                assert_eq!(question.as_deref(), Some("Who are Acme's clients?"));
                assert_eq!(top_k, Some(5));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn analyze_requires_subject() {
        assert!(Cli::try_parse_from(["rivalscope", "analyze"]).is_err());
    }

    #[test]
    fn unknown_stage_label_passes_through() {
        assert_eq!(stage_label("report"), "Writing report and extracting data");
        assert_eq!(stage_label("custom"), "custom");
    }
}
