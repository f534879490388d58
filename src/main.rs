use clap::{Parser, Subcommand};
use std::{
    error::Error,
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vocab_drill::{
    collaborators::{
        llm::LlmClient, ArtifactRenderer, PaperFormat, PdfPaperRenderer, QuestionGenerator,
        TextPaperRenderer,
    },
    config::{Config, ConfigStore, FileConfigStore},
    ingest::Ingestor,
    orchestrator::{reset_progress, BatchReport, TestOrchestrator},
    selection::SelectionEngine,
    Database,
};

/// adaptive vocabulary drills with priority-weighted word selection
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Keeps a vocabulary inventory with per-word practice priorities and generates fill-in-the-blank tests that favour the words that still need practice."
)]
pub struct Cli {
    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// database file, overrides the configured path
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// list every stored word
    Words,
    /// show one word's record as JSON
    Word { word: String },
    /// enrich and store new words
    Ingest {
        /// store at raised priority
        #[clap(long)]
        critical: bool,
        /// read words from a file, one per line
        #[clap(long)]
        file: Option<PathBuf>,
        words: Vec<String>,
    },
    /// generate tests for a category until every word is drilled out
    Generate {
        #[clap(short = 'c', long)]
        category: u32,
        /// words per test, overrides the configured value
        #[clap(short = 'w', long)]
        words: Option<usize>,
        /// seed the selection for reproducible draws
        #[clap(long)]
        seed: Option<u64>,
        /// paper format, overrides the configured value
        #[clap(short = 'f', long, value_enum)]
        format: Option<PaperFormat>,
    },
    /// list the recorded runs of a category
    Runs {
        #[clap(short = 'c', long)]
        category: u32,
    },
    /// last sequence and run count per category
    Summary,
    /// restore base priorities and delete recorded runs
    Reset {
        /// only delete this category's runs
        #[clap(short = 'c', long)]
        category: Option<u32>,
    },
    /// write the inventory to a CSV file
    Export { path: PathBuf },
    /// print the effective configuration
    Config {
        /// write it to the config file
        #[clap(long)]
        save: bool,
    },
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn database_path(&self, cfg: &Config) -> PathBuf {
        self.db.clone().unwrap_or_else(|| cfg.database_path())
    }
}

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Words from the positional arguments followed by the non-empty lines of `file`
fn collect_words(words: &[String], file: Option<&PathBuf>) -> Result<Vec<String>, Box<dyn Error>> {
    let mut all = words.to_vec();
    if let Some(path) = file {
        let text = fs::read_to_string(path)?;
        all.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }
    Ok(all)
}

fn run_batch<G: QuestionGenerator, R: ArtifactRenderer>(
    db: &mut Database,
    generator: G,
    renderer: R,
    engine: SelectionEngine,
    seed: Option<u64>,
    category: u32,
) -> Result<BatchReport, Box<dyn Error>> {
    let mut orchestrator = TestOrchestrator::new(db, generator, renderer, engine);
    if let Some(seed) = seed {
        orchestrator = orchestrator.with_seed(seed);
    }
    Ok(orchestrator.generate_tests(category)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.config_store();
    let cfg = store.load();
    init_tracing(&cfg);

    if let Command::Config { save } = cli.command {
        if save {
            store.save(&cfg)?;
            info!(path = %store.path().display(), "config saved");
        }
        return print_json(&cfg);
    }

    let mut db = Database::open(cli.database_path(&cfg))?;

    match cli.command {
        Command::Words => {
            for word in db.vocab().get_all_identifiers()? {
                println!("{word}");
            }
        }
        Command::Word { word } => match db.vocab().get(&word)? {
            Some(entry) => print_json(&entry)?,
            None => println!("{{}}"),
        },
        Command::Ingest {
            critical,
            file,
            words,
        } => {
            let words = collect_words(&words, file.as_ref())?;
            if words.is_empty() {
                warn!("no words given");
                return Ok(());
            }
            let client = LlmClient::from_config(&cfg.llm)?;
            let report = Ingestor::new(&db, client).ingest_wordlist(&words, critical);
            print_json(&report)?;
        }
        Command::Generate {
            category,
            words,
            seed,
            format,
        } => {
            let engine = SelectionEngine::new(words.unwrap_or(cfg.words_per_test));
            let client = LlmClient::from_config(&cfg.llm)?;
            let out = cfg.output_dir();
            let report = match format.unwrap_or(cfg.paper_format) {
                PaperFormat::Text => {
                    run_batch(&mut db, client, TextPaperRenderer::new(out), engine, seed, category)?
                }
                PaperFormat::Pdf => {
                    run_batch(&mut db, client, PdfPaperRenderer::new(out), engine, seed, category)?
                }
            };
            print_json(&report)?;
        }
        Command::Runs { category } => print_json(&db.ledger().list_runs(category)?)?,
        Command::Summary => print_json(&db.ledger().all_summaries()?)?,
        Command::Reset { category } => print_json(&reset_progress(&db, category)?)?,
        Command::Export { path } => {
            let rows = db.vocab().export(BufWriter::new(File::create(&path)?))?;
            info!(rows, path = %path.display(), "inventory exported");
        }
        Command::Config { .. } => {}
    }

    Ok(())
}
