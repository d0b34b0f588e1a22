use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lexcheck_core::{
    CandidateKey, Dataset, Judgement, KeyScheme, LegacyKeyIndex, Markup, Patch, RecordPatch,
    ReviewFilter, ReviewSummary, highlight_with,
};
use lexcheck_store::{AnnotationStore, ReviewerId, StoreError, migrate_directory};
use lexcheck_sync::ReviewClient;
use tracing_subscriber::EnvFilter;

mod display;

#[derive(Parser)]
#[command(
    name = "lexcheck",
    version,
    about = "Review extracted law names and abbreviations against their source text"
)]
struct Cli {
    /// Reference dataset (JSON array of entries).
    #[arg(long, env = "LEXCHECK_DATASET", default_value = "json/choise_rand.json", global = true)]
    dataset: PathBuf,

    /// Directory holding one `<reviewer>.json` store per reviewer.
    #[arg(long, env = "LEXCHECK_ANSWER_DIR", default_value = "json/answer", global = true)]
    answer_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite stores from legacy per-file keys to current dataset-index keys.
    Migrate {
        /// Migrate only this reviewer's store (default: every store).
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// Print review cards for a reviewer.
    List {
        #[arg(long)]
        reviewer: String,
        #[arg(long, default_value_t = ReviewFilter::All)]
        filter: ReviewFilter,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one stored record.
    Show {
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        key: String,
    },
    /// Record an OK/NG verdict.
    Judge {
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        key: String,
        verdict: Verdict,
        /// Corrected formal name (NG only).
        #[arg(long)]
        formal: Option<String>,
        /// Corrected abbreviation (NG only).
        #[arg(long)]
        abbr: Option<String>,
    },
    /// Set the free-text memo on a candidate.
    Memo {
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        key: String,
        text: String,
    },
    /// Highlight a formal name and abbreviation in arbitrary text.
    Highlight {
        text: String,
        formal: String,
        abbr: String,
        /// Emit HTML markup instead of terminal colours.
        #[arg(long)]
        html: bool,
    },
    /// Count items per review filter.
    Summary {
        #[arg(long)]
        reviewer: String,
    },
    /// Merge a reviewer's answers from a running review server into the local store.
    Pull {
        #[arg(long)]
        reviewer: String,
        #[arg(long, env = "LEXCHECK_SERVER", default_value = "http://localhost:3000")]
        server: String,
        /// Key scheme the server's answers are written under.
        #[arg(long, value_enum, default_value_t = RemoteKeys::Legacy)]
        remote_keys: RemoteKeys,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Verdict {
    Ok,
    Ng,
}

#[derive(Clone, Copy, ValueEnum)]
enum RemoteKeys {
    Legacy,
    Current,
}

impl From<RemoteKeys> for KeyScheme {
    fn from(keys: RemoteKeys) -> Self {
        match keys {
            RemoteKeys::Legacy => KeyScheme::Legacy,
            RemoteKeys::Current => KeyScheme::Current,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::debug!("lexcheck v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = AnnotationStore::open(&cli.answer_dir);

    match cli.command {
        Command::Migrate { reviewer } => migrate(&cli.dataset, &store, reviewer.as_deref()),
        Command::List {
            reviewer,
            filter,
            limit,
        } => {
            let dataset = load_dataset(&cli.dataset)?;
            let annotations = store.load(&reviewer)?;
            let items = dataset.review_items();
            let selected = filter.apply(&items, &annotations);
            let markup = Markup::ansi();
            for item in selected.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{}",
                    display::render_card(item, annotations.get(&item.key), &markup)
                );
            }
            println!("{filter}: {} items", selected.len());
            Ok(())
        }
        Command::Show { reviewer, key } => {
            let key = CandidateKey::from(key);
            let record = store.get(&reviewer, &key)?;
            print!("{}", display::render_record(&key, &record));
            Ok(())
        }
        Command::Judge {
            reviewer,
            key,
            verdict,
            formal,
            abbr,
        } => {
            let patch = match verdict {
                Verdict::Ok => RecordPatch::ok(),
                Verdict::Ng => RecordPatch {
                    judgement: Some(Judgement::Ng),
                    correct_formal: formal,
                    correct_abbr: abbr,
                    memo: None,
                },
            };
            write_one(&cli.dataset, &store, &reviewer, key, patch)
        }
        Command::Memo {
            reviewer,
            key,
            text,
        } => write_one(&cli.dataset, &store, &reviewer, key, RecordPatch::memo(text)),
        Command::Highlight {
            text,
            formal,
            abbr,
            html,
        } => {
            let markup = if html { Markup::html() } else { Markup::ansi() };
            let h = highlight_with(&text, &formal, &abbr, &markup);
            println!("{}", h.marked_text);
            if !h.is_valid() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Summary { reviewer } => {
            let dataset = load_dataset(&cli.dataset)?;
            let annotations = store.load(&reviewer)?;
            let summary = ReviewSummary::tally(&dataset.review_items(), &annotations);
            print!("{}", display::render_summary(&reviewer, &summary));
            Ok(())
        }
        Command::Pull {
            reviewer,
            server,
            remote_keys,
        } => {
            let dataset = load_dataset(&cli.dataset)?;
            let index = LegacyKeyIndex::build(&dataset);
            let client = ReviewClient::new(server);
            let remote = client
                .fetch_answers(&reviewer)
                .await
                .context("fetching remote answers")?;
            let report = store.import(&reviewer, &remote, remote_keys.into(), &index)?;
            print!("{}", display::render_import(&report));
            Ok(())
        }
    }
}

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    Dataset::load(path).with_context(|| format!("loading dataset {}", path.display()))
}

fn migrate(
    dataset_path: &Path,
    store: &AnnotationStore,
    reviewer: Option<&str>,
) -> anyhow::Result<()> {
    match reviewer {
        Some(name) => {
            let reviewer = ReviewerId::parse(name)?;
            let dataset = load_dataset(dataset_path)?;
            let index = LegacyKeyIndex::build(&dataset);
            let report = store.migrate(&reviewer, &index)?;
            print!("{}", display::render_migration(&report));
        }
        None => {
            let report = migrate_directory(dataset_path, store.dir())?;
            print!("{}", display::render_batch(&report));
            if !report.failed.is_empty() {
                anyhow::bail!("{} stores failed to migrate", report.failed.len());
            }
        }
    }
    Ok(())
}

/// Apply a single-key patch after checking the key against the dataset.
fn write_one(
    dataset_path: &Path,
    store: &AnnotationStore,
    reviewer: &str,
    key: String,
    patch: RecordPatch,
) -> anyhow::Result<()> {
    let dataset = load_dataset(dataset_path)?;
    let key = CandidateKey::from(key);
    if dataset.resolve(&key).is_none() {
        return Err(StoreError::InvalidArgument(format!(
            "'{key}' is not a key in the dataset"
        ))
        .into());
    }

    let mut one = Patch::new();
    one.insert(key.clone(), patch);
    store.merge_write(reviewer, &one)?;

    let record = store.get(reviewer, &key)?;
    print!("{}", display::render_record(&key, &record));
    Ok(())
}
