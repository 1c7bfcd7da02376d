use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use bunko_application::{Library, ReadOutcome, ResolveError, Sources, placeholder_document};
use bunko_core::{CatalogRecord, ResolutionOutcome, SearchField, Settings, StructuredDocument};
use bunko_engine::render;
use bunko_remote::HttpSources;
use bunko_storage::Storage;
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BUNKO_LOG";

#[derive(Parser, Debug)]
#[command(name = "bunko")]
#[command(version, about = "Find, fetch and read texts from the Aozora Bunko archive")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Per-request timeout in seconds, for this run only
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Numeric-proximity radius, for this run only
    #[arg(long, global = true, value_name = "N")]
    window: Option<u32>,

    /// Database file (defaults to the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the catalog by title and/or author
    Search {
        query: String,
        #[arg(long, default_value = "all")]
        field: SearchField,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one catalog record
    Show { work_id: String },
    /// Resolve, decode and print a work
    Read {
        work_id: String,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Skip the local document cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Resolve a (collection, file) pair and report which resource answered
    Fetch {
        collection_id: String,
        nominal_file_id: String,
    },
    /// List the candidates that would be tried for a pair
    Candidates {
        collection_id: String,
        nominal_file_id: String,
    },
    /// Find a resource in a collection by the title in its opening lines
    Locate { collection_id: String, title: String },
    /// Print settings, or update them with --set key=value
    Config {
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Drop every cached document
        #[arg(long)]
        clear_cache: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Html,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    tracing::debug!(db = %db_path.display(), "opening storage");
    let storage = Storage::open(&db_path)?;
    let mut settings = storage.load_settings()?;

    if let Command::Config { set, clear_cache } = &cli.command {
        return configure(&storage, &mut settings, set, *clear_cache);
    }

    if let Some(timeout) = cli.timeout {
        settings.request_timeout_secs = timeout;
    }
    if let Some(window) = cli.window {
        settings.proximity_window = window;
    }
    settings.normalize();

    let use_cache = settings.cache_documents
        && !matches!(cli.command, Command::Read { no_cache: true, .. });
    let http = Arc::new(HttpSources::new(&settings)?);
    let mut library = Library::new(&settings, Sources::shared(http));
    if use_cache {
        library = library.with_cache(Box::new(storage));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(execute(&library, cli.command))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("dev", "bunko", "bunko").context("resolve project dirs")?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;
    Ok(config_dir.join("bunko.db"))
}

async fn execute(library: &Library, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search {
            query,
            field,
            limit,
        } => {
            for record in library.search_catalog(&query, field, limit).await {
                println!("{}", record_line(&record));
            }
        }
        Command::Show { work_id } => {
            let record = library
                .get_catalog_record(&work_id)
                .await
                .with_context(|| format!("work {work_id} is not in the catalog"))?;
            println!("work:       {}", record.work_id);
            println!("title:      {}", record.title);
            println!("author:     {}", record.author());
            println!("collection: {}", record.collection_id);
            println!("file:       {}", record.nominal_file_id);
            if !record.opening_line.is_empty() {
                println!("opening:    {}", record.opening_line);
            }
        }
        Command::Read {
            work_id, format, ..
        } => {
            let (record, outcome) = library
                .open_work(&work_id)
                .await
                .with_context(|| format!("work {work_id} is not in the catalog"))?;
            let document = match outcome {
                ReadOutcome::Document(reading) => {
                    if reading.had_replacements {
                        eprintln!("note: some bytes could not be decoded");
                    }
                    reading.document
                }
                ReadOutcome::Exhausted(exhausted) => placeholder_document(&record, &exhausted),
            };
            print!("{}", rendered(&document, format));
        }
        Command::Fetch {
            collection_id,
            nominal_file_id,
        } => {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });
            let outcome = library
                .resolver()
                .resolve_cancellable(&collection_id, &nominal_file_id, &cancel)
                .await;
            match outcome {
                Ok(ResolutionOutcome::Resolved(resolved)) => {
                    println!(
                        "{}\t{}\t{} bytes",
                        resolved.resource_name,
                        resolved.strategy,
                        resolved.raw_bytes.len()
                    );
                }
                Ok(ResolutionOutcome::Exhausted(exhausted)) => {
                    for attempt in &exhausted.attempts {
                        println!(
                            "{}\t{}\t{}",
                            attempt.candidate.resource_name,
                            attempt.candidate.strategy,
                            attempt.failure
                        );
                    }
                    let strategies: Vec<&str> = exhausted
                        .tried_strategies()
                        .iter()
                        .map(|strategy| strategy.as_str())
                        .collect();
                    anyhow::bail!(
                        "no candidate for {collection_id}/{nominal_file_id} was found (tried {}; {} resources listed)",
                        strategies.join(", "),
                        exhausted.available_resource_names.len()
                    );
                }
                Err(ResolveError::Cancelled) => anyhow::bail!("cancelled"),
            }
        }
        Command::Candidates {
            collection_id,
            nominal_file_id,
        } => {
            for candidate in library
                .resolver()
                .candidates(&collection_id, &nominal_file_id)
                .await
            {
                println!(
                    "{}\t{}\t{}",
                    candidate.priority, candidate.strategy, candidate.resource_name
                );
            }
        }
        Command::Locate {
            collection_id,
            title,
        } => match library.resolver().locate_by_title(&collection_id, &title).await {
            Some(resolved) => println!("{}\t{}", resolved.resource_name, resolved.strategy),
            None => anyhow::bail!("no resource in {collection_id} mentions {title}"),
        },
        Command::Config { .. } => {}
    }
    Ok(())
}

fn configure(
    storage: &Storage,
    settings: &mut Settings,
    assignments: &[String],
    clear_cache: bool,
) -> anyhow::Result<()> {
    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected key=value, got {assignment}"))?;
        settings.set(key, value).map_err(anyhow::Error::msg)?;
    }
    if !assignments.is_empty() {
        storage.save_settings(settings)?;
    }
    if clear_cache {
        let removed = storage.clear_documents()?;
        eprintln!("removed {removed} cached documents");
    }

    println!("catalog_url = {}", settings.catalog_url);
    println!("listing_url = {}", settings.listing_url);
    println!("document_url = {}", settings.document_url);
    println!("user_agent = {}", settings.user_agent);
    println!("request_timeout_secs = {}", settings.request_timeout_secs);
    println!("listing_ttl_secs = {}", settings.listing_ttl_secs);
    println!("proximity_window = {}", settings.proximity_window);
    println!("metadata_scan_lines = {}", settings.metadata_scan_lines);
    println!("author_max_chars = {}", settings.author_max_chars);
    println!("cache_documents = {}", settings.cache_documents);
    println!("cached_documents = {}", storage.count_documents()?);
    Ok(())
}

fn record_line(record: &CatalogRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}/{}",
        record.work_id,
        record.title,
        record.author(),
        record.collection_id,
        record.nominal_file_id
    )
}

fn rendered(document: &StructuredDocument, format: Format) -> String {
    match format {
        Format::Text => render::to_plain_text(document),
        Format::Html => render::to_html(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_read_flags() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["bunko", "read", "456", "--format", "html", "--no-cache"])?;
        match cli.command {
            Command::Read {
                work_id,
                format,
                no_cache,
            } => {
                assert_eq!(work_id, "456");
                assert_eq!(format, Format::Html);
                assert!(no_cache);
            }
            other => panic!("unexpected command {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn config_set_updates_storage() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        let mut settings = storage.load_settings()?;
        configure(
            &storage,
            &mut settings,
            &["proximity_window=3".to_string()],
            false,
        )?;
        assert_eq!(storage.load_settings()?.proximity_window, 3);

        let err = configure(&storage, &mut settings, &["nonsense".to_string()], false);
        assert!(err.is_err());
        Ok(())
    }
}
