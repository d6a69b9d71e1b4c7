//! gitwiki - a wiki whose pages live in a Git repository
//!
//! This is the main entry point for the gitwiki command-line interface.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gitwiki::config::WikiConfig;
use gitwiki::document::{Document, PageHeader};
use gitwiki::indexing::PageIndexer;
use gitwiki::storage::{CommitRecord, GitStorage, PageStore, RevisionId};

#[derive(Parser)]
#[command(name = "gitwiki", about = "A wiki whose pages live in a Git repository", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the wiki repository (overrides the configuration file)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Commit author name
    #[arg(long, global = true)]
    author: Option<String>,

    /// Commit author email
    #[arg(long, global = true)]
    email: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new wiki repository
    Init(InitArgs),
    /// List pages
    List(ListArgs),
    /// Print a page
    Show(ShowArgs),
    /// Save a page from a file or stdin
    Save(SaveArgs),
    /// Rename a page
    Rename(RenameArgs),
    /// Delete a page
    Delete(DeleteArgs),
    /// Show the content-changing revisions of a page
    Log(PageArg),
    /// Show the last commit that changed a page
    Last(PageArg),
    /// Show how a page changed between two revisions
    Diff(DiffArgs),
    /// List the pages a search index would need to (re)index
    Reindex,
}

#[derive(Args)]
struct InitArgs {
    /// Directory to create the wiki in (defaults to the configured repository)
    path: Option<PathBuf>,
    /// Do not create the baseline `.gitignore` commit
    #[arg(long)]
    no_seed: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Include pages in subdirectories
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct ShowArgs {
    page: String,
    /// Show the page as of this revision
    #[arg(long)]
    revision: Option<String>,
    /// Print the indexable plain text instead of the raw page
    #[arg(long)]
    plain: bool,
}

#[derive(Args)]
struct SaveArgs {
    page: String,
    #[arg(short, long)]
    message: Option<String>,
    /// Read the content from this file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct RenameArgs {
    from: String,
    to: String,
    #[arg(short, long)]
    message: Option<String>,
}

#[derive(Args)]
struct DeleteArgs {
    page: String,
    #[arg(short, long)]
    message: Option<String>,
}

#[derive(Args)]
struct PageArg {
    page: String,
}

#[derive(Args)]
struct DiffArgs {
    page: String,
    /// Old side of the diff
    old: String,
    /// New side of the diff
    #[arg(default_value = "HEAD")]
    new: String,
}

#[derive(Serialize)]
struct PageView<'a> {
    path: &'a str,
    found: bool,
    header: &'a PageHeader,
    content: String,
}

#[derive(Serialize)]
struct Committed<'a> {
    revision: RevisionId,
    message: &'a str,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config, cli.verbose);
    run_command(cli, config)
}

fn load_config(cli: &Cli) -> anyhow::Result<WikiConfig> {
    let mut config = match &cli.config {
        Some(path) => WikiConfig::from_file(path)?,
        None => WikiConfig::default(),
    };
    if let Some(repo) = &cli.repo {
        config.repository = repo.clone();
    }
    if let Some(name) = &cli.author {
        config.author.name = name.clone();
    }
    if let Some(email) = &cli.email {
        config.author.email = email.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &WikiConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.log_level.as_str() };
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(cli: Cli, config: WikiConfig) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(args, &config),
        Command::List(args) => cmd_list(&open(&config)?, args, format),
        Command::Show(args) => cmd_show(&open(&config)?, args, format),
        Command::Save(args) => cmd_save(&open(&config)?, args, &config, format),
        Command::Rename(args) => {
            let storage = open(&config)?;
            let id = storage.rename_page(&args.from, &args.to, &config.signature(), args.message.as_deref())?;
            print_commit(&storage, id, format)
        }
        Command::Delete(args) => {
            let storage = open(&config)?;
            let id = storage.delete_page(&args.page, &config.signature(), args.message.as_deref())?;
            print_commit(&storage, id, format)
        }
        Command::Log(args) => {
            let logs = open(&config)?.logs_for_page(&args.page)?;
            match format {
                OutputFormat::Json => print_json(&logs),
                OutputFormat::Text => {
                    logs.iter().for_each(print_record);
                    Ok(())
                }
            }
        }
        Command::Last(args) => {
            let record = open(&config)?.last_commit(&args.page)?;
            match format {
                OutputFormat::Json => print_json(&record),
                OutputFormat::Text => {
                    print_record(&record);
                    Ok(())
                }
            }
        }
        Command::Diff(args) => cmd_diff(&open(&config)?, args, format),
        Command::Reindex => cmd_reindex(&open(&config)?, format),
    }
}

fn open(config: &WikiConfig) -> anyhow::Result<GitStorage> {
    config
        .open_storage()
        .with_context(|| format!("cannot open wiki at {}", config.repository.display()))
}

fn cmd_init(args: InitArgs, config: &WikiConfig) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(|| config.repository.clone());
    if path.join(".git").exists() {
        bail!("{} already contains a repository", path.display());
    }

    let storage = if args.no_seed || !config.seed_ignore_file {
        GitStorage::init(&path)?
    } else {
        GitStorage::init_seeded(&path, &config.signature())?
    };
    println!("Initialized wiki repository in {}", storage.root().display());
    Ok(())
}

fn cmd_list(storage: &GitStorage, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let pages = if args.all {
        storage.list_all_pages()?
    } else {
        storage.list_pages()?
    };
    match format {
        OutputFormat::Json => print_json(&pages),
        OutputFormat::Text => {
            for page in &pages {
                println!("{}", page);
            }
            Ok(())
        }
    }
}

fn cmd_show(storage: &GitStorage, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let page = match &args.revision {
        Some(revision) => {
            let revision = storage.resolve_revision(revision)?;
            storage.page_at_revision(&args.page, revision)?
        }
        None => {
            let (page, found) = storage.lookup_page(&args.page)?;
            if !found {
                bail!("page '{}' does not exist", args.page);
            }
            page
        }
    };

    let content = if args.plain {
        page.render_plaintext()
    } else {
        String::from_utf8_lossy(&page.raw_bytes).into_owned()
    };
    match format {
        OutputFormat::Json => print_json(&PageView {
            path: &page.path,
            found: true,
            header: &page.header,
            content,
        }),
        OutputFormat::Text => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn cmd_save(
    storage: &GitStorage,
    args: SaveArgs,
    config: &WikiConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let content = match &args.file {
        Some(file) => std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("cannot read stdin")?;
            buf
        }
    };

    let (mut page, found): (Document, bool) = storage.lookup_page(&args.page)?;
    debug!(path = %page.path, found, "saving page");
    page.set_raw_bytes(content)?;
    let id = storage.save_page(&page, &config.signature(), args.message.as_deref())?;
    print_commit(storage, id, format)
}

fn cmd_diff(storage: &GitStorage, args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    let old = storage.resolve_revision(&args.old)?;
    let new = storage.resolve_revision(&args.new)?;
    let (page, _) = storage.lookup_page(&args.page)?;

    let patches = storage.diff_page(&page, old, new)?;
    match format {
        OutputFormat::Json => print_json(&patches),
        OutputFormat::Text => {
            for patch in &patches {
                print!("{}", patch);
            }
            Ok(())
        }
    }
}

fn cmd_reindex(store: &dyn PageStore, format: OutputFormat) -> anyhow::Result<()> {
    let mut indexer = PageIndexer::new();
    let batch = indexer.refresh(store)?;
    match format {
        OutputFormat::Json => print_json(&batch),
        OutputFormat::Text => {
            for page in &batch.updated {
                println!("{}\t{}\t{}", page.name, page.language, page.title);
            }
            println!("{} page(s) to index, {} skipped", batch.updated.len(), batch.skipped);
            Ok(())
        }
    }
}

fn print_commit(storage: &GitStorage, id: RevisionId, format: OutputFormat) -> anyhow::Result<()> {
    let record = storage.get_commit(id)?;
    match format {
        OutputFormat::Json => print_json(&Committed {
            revision: id,
            message: &record.message,
        }),
        OutputFormat::Text => {
            println!("[{}] {}", id.short(), record.summary());
            Ok(())
        }
    }
}

fn print_record(record: &CommitRecord) {
    println!(
        "{} {} {} <{}> {}",
        record.id.short(),
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.author_name,
        record.author_email,
        record.summary()
    );
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
