//! Klassifikator portal CLI
//!
//! Drives the portal pages from the terminal against a live portal.
//!
//! # Usage
//!
//! ```bash
//! # Classifier tree, fully expanded, filtered
//! klass tree --filter труб --expand-all
//!
//! # Nomenclature tree as HTML rows
//! klass -o html nomen --expand-all
//!
//! # Approve an item, attach a note
//! klass approve 1042
//! klass note 1042 "check unit"
//!
//! # Pairs: list, search, correct a name
//! klass pairs list
//! klass pairs search "болт м12"
//! klass pairs set 10 "Болт М12х50"
//!
//! # Catalog page 2, sorted by unit descending
//! klass catalog --uom шт --sort uom --desc --page 2
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use class_tree::RowId;
use colored::Colorize;
use portal_client::{HttpPortalClient, OpsApi, ReindexTarget};
use tracing_subscriber::EnvFilter;

use klassifikator::pages::catalog::{
    reduce as reduce_catalog, CatalogEvent, CatalogPage, CatalogState,
};
use klassifikator::pages::hierarchy::{HierarchyEvent, HierarchyPage};
use klassifikator::pages::nomenclature::{NomenclatureEvent, NomenclaturePage};
use klassifikator::pages::pairs::{PairEntry, PairsPage, SEARCH_SIZE};
use klassifikator::pages::report::{health_line, load_report};
use klassifikator::pages::search::{format_quick_hits, quick_search, SearchPage};
use klassifikator::present::{HtmlRows, JsonTable, Presenter, Table, TextTable};
use klassifikator::{EditState, PortalConfig, StatusLine};

#[derive(Parser)]
#[command(name = "klass")]
#[command(version = "0.1.0")]
#[command(about = "Klassifikator portal: classifier trees, nomenclature review, pairs and catalog")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text (default), json, or html
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,

    /// YAML config file (defaults to $KLASS_CONFIG)
    #[arg(long, short, global = true, env = "KLASS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Html,
}

#[derive(Subcommand)]
enum Commands {
    /// Classifier hierarchy tree
    Tree {
        /// Keep rows whose code or name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Expand every branch
        #[arg(long)]
        expand_all: bool,

        /// Open these node ids (repeatable)
        #[arg(long)]
        open: Vec<String>,
    },

    /// Nomenclature tree with approval state and notes
    Nomen {
        #[arg(long)]
        expand_all: bool,

        #[arg(long)]
        open: Vec<String>,
    },

    /// Set the approved flag of a nomenclature item
    Approve {
        id: String,

        /// Clear the flag instead of setting it
        #[arg(long)]
        revoke: bool,
    },

    /// Replace the note of a nomenclature item
    Note { id: String, text: String },

    /// Search the nomenclature index (codes when the query is digits and dots)
    Search { query: String },

    /// Top hits across the default index
    QuickSearch { query: String },

    /// Corrected names of nomenclature pairs
    Pairs {
        #[command(subcommand)]
        action: PairsAction,
    },

    /// Paged nomenclature catalog
    Catalog {
        /// Query across every column
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long)]
        item_name: Option<String>,
        #[arg(long)]
        type_mark: Option<String>,
        #[arg(long)]
        uom: Option<String>,
        #[arg(long)]
        class_l3_id: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Restore state from a URL query string (`page=2&q=...`)
        #[arg(long, conflicts_with_all = ["query", "item_name", "type_mark", "uom", "class_l3_id", "sort", "desc"])]
        state: Option<String>,
    },

    /// Nomenclature count per object
    Report,

    /// Portal API and search backend health
    Health,

    /// Start a background reindex
    Reindex {
        #[arg(value_enum, default_value = "pairs")]
        target: IndexArg,
    },
}

#[derive(Subcommand)]
enum PairsAction {
    /// First rows of the pairs view
    List {
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },
    /// Search the pairs index
    Search { query: String },
    /// Store a corrected name
    Set { id: i64, name: String },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IndexArg {
    Pairs,
    Nomenclature,
}

impl From<IndexArg> for ReindexTarget {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::Pairs => ReindexTarget::Pairs,
            IndexArg::Nomenclature => ReindexTarget::Nomenclature,
        }
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,klassifikator=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PortalConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client = config.client().context("building HTTP client")?;
    let format = cli.format;

    match cli.command {
        Commands::Tree {
            filter,
            expand_all,
            open,
        } => cmd_tree(&config, &client, filter, expand_all, open, format).await,
        Commands::Nomen { expand_all, open } => {
            cmd_nomen(&config, &client, expand_all, open, format).await
        }
        Commands::Approve { id, revoke } => cmd_approve(&config, &client, &id, !revoke).await,
        Commands::Note { id, text } => cmd_note(&config, &client, &id, text).await,
        Commands::Search { query } => cmd_search(&config, &client, &query, format).await,
        Commands::QuickSearch { query } => {
            let (total, hits) = quick_search(&client, &query)
                .await
                .context("quick search")?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
                _ => println!("{}", format_quick_hits(total, &hits)),
            }
            Ok(())
        }
        Commands::Pairs { action } => cmd_pairs(&config, &client, action, format).await,
        Commands::Catalog {
            query,
            item_name,
            type_mark,
            uom,
            class_l3_id,
            sort,
            desc,
            page,
            limit,
            state,
        } => {
            let state = match state {
                Some(qs) => CatalogState::from_query_string(&qs),
                None => {
                    let mut s = CatalogState {
                        q: query.unwrap_or_default(),
                        f_item_name: item_name.unwrap_or_default(),
                        f_type_mark: type_mark.unwrap_or_default(),
                        f_uom: uom.unwrap_or_default(),
                        f_class_l3_id: class_l3_id.unwrap_or_default(),
                        page: page.max(1),
                        limit,
                        ..Default::default()
                    };
                    if let Some(field) = sort {
                        s.sort = field;
                    }
                    if desc {
                        let field = s.sort.clone();
                        s = reduce_catalog(s, CatalogEvent::SortBy(field));
                        // sorting resets the page; keep the one asked for
                        s.page = page.max(1);
                    }
                    s
                }
            };
            cmd_catalog(&config, &client, state, format).await
        }
        Commands::Report => {
            let (report, status) = load_report(&client).await;
            fail_on_error(&status)?;
            print_table(&report.table(), format);
            print_status(&status);
            Ok(())
        }
        Commands::Health => {
            let status = health_line(&client).await;
            print_status(&status);
            fail_on_error(&status)
        }
        Commands::Reindex { target } => {
            let target = ReindexTarget::from(target);
            client
                .reindex(target)
                .await
                .with_context(|| format!("reindex {}", target.path()))?;
            println!("{} reindex started ({})", "OK".green(), target.path());
            Ok(())
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn cmd_tree(
    config: &PortalConfig,
    client: &HttpPortalClient,
    filter: Option<String>,
    expand_all: bool,
    open: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut page = HierarchyPage::new(config);
    page.reload(client).await;
    fail_on_error(&page.state.status)?;

    if let Some(filter) = filter {
        page.dispatch(HierarchyEvent::FilterChanged(filter));
    }
    if expand_all {
        page.dispatch(HierarchyEvent::ExpandAll);
    }
    for id in open {
        page.dispatch(HierarchyEvent::Toggle(parse_row_id(&id)));
    }

    print_table(&page.table(), format);
    print_status(&page.state.status);
    let diagnostics = &page.state.diagnostics;
    if !diagnostics.is_clean() {
        eprintln!(
            "{}: {} orphan(s) promoted, {} duplicate key(s), {} level mismatch(es)",
            "warning".yellow().bold(),
            diagnostics.promoted_orphans.len(),
            diagnostics.duplicate_keys.len(),
            diagnostics.level_mismatches.len()
        );
    }
    Ok(())
}

async fn load_nomenclature(
    config: &PortalConfig,
    client: &HttpPortalClient,
) -> anyhow::Result<NomenclaturePage> {
    let mut page = NomenclaturePage::new(config);
    page.reload(client).await;
    fail_on_error(&page.state.status)?;
    Ok(page)
}

async fn cmd_nomen(
    config: &PortalConfig,
    client: &HttpPortalClient,
    expand_all: bool,
    open: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut page = load_nomenclature(config, client).await?;
    if expand_all {
        page.dispatch(NomenclatureEvent::ToggleAll);
    }
    for id in open {
        page.dispatch(NomenclatureEvent::Toggle(parse_row_id(&id)));
    }
    print_table(&page.table(), format);
    print_status(&page.state.status);
    Ok(())
}

async fn cmd_approve(
    config: &PortalConfig,
    client: &HttpPortalClient,
    id: &str,
    approved: bool,
) -> anyhow::Result<()> {
    let mut page = load_nomenclature(config, client).await?;
    let state = page
        .set_approved(client, &parse_row_id(id), approved)
        .await
        .with_context(|| format!("approve {}", id))?;
    report_edit(state, &page.state.status)
}

async fn cmd_note(
    config: &PortalConfig,
    client: &HttpPortalClient,
    id: &str,
    text: String,
) -> anyhow::Result<()> {
    let mut page = load_nomenclature(config, client).await?;
    let id = parse_row_id(id);
    page.type_note(&id, text, std::time::Instant::now())
        .with_context(|| format!("note {}", id))?;
    // leaving the field saves without waiting for the debounce
    let state = page
        .blur_note(client, &id)
        .await
        .with_context(|| format!("note {}", id))?;
    report_edit(state, &page.state.status)
}

async fn cmd_search(
    config: &PortalConfig,
    client: &HttpPortalClient,
    query: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut page = SearchPage::new(config.indexes.nomenclature.clone());
    page.search(client, query).await;
    fail_on_error(&page.state.status)?;
    print_table(&page.table(), format);
    print_status(&page.state.status);
    Ok(())
}

async fn cmd_pairs(
    config: &PortalConfig,
    client: &HttpPortalClient,
    action: PairsAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        PairsAction::List { limit } => {
            let mut page = PairsPage::new(config).with_limits(limit, SEARCH_SIZE);
            page.load(client, "").await;
            fail_on_error(&page.state.status)?;
            print_table(&page.table(), format);
            print_status(&page.state.status);
        }
        PairsAction::Search { query } => {
            let mut page = PairsPage::new(config);
            page.load(client, &query).await;
            fail_on_error(&page.state.status)?;
            print_table(&page.table(), format);
            print_status(&page.state.status);
        }
        PairsAction::Set { id, name } => {
            let mut page = PairsPage::new(config);
            let row = client
                .pairs_rows(&[id])
                .await
                .context("fetching pair")?
                .into_iter()
                .next();
            let Some(row) = row else {
                bail!("pair {} not found", id);
            };
            page.state.entries = vec![PairEntry::from(row)];
            page.edit(id, name)?;
            let state = page.save(client, id).await?;
            report_edit(state, &page.state.status)?;
        }
    }
    Ok(())
}

async fn cmd_catalog(
    config: &PortalConfig,
    client: &HttpPortalClient,
    state: CatalogState,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut page = CatalogPage::new(config.collections.catalog.clone(), config.catalog_debounce())
        .with_state(state);
    page.load(client).await;
    fail_on_error(&page.status)?;
    print_table(&page.table(), format);
    print_status(&page.status);
    eprintln!(
        "{}  {}{}  state: {}",
        page.state.page_info(),
        if page.state.can_prev() { "‹ prev " } else { "" },
        if page.state.can_next() { "next ›" } else { "" },
        page.state.to_query_string()
    );
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Numeric ids become `RowId::Int`, anything else stays text.
fn parse_row_id(s: &str) -> RowId {
    s.trim()
        .parse::<i64>()
        .map(RowId::Int)
        .unwrap_or_else(|_| RowId::from(s.trim()))
}

fn print_table(table: &Table, format: OutputFormat) {
    let out = match format {
        OutputFormat::Json => JsonTable { pretty: true }.render(table),
        OutputFormat::Text => TextTable::default().render(table),
        OutputFormat::Html => HtmlRows::default().render(table),
    };
    println!("{}", out);
}

fn print_status(status: &StatusLine) {
    if status.text.is_empty() {
        return;
    }
    if status.is_error() {
        eprintln!("{}", status.text.red());
    } else {
        eprintln!("{}", status.text.dimmed());
    }
}

fn fail_on_error(status: &StatusLine) -> anyhow::Result<()> {
    if status.is_error() {
        bail!("{}", status.text);
    }
    Ok(())
}

fn report_edit(state: EditState, status: &StatusLine) -> anyhow::Result<()> {
    match state {
        EditState::Errored => bail!("{}", status.text),
        EditState::Clean => {
            println!("unchanged");
            Ok(())
        }
        _ => {
            println!("{} {}", "OK".green(), status.text);
            Ok(())
        }
    }
}
