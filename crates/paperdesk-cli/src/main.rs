use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use paperdesk_core::gateway::normalize_id;
use paperdesk_core::{
    CollectionKind, Config, NewItem, Paperdesk, Record, SearchCriteria, Upserted,
};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Search arXiv and keep local favorites and reading history
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database (overrides config and PAPERDESK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User whose collections to use
    #[arg(long, global = true, env = "PAPERDESK_OWNER", default_value = "local")]
    owner: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the catalog
    Search {
        /// Words in the title
        #[arg(long)]
        title: Option<String>,

        /// Author name
        #[arg(long)]
        author: Option<String>,

        /// Subject class, e.g. cs.LG
        #[arg(long)]
        category: Option<String>,

        /// Earliest submission date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest submission date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Raw catalog query; overrides the structured filters
        #[arg(long, short)]
        query: Option<String>,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Results per page
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },

    /// Show one article
    Show {
        /// arXiv identifier, e.g. 1706.03762 or hep-th/9711200
        id: String,

        /// Also record the article in your history
        #[arg(long)]
        remember: bool,
    },

    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Manage reading history
    History {
        #[command(subcommand)]
        action: CollectionAction,
    },
}

#[derive(Subcommand, Debug)]
enum CollectionAction {
    /// List items, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Add an article by id (title and authors are looked up)
    Add { id: String },
    /// Remove an article by id
    Remove { id: String },
    /// Remove everything
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Resolve configuration: CLI flags > env vars > config files > defaults
    let mut config = Config::load();
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    let desk = Paperdesk::from_config(&config)?;

    let color = ColorMode(!cli.no_color);
    let mut out = std::io::stdout();

    match cli.command {
        Command::Search {
            title,
            author,
            category,
            from,
            to,
            query,
            page,
            page_size,
        } => {
            let criteria = SearchCriteria {
                title,
                author,
                category,
                date_from: from,
                date_to: to,
            };
            search(&desk, &mut out, criteria, query, page, page_size, color).await
        }
        Command::Show { id, remember } => show(&desk, &mut out, &cli.owner, &id, remember, color).await,
        Command::Favorites { action } => {
            collection(&desk, &mut out, &cli.owner, CollectionKind::Favorites, action, color).await
        }
        Command::History { action } => {
            collection(&desk, &mut out, &cli.owner, CollectionKind::History, action, color).await
        }
    }
}

async fn search(
    desk: &Paperdesk,
    out: &mut dyn Write,
    criteria: SearchCriteria,
    query: Option<String>,
    page: u32,
    page_size: u32,
    color: ColorMode,
) -> anyhow::Result<()> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let results = match query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => desk.gateway.search_query(q, start, page_size).await?,
        None => {
            criteria.validate()?;
            desk.gateway.search(&criteria, start, page_size).await?
        }
    };
    output::print_page(out, &results, start, page_size, color)?;
    Ok(())
}

async fn show(
    desk: &Paperdesk,
    out: &mut dyn Write,
    owner: &str,
    id: &str,
    remember: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let record = desk.gateway.fetch_by_id(id).await?;
    output::print_record(out, &record, color)?;
    if remember {
        desk.collections
            .add_history_entry(owner, collection_item(id, record))
            .await?;
    }
    Ok(())
}

/// Collection entry for `record`, keyed by the id as the user typed it
/// (normalized), not the versioned id the catalog returns.
fn collection_item(requested_id: &str, record: Record) -> NewItem {
    NewItem::new(normalize_id(requested_id), record.title, record.authors)
}

async fn collection(
    desk: &Paperdesk,
    out: &mut dyn Write,
    owner: &str,
    kind: CollectionKind,
    action: CollectionAction,
    color: ColorMode,
) -> anyhow::Result<()> {
    let store = &desk.collections;
    match action {
        CollectionAction::List { limit } => {
            let items = store.list(owner, kind, limit).await?;
            output::print_items(out, kind, &items, color)?;
        }
        CollectionAction::Add { id } => {
            let record = desk.gateway.fetch_by_id(&id).await?;
            let outcome = store.upsert(owner, kind, collection_item(&id, record)).await?;
            let message = match outcome {
                Upserted::Inserted => format!("Added to {kind}."),
                Upserted::Updated => format!("Already in {kind}, refreshed."),
            };
            output::print_status(out, &message, color)?;
        }
        CollectionAction::Remove { id } => {
            store.remove(owner, kind, normalize_id(&id)).await?;
            output::print_status(out, &format!("Removed {id} from {kind}."), color)?;
        }
        CollectionAction::Clear => {
            let removed = store.clear(owner, kind).await?;
            output::print_status(out, &format!("Removed {removed} items from {kind}."), color)?;
        }
    }
    Ok(())
}
