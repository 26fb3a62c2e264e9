//! Furigana Maker - annotate Japanese text with readings
//!
//! Drives the annotation pipeline against in-memory pages and edits the
//! stored settings.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use furigana::config::{self, FileSettingsStore, Settings, StoredSettings};
use furigana::coordinator::{ContextMenuClick, Coordinator, CONTEXT_MENU_ID};
use furigana::core::{ApiClient, ReqwestTransport, RequestFormat};
use furigana::host::TabHost;
use furigana::{audit, ipc::DeliveryOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate text in a fresh page, as the selection context menu would
    Annotate(AnnotateArgs),

    /// Show or change the stored settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Text to annotate
    #[arg(short, long)]
    text: String,

    /// Page body (defaults to the text)
    #[arg(long)]
    html: Option<String>,

    /// Text to select in the page (defaults to the text)
    #[arg(short, long)]
    select: Option<String>,

    /// Open the page without an agent loaded
    #[arg(long)]
    no_agent: bool,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the effective settings
    Show,

    /// Update stored settings
    Set {
        #[arg(long)]
        endpoint: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        use_proxy: Option<bool>,

        /// simple or prompt
        #[arg(long)]
        request_format: Option<RequestFormat>,

        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = match &cli.config {
        Some(path) => FileSettingsStore::new(path.clone()),
        None => FileSettingsStore::default(),
    };

    match cli.command {
        Command::Annotate(args) => annotate(store, args).await,
        Command::Settings(SettingsCommand::Show) => {
            show_settings(&store);
            Ok(())
        }
        Command::Settings(SettingsCommand::Set {
            endpoint,
            api_key,
            use_proxy,
            request_format,
            model,
        }) => {
            let update = StoredSettings {
                api_endpoint: endpoint,
                api_key,
                use_proxy,
                request_format,
                model,
            };
            config::save(&store, update)?;
            info!("💾 Settings saved to {}", store.path().display());
            show_settings(&store);
            Ok(())
        }
    }
}

async fn annotate(store: FileSettingsStore, args: AnnotateArgs) -> Result<()> {
    info!("🈁 Furigana Maker v{} starting...", env!("CARGO_PKG_VERSION"));

    let audit_log = store
        .path()
        .parent()
        .map(|dir| dir.join("delivery.log"))
        .unwrap_or_else(audit::delivery_log_path);

    let (background_tx, background_rx) = mpsc::unbounded_channel();
    let host = Arc::new(TabHost::new(Some(background_tx)));
    let client = ApiClient::new(Arc::new(store), Arc::new(ReqwestTransport::new()));
    let coordinator = Arc::new(Coordinator::new(client, host.clone()).with_audit_log(audit_log));
    tokio::spawn(coordinator.clone().serve(background_rx));

    let html = args.html.as_deref().unwrap_or(&args.text);
    let page = if args.no_agent {
        host.open_page(html)
    } else {
        host.open_page_with_agent(html)?
    };
    host.select_text(page, args.select.as_deref().unwrap_or(&args.text))?;

    let click = ContextMenuClick {
        menu_item_id: CONTEXT_MENU_ID.to_string(),
        page: Some(page),
        selection_text: Some(args.text.clone()),
    };
    let Some(report) = coordinator.handle_context_menu(click).await else {
        return Ok(());
    };

    if let DeliveryOutcome::Undeliverable(reason) = &report.delivery {
        println!("Result not delivered: {}", reason);
    }
    if let Some(html) = host.page_html(page) {
        println!("{}", html);
    }
    if let Some(message) = host.status(page).and_then(|status| status.message) {
        println!("Status: {}", message);
    }
    Ok(())
}

fn show_settings(store: &FileSettingsStore) {
    let settings = Settings::load(store);
    println!("Settings file:  {}", store.path().display());
    println!("Endpoint:       {}", settings.api_endpoint);
    println!("API key:        {}", settings.masked_api_key());
    println!("Use proxy:      {}", settings.use_proxy);
    println!("Request format: {}", settings.request_format);
    println!("Model:          {}", settings.model);
}
