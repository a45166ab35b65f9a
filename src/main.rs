use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use docport::api::ApiClient;
use docport::config::ApiConfig;
use docport::export::ExportArchive;
use docport::import::{self, DocumentMode, ImportOptions, TagStrategy};

#[derive(Parser, Debug)]
#[command(
    name = "docport",
    about = "Import a document export archive into a target organization"
)]
struct Args {
    /// Path to the export zip archive.
    archive: PathBuf,

    /// Identifier of the organization receiving the documents.
    #[arg(long)]
    organization: String,

    /// Base URL of the target API. Falls back to DOCPORT_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the target API. Falls back to DOCPORT_API_TOKEN.
    #[arg(long)]
    token: Option<String>,

    /// Tag handling (`create-and-map`, `create-all` or `skip`).
    #[arg(long, default_value = "create-and-map")]
    tags: String,

    /// Document handling (`with-tags`, `without-tags` or `skip`).
    #[arg(long, default_value = "with-tags")]
    documents: String,

    /// Report what the run would do without writing to the target.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let tag_strategy = match args.tags.parse::<TagStrategy>() {
        Ok(strategy) => strategy,
        Err(()) => {
            writeln!(
                io::stderr(),
                "error: unsupported tag strategy '{}'. Use 'create-and-map', 'create-all' or 'skip'.",
                args.tags
            )?;
            std::process::exit(1);
        }
    };

    let document_mode = match args.documents.parse::<DocumentMode>() {
        Ok(mode) => mode,
        Err(()) => {
            writeln!(
                io::stderr(),
                "error: unsupported document mode '{}'. Use 'with-tags', 'without-tags' or 'skip'.",
                args.documents
            )?;
            std::process::exit(1);
        }
    };

    let config = match ApiConfig::resolve(args.api_url, args.token) {
        Ok(config) => config,
        Err(e) => {
            writeln!(io::stderr(), "error: {e}")?;
            std::process::exit(1);
        }
    };
    let api = ApiClient::new(config)?;
    log::info!("target api at {}", api.config().base_url);

    let mut archive = match ExportArchive::open(&args.archive) {
        Ok(archive) => archive,
        Err(e) => {
            writeln!(io::stderr(), "error: {e}")?;
            std::process::exit(1);
        }
    };

    // Ctrl-C stops the run between documents; the call in flight finishes.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, finishing in-flight work before stopping");
            interrupt.cancel();
        }
    });

    let options = ImportOptions {
        organization_id: args.organization,
        tag_strategy,
        document_mode,
        dry_run: args.dry_run,
    };

    let stats = match import::run_import(&api, &mut archive, &options, &cancel).await {
        Ok(stats) => stats,
        Err(e) => {
            writeln!(io::stderr(), "error: {e}")?;
            std::process::exit(1);
        }
    };

    if !args.dry_run {
        println!("{stats}");
    }
    Ok(())
}
