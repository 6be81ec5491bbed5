use clap::{Parser, Subcommand};
use tower_lsp::{LspService, Server};
use tracing::info;

use helm_lens::{logging::setup_logging, server::Backend};

#[derive(Parser, Debug)]
#[command(name = "helm-lens", about = "Language server for Helm chart templates")]
struct Cli {
    /// Initial log level; the editor's `logLevel` setting replaces it once received
    #[arg(long)]
    log_level: Option<String>,

    /// Communicate over stdin/stdout (the only transport; accepted for editor compatibility)
    #[arg(long)]
    stdio: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the version and exit
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let log_handle = setup_logging(cli.log_level.as_deref())?;
    info!("starting helm-lens {}", env!("CARGO_PKG_VERSION"));
    if !cli.stdio {
        info!("no transport given, using stdio");
    }

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend::new(client, Some(log_handle)));
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
