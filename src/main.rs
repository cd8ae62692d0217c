// Entrypoint for the CLI application.
// - Reads the configuration, builds the HTTPS transport and registers on the
//   server before handing control to the menu loop.
// - Returns `anyhow::Result` so startup failures print their full context.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dbarchive_cli::api::ApiClient;
use dbarchive_cli::config::Config;
use dbarchive_cli::export::XlsxExporter;
use dbarchive_cli::retrieval::ThreadSleep;
use dbarchive_cli::transport::HttpsTransport;
use dbarchive_cli::ui;

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::load().context("Failed to read configuration")?;
    tracing::info!(origin = %config.origin(), "configuration loaded");

    let transport = HttpsTransport::new(&config.trust_anchor)
        .context("Failed to create HTTPS client")?;

    let (name, password) = ui::prompt_credentials()?;
    let api = ApiClient::login(
        transport,
        config.endpoints(),
        config.token_format,
        &name,
        &password,
    )
    .context("Registration on the server failed")?;
    println!("Registered as {}", api.session().username());

    let exporter = XlsxExporter::new(&config.export_dir);
    let pacer = ThreadSleep(config.page_delay);

    ui::main_menu(&api, &exporter, &pacer)
}

/// Log to stderr so the interactive prompts on stdout stay readable.
/// `RUST_LOG` overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dbarchive_cli=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
