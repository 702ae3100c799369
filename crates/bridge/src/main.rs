use anyhow::Context as _;
use clap::Parser as _;
use tracing::info;
use unrelated_mcp_rest_bridge::config::Cli;
use unrelated_mcp_rest_bridge::logging::init_tracing;
use unrelated_mcp_rest_bridge::{build_dispatcher, session};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let runtime = tokio::runtime::Runtime::new().context("build tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // The stdin reader thread blocks in `read` and cannot be cancelled; don't wait for it.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve()?;
    let dispatcher = build_dispatcher(config)?;

    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    session::serve_until(dispatcher, tokio::io::stdin(), tokio::io::stdout(), ctrl_c)
        .await
        .context("stdio session")
}
