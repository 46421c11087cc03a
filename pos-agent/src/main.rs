use pos_agent::{Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. .env, work dir, config, logging
    let env = setup_environment()?;

    // rustls needs a process-wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        work_dir = %env.work_dir.display(),
        "POS Agent starting..."
    );

    // 2. Shared state and print queue
    let state = ServerState::initialize(env.config, env.work_dir, env.logs);

    // 3. Serve until Ctrl-C or /api/service/stop
    if let Err(e) = Server::new(state).run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    tracing::info!("POS Agent stopped");
    Ok(())
}
