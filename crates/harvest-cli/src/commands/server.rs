//! `harvest server` — Start the Harvest HTTP server.

use harvest_core::OrchestratorConfig;

pub async fn run(host: String, port: u16, db_path: String) -> Result<(), String> {
    let config = harvest_server::ServerConfig {
        host: host.clone(),
        port,
        orchestrator: OrchestratorConfig::from_env().with_db_path(db_path),
    };

    println!("Starting Harvest server on {}:{}...", host, port);

    let addr = harvest_server::start_server(config).await?;
    println!("Harvest server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
