//! `flowpilot server` — Start the Flowpilot HTTP server.

use super::StateOptions;

pub async fn run(host: String, port: u16, options: &StateOptions) -> Result<(), String> {
    let config = options.server_config(host.clone(), port);

    println!("Starting Flowpilot server on {}:{}...", host, port);

    let addr = flowpilot_server::start_server(config).await?;
    println!("Flowpilot server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
