//! Travel agent server entrypoint.

// crates.io
use color_eyre::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
// self
use a2a_travel_agent::{
	config::Config,
	server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = Config::from_env()?;
	let state = AppState::from_config(&config)?;
	let sweeper =
		server::spawn_expiry_sweeper(state.issuer.store().clone(), config.oauth.sweep_interval);
	let listener = TcpListener::bind(config.server.bind_addr()).await?;

	tracing::info!(
		addr = %listener.local_addr()?,
		oauth_enabled = config.oauth.enabled,
		mode = state.dispatcher.mode().as_str(),
		"Travel agent listening."
	);

	axum::serve(listener, server::router(state)).with_graceful_shutdown(shutdown_signal()).await?;

	if let Some(sweeper) = sweeper {
		sweeper.abort();
	}

	tracing::info!("Travel agent stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
	}
}
