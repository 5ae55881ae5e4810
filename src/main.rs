use arrayio::{create_router, init, AppState, Config, Result};

use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    init()?;

    // Optional JSON config file, then environment overrides
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            Config::from_json_file(path)?
        }
        None => Config::from_env()?,
    };

    if !config.upload_dir.exists() {
        std::fs::create_dir_all(&config.upload_dir)?;
    }

    let addr = config.bind_addr;
    let app = create_router(&config).with_state(AppState::with_config(config));

    let listener = TcpListener::bind(addr).await?;
    log::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
