use clap::Parser;
use tokenwarden::app::create_app;
use tokenwarden::cli::{Args, init_logging, load_auth_config, load_users};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(config) = load_auth_config(&args) else {
        std::process::exit(1);
    };
    info!(
        algorithm = %config.algorithm,
        locations = ?config.token_location,
        "Auth configured"
    );

    let app = create_app(config, load_users(&args));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
