use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use upi_qr::config::AppConfig;
use upi_qr::server;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("upi_qr=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        payee = %config.payee_id,
        ecl = %config.error_correction,
        "Starting UPI QR generator"
    );

    server::serve(config).await
}
