use std::time::Duration;

use folio::Client;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let config_path = env_or("FOLIO_CONFIG", "./folio.json");
    let db_path = env_or("FOLIO_DB", "./folio.db");
    let interval_secs: u64 = env_or("FOLIO_UPDATE_INTERVAL_SECS", "900")
        .parse()
        .unwrap_or(900);

    let client = match Client::new(&config_path, &db_path).await {
        Ok(client) => client,
        Err(err) => {
            log::error!("Startup failed: {}", err);
            std::process::exit(1);
        }
    };

    log::info!(
        "Tracking portfolio in {} every {}s",
        client.fiat(),
        interval_secs
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        // A failing source must not kill the daemon; retry next tick.
        if let Err(err) = client.update_balances(Duration::from_secs(interval_secs)).await {
            log::error!("Balance update failed: {}", err);
            continue;
        }
        let snapshot = client.last_snapshot().await;
        log::info!(
            "Portfolio total: {}{:.2} across {} records",
            client.fiat_symbol(),
            snapshot.total_fiat_value(),
            snapshot.len()
        );
    }
}
