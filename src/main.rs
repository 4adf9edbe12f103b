use inbox_rules::config::AppConfig;

#[tokio::main]
async fn main() {
    // Load .env file for OAuth credentials
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();

    match inbox_rules::run(&config).await {
        Ok(summary) => println!(
            "Processed {} message(s): {} rule match(es), {} action(s) applied",
            summary.messages_scanned, summary.rules_matched, summary.actions_dispatched
        ),
        Err(e) => {
            log::error!("Run failed: {}", e);
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}
