use clozesync::{
    anki::AnkiConnectClient,
    config,
    logseq::LogseqClient,
    sync::{
        SyncEngine,
        SyncOutcome,
    },
};

#[tokio::main]
async fn main() {
    let config = config::load_config();
    let store = AnkiConnectClient::new(&config.anki_connect_url);
    let graph = LogseqClient::new(&config.logseq_api_url, &config.logseq_api_token);
    let engine = SyncEngine::new(store, graph, config);

    match engine.sync().await {
        Ok(SyncOutcome::Completed(report)) => {
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Ok(SyncOutcome::AlreadyRunning) => {}
        Err(e) => {
            eprintln!("Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}
