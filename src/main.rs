use std::{net::TcpListener, sync::Arc};

use env_logger::Env;
use moyo_crawler::{
    configuration::get_configuration,
    services::{GoogleAuth, SheetsClient},
    startup::run,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let auth = GoogleAuth::from_file(&configuration.google.credentials_path)
        .expect("Failed to load google credentials.");
    let sheets_client = SheetsClient::new(Arc::new(auth), &configuration.google)
        .expect("Failed to build google sheets client.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;
    log::info!("Listening on {}", listener.local_addr()?);

    run(listener, configuration.crawler, Arc::new(sheets_client))?.await
}
