use std::{net::TcpListener, sync::Arc};

use actix_files::Files;
use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    configuration::CrawlerSettings,
    routes::{crawl_route, default_route},
    services::SheetsClient,
};

pub fn run(
    listener: TcpListener,
    crawler_settings: CrawlerSettings,
    sheets_client: Arc<SheetsClient>,
) -> Result<Server, std::io::Error> {
    let crawler_settings = web::Data::new(crawler_settings);
    let sheets_client = web::Data::from(sheets_client);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/static", "./templates/static").prefer_utf8(true))
            .service(default_route::default)
            .service(default_route::health)
            .service(crawl_route::crawl)
            .app_data(crawler_settings.clone())
            .app_data(sheets_client.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
