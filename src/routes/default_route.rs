use actix_web::{get, web, HttpResponse};
use askama::Template;

use crate::configuration::CrawlerSettings;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    base_url: &'a str,
}

#[get("/")]
async fn default(settings: web::Data<CrawlerSettings>) -> HttpResponse {
    match (IndexTemplate {
        base_url: &settings.base_url,
    })
    .render()
    {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(e) => {
            log::error!("Failed to render index page: {:?}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Crawler is up")
}
