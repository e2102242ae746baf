use actix_web::{post, web, HttpResponse};
use askama::Template;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::{
    configuration::CrawlerSettings,
    domain::plan_page::PlanRange,
    services::{run_crawl_job, CrawlReport, ExportTarget, SheetsClient, TextExport},
};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
enum ExportChoice {
    GoogleSheet,
    TextFile,
}

impl From<ExportChoice> for ExportTarget {
    fn from(value: ExportChoice) -> Self {
        match value {
            ExportChoice::GoogleSheet => ExportTarget::GoogleSheet,
            ExportChoice::TextFile => ExportTarget::TextFile,
        }
    }
}

#[derive(Deserialize)]
struct CrawlForm {
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
    export: ExportChoice,
}

struct DownloadLink {
    label: String,
    file_name: String,
    href: String,
}

impl From<&TextExport> for DownloadLink {
    fn from(value: &TextExport) -> Self {
        DownloadLink {
            label: value.label.clone(),
            file_name: value.file_name.clone(),
            href: format!(
                "data:text/plain;charset=utf-8;base64,{}",
                STANDARD.encode(value.data.as_bytes())
            ),
        }
    }
}

/// Everything the result page shows, built fresh for each request.
#[derive(Template)]
#[template(path = "crawl.html")]
struct CrawlTemplate {
    first_url: String,
    last_url: String,
    error: Option<String>,
    report: Option<CrawlReport>,
    downloads: Vec<DownloadLink>,
}

impl CrawlTemplate {
    fn failed(range: Option<&PlanRange>, message: String) -> Self {
        CrawlTemplate {
            first_url: range.map(|r| r.page_url(r.start)).unwrap_or_default(),
            last_url: range.map(|r| r.page_url(r.end)).unwrap_or_default(),
            error: Some(message),
            report: None,
            downloads: vec![],
        }
    }

    fn finished(range: &PlanRange, report: CrawlReport) -> Self {
        CrawlTemplate {
            first_url: range.page_url(range.start),
            last_url: range.page_url(range.end),
            error: None,
            downloads: report.text_exports.iter().map(DownloadLink::from).collect(),
            report: Some(report),
        }
    }

    fn into_response(self) -> HttpResponse {
        match self.render() {
            Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
            Err(e) => {
                log::error!("Failed to render crawl page: {:?}", e);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

#[post("/crawl")]
async fn crawl(
    form: web::Form<CrawlForm>,
    settings: web::Data<CrawlerSettings>,
    sheets: web::Data<SheetsClient>,
) -> HttpResponse {
    let range = match PlanRange::from_params(&settings.base_url, &form.start, &form.end) {
        Ok(range) => range,
        Err(e) => return CrawlTemplate::failed(None, format!("{:#}", e)).into_response(),
    };

    log::info!(
        "Crawl requested for {} ~ {} ({:?})",
        range.start,
        range.end,
        form.export
    );

    match run_crawl_job(&settings, sheets.into_inner(), range.clone(), form.export.into()).await {
        Ok(report) => CrawlTemplate::finished(&range, report).into_response(),
        Err(e) => {
            log::error!("Crawl for {} ~ {} failed: {:?}", range.start, range.end, e);
            CrawlTemplate::failed(Some(&range), format!("An Error Occurred: {:#}", e))
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CrawlForm, DownloadLink, ExportChoice};
    use crate::services::TextExport;

    #[test]
    fn form_accepts_a_single_id() {
        let form = parse_form("start=&end=15000&export=text_file");

        assert_eq!(form.start, "");
        assert_eq!(form.end, "15000");
        assert_eq!(form.export, ExportChoice::TextFile);
    }

    #[test]
    fn download_link_embeds_export_data() {
        let export = TextExport {
            label: "Text File ~ 2".to_string(),
            file_name: "Text_File_2.txt".to_string(),
            data: "hi".to_string(),
        };
        let link = DownloadLink::from(&export);

        assert_eq!(link.href, "data:text/plain;charset=utf-8;base64,aGk=");
        assert_eq!(link.file_name, "Text_File_2.txt");
    }

    fn parse_form(body: &str) -> CrawlForm {
        let fields: serde_json::Map<String, serde_json::Value> =
            url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect();
        serde_json::from_value(serde_json::Value::Object(fields)).unwrap()
    }
}
