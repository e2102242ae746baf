use std::sync::Arc;

use uuid::Uuid;

use crate::{
    configuration::CrawlerSettings,
    domain::{
        plan_fields::extract,
        plan_page::{PageState, PlanRange},
        sheet_row::SheetRow,
    },
};

use super::{
    sheets_client::HEADER_RANGE, BrowserNavigator, DispatchSummary, Droid, PlanNavigator,
    SheetsClient, SinkDispatcher,
};

pub enum ExportTarget {
    GoogleSheet,
    TextFile,
}

/// Where the pages of one crawl end up.
pub enum CrawlOutput {
    Sheet(SinkDispatcher),
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextExport {
    pub label: String,
    pub file_name: String,
    pub data: String,
}

impl TextExport {
    fn for_batch(last_id: u32, data: String) -> Self {
        TextExport {
            label: format!("Text File ~ {}", last_id),
            file_name: format!("Text_File_{}.txt", last_id),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub sheet_link: Option<String>,
    pub pages: usize,
    pub active: usize,
    pub expired: usize,
    pub unknown: usize,
    pub server_errors: usize,
    pub rows_sent: usize,
    pub rows_failed: usize,
    pub text_exports: Vec<TextExport>,
}

impl CrawlReport {
    fn new(run_id: Uuid) -> Self {
        CrawlReport {
            run_id,
            sheet_link: None,
            pages: 0,
            active: 0,
            expired: 0,
            unknown: 0,
            server_errors: 0,
            rows_sent: 0,
            rows_failed: 0,
            text_exports: vec![],
        }
    }

    fn count_page(&mut self, state: PageState) {
        self.pages += 1;
        match state {
            PageState::Active => self.active += 1,
            PageState::Expired => self.expired += 1,
            PageState::Unknown => self.unknown += 1,
        }
    }

    fn add_dispatch(&mut self, summary: DispatchSummary) {
        self.rows_sent += summary.sent;
        self.rows_failed += summary.failed;
    }
}

/// Visits every plan in `range` one batch at a time. All appends started in a
/// batch are joined before the next batch begins, including when a visit fails.
pub async fn crawl_plans<N: PlanNavigator + ?Sized>(
    navigator: &mut N,
    range: &PlanRange,
    batch_size: usize,
    mut output: CrawlOutput,
) -> anyhow::Result<CrawlReport> {
    let mut report = CrawlReport::new(Uuid::new_v4());
    log::info!(
        "Crawl {} started for plans {} ~ {}",
        report.run_id,
        range.start,
        range.end
    );

    for batch in range.batches(batch_size) {
        let mut crawled_text = String::new();

        for &id in batch.iter() {
            let url = range.page_url(id);
            let record = match navigator.visit(&url).await {
                Ok(record) => record,
                Err(e) => {
                    if let CrawlOutput::Sheet(dispatcher) = &mut output {
                        report.add_dispatch(dispatcher.join().await);
                    }
                    log::error!("Crawl {} stopped at {}: {:?}", report.run_id, url, e);
                    return Err(e);
                }
            };
            log::info!("Plan {} is {:?}", id, record.state);
            report.count_page(record.state);

            match &mut output {
                CrawlOutput::Sheet(dispatcher) => {
                    let fields = extract(&record.raw_text);
                    if fields.error().is_some() {
                        report.server_errors += 1;
                    }
                    dispatcher.dispatch(SheetRow::new(&record.url, fields, record.state));
                }
                CrawlOutput::Text => match record.state {
                    PageState::Unknown => {
                        crawled_text.push_str(&format!("{} failed\n\n", record.url))
                    }
                    _ => {
                        crawled_text.push_str(&record.raw_text);
                        crawled_text.push_str("\n\n");
                    }
                },
            }
        }

        let last_id = batch.last().copied().unwrap_or(range.end);
        match &mut output {
            CrawlOutput::Sheet(dispatcher) => {
                let summary = dispatcher.join().await;
                log::info!(
                    "Crawl {} batch ~ {} appended {} rows, {} failed",
                    report.run_id,
                    last_id,
                    summary.sent,
                    summary.failed
                );
                report.add_dispatch(summary);
            }
            CrawlOutput::Text => report
                .text_exports
                .push(TextExport::for_batch(last_id, crawled_text)),
        }
    }

    log::info!(
        "Crawl {} finished: {} pages, {} active, {} expired, {} unknown",
        report.run_id,
        report.pages,
        report.active,
        report.expired,
        report.unknown
    );

    Ok(report)
}

/// Full crawl behind the web form: provisions the sheet when exporting to
/// google, drives the browser across the range and tidies the sheet afterwards.
pub async fn run_crawl_job(
    settings: &CrawlerSettings,
    sheets: Arc<SheetsClient>,
    range: PlanRange,
    target: ExportTarget,
) -> anyhow::Result<CrawlReport> {
    let sheet = match target {
        ExportTarget::GoogleSheet => {
            let sheet = sheets.create_spreadsheet(&range.sheet_title()).await?;
            sheets
                .append_rows(&sheet.id, HEADER_RANGE, &[&SheetRow::header()])
                .await?;
            sheets.format_header_trim(&sheet.id, 0).await?;
            Some(sheet)
        }
        ExportTarget::TextFile => None,
    };

    let output = match &sheet {
        Some(sheet) => CrawlOutput::Sheet(SinkDispatcher::new(sheets.clone(), &sheet.id)),
        None => CrawlOutput::Text,
    };

    let droid = Droid::new(settings).await?;
    let mut navigator = BrowserNavigator::new(droid, settings);
    let crawled = crawl_plans(&mut navigator, &range, settings.batch_size, output).await;
    if let Err(e) = navigator.close().await {
        log::error!("Failed to close chrome session: {:?}", e);
    }
    let mut report = crawled?;

    if let Some(sheet) = sheet {
        sheets.auto_resize_columns(&sheet.id, 0).await?;
        report.sheet_link = Some(sheet.web_view_link);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{atomic::Ordering, Arc},
    };

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::{crawl_plans, CrawlOutput};
    use crate::{
        domain::plan_page::{PageRecord, PageState, PlanRange},
        services::{dispatcher::tests::RecordingSink, PlanNavigator, SinkDispatcher},
    };

    const BASE_URL: &str = "https://www.moyoplan.com/plans/";

    /// Serves canned pages; any id in `broken` fails the visit.
    #[derive(Default)]
    struct FakeNavigator {
        pages: HashMap<String, PageRecord>,
        broken: Vec<String>,
        visited: Vec<String>,
    }

    impl FakeNavigator {
        fn with_page(mut self, id: u32, state: PageState, text: &str) -> Self {
            let url = format!("{}{}", BASE_URL, id);
            self.pages
                .insert(url.clone(), PageRecord::new(url, state, text));
            self
        }
    }

    #[async_trait]
    impl PlanNavigator for FakeNavigator {
        async fn visit(&mut self, url: &str) -> anyhow::Result<PageRecord> {
            self.visited.push(url.to_string());
            if self.broken.iter().any(|b| b == url) {
                return Err(anyhow!("session lost on {}", url));
            }

            Ok(self
                .pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| PageRecord::new(url, PageState::Active, "")))
        }
    }

    #[tokio::test]
    async fn sheet_crawl_appends_one_row_per_page() {
        let range = PlanRange::from_params(BASE_URL, "1", "7").unwrap();
        let mut navigator = FakeNavigator::default()
            .with_page(1, PageState::Active, "[ACME] Basic Plan | 10,000원 |")
            .with_page(2, PageState::Expired, "[OLD] Gone | 5,000원 |")
            .with_page(3, PageState::Unknown, "")
            .with_page(4, PageState::Active, "서버에 문제가 생겼어요");
        let sink = Arc::new(RecordingSink::default());
        let output = CrawlOutput::Sheet(SinkDispatcher::new(sink.clone(), "sheet-9"));

        let report = crawl_plans(&mut navigator, &range, 3, output).await.unwrap();

        assert_eq!(report.pages, 7);
        assert_eq!((report.active, report.expired, report.unknown), (5, 1, 1));
        assert_eq!(report.server_errors, 1);
        assert_eq!((report.rows_sent, report.rows_failed), (7, 0));
        assert!(report.text_exports.is_empty());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 7);

        let rows = sink.rows.lock().unwrap();
        let by_url: HashMap<&str, &Vec<String>> =
            rows.iter().map(|(_, cells)| (cells[0].as_str(), cells)).collect();
        let first = by_url[format!("{}1", BASE_URL).as_str()];
        assert_eq!(first[1], "ACME");
        assert_eq!(first[16], "서비스 중입니다");
        assert_eq!(by_url[format!("{}2", BASE_URL).as_str()][16], "종료 되었습니다");
        assert_eq!(by_url[format!("{}3", BASE_URL).as_str()][16], "확인 불가");
        assert_eq!(
            by_url[format!("{}4", BASE_URL).as_str()][16],
            "모요 서버에 문제가 생겼어요"
        );
    }

    #[tokio::test]
    async fn pages_are_visited_in_order() {
        let range = PlanRange::from_params(BASE_URL, "10", "14").unwrap();
        let mut navigator = FakeNavigator::default();
        let sink = Arc::new(RecordingSink::default());
        let output = CrawlOutput::Sheet(SinkDispatcher::new(sink, "sheet-9"));

        crawl_plans(&mut navigator, &range, 2, output).await.unwrap();

        let expected: Vec<String> = (10..=14).map(|id| format!("{}{}", BASE_URL, id)).collect();
        assert_eq!(navigator.visited, expected);
    }

    #[tokio::test]
    async fn failed_visit_joins_started_appends() {
        let range = PlanRange::from_params(BASE_URL, "1", "5").unwrap();
        let mut navigator = FakeNavigator {
            broken: vec![format!("{}4", BASE_URL)],
            ..Default::default()
        };
        let sink = Arc::new(RecordingSink::default());
        let output = CrawlOutput::Sheet(SinkDispatcher::new(sink.clone(), "sheet-9"));

        let result = crawl_plans(&mut navigator, &range, 50, output).await;

        assert!(result.is_err());
        assert_eq!(navigator.visited.len(), 4);
        assert_eq!(sink.rows.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn text_crawl_exports_one_file_per_batch() {
        let range = PlanRange::from_params(BASE_URL, "1", "5").unwrap();
        let mut navigator = FakeNavigator::default()
            .with_page(1, PageState::Active, "첫 요금제")
            .with_page(2, PageState::Unknown, "")
            .with_page(5, PageState::Expired, "종료 요금제");

        let report = crawl_plans(&mut navigator, &range, 2, CrawlOutput::Text)
            .await
            .unwrap();

        let labels: Vec<&str> = report.text_exports.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Text File ~ 2", "Text File ~ 4", "Text File ~ 5"]);
        assert_eq!(report.text_exports[0].file_name, "Text_File_2.txt");
        assert_eq!(
            report.text_exports[0].data,
            format!("첫 요금제\n\n{}2 failed\n\n", BASE_URL)
        );
        assert_eq!(report.text_exports[2].data, "종료 요금제\n\n");
        assert_eq!((report.rows_sent, report.rows_failed), (0, 0));
    }
}
