use super::{
    plan_fields::{ExtractedFields, PlanField},
    plan_page::PageState,
};

pub const COLUMN_COUNT: usize = 17;

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow(Vec<String>);

impl SheetRow {
    /// `url`, the 15 extracted fields, then the page status.
    /// An error annotation from the extractor takes the status cell.
    pub fn new(url: &str, fields: ExtractedFields, state: PageState) -> Self {
        let (values, error) = fields.into_parts();
        let status = error.unwrap_or_else(|| state.status_label().to_string());

        let mut cells = Vec::with_capacity(COLUMN_COUNT);
        cells.push(url.to_string());
        cells.extend(values);
        cells.push(status);

        SheetRow(cells)
    }

    pub fn header() -> Self {
        let mut cells = Vec::with_capacity(COLUMN_COUNT);
        cells.push("url".to_string());
        cells.extend(PlanField::ALL.iter().map(|f| f.header().to_string()));
        cells.push("종료 여부".to_string());

        SheetRow(cells)
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn url(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{SheetRow, COLUMN_COUNT};
    use crate::domain::{
        plan_fields::extract,
        plan_page::{html_to_text, PageState},
    };

    const ACTIVE_HTML: &str = include_str!("../../fixtures/active_plan.html");
    const ACTIVE_ROW: &str = include_str!("../../fixtures/active_plan.row.json");
    const EXPIRED_HTML: &str = include_str!("../../fixtures/expired_plan.html");
    const EXPIRED_ROW: &str = include_str!("../../fixtures/expired_plan.row.json");

    fn golden(row: &str) -> Vec<String> {
        serde_json::from_str(row).unwrap()
    }

    #[test]
    fn header_matches_sheet_layout() {
        let header = SheetRow::header();

        assert_eq!(
            header.cells(),
            [
                "url",
                "MVNO",
                "요금제명",
                "월요금",
                "월 데이터",
                "일 데이터",
                "데이터 속도",
                "통화(분)",
                "문자(건)",
                "통신사",
                "망종류",
                "할인정보",
                "통신사 약정",
                "번호이동 수수료",
                "NFC 유심 배송",
                "eSim",
                "종료 여부",
            ]
        );
    }

    #[test]
    fn active_fixture_matches_golden_row() {
        let url = "https://www.moyoplan.com/plans/15001";
        let row = SheetRow::new(url, extract(&html_to_text(ACTIVE_HTML)), PageState::Active);

        assert_eq!(row.cells(), golden(ACTIVE_ROW));
    }

    #[test]
    fn expired_fixture_matches_golden_row() {
        let url = "https://www.moyoplan.com/plans/15002";
        let row = SheetRow::new(
            url,
            extract(&html_to_text(EXPIRED_HTML)),
            PageState::Expired,
        );

        assert_eq!(row.cells(), golden(EXPIRED_ROW));
    }

    #[test]
    fn server_error_annotation_replaces_status() {
        let url = "https://www.moyoplan.com/plans/15003";
        let row = SheetRow::new(url, extract("서버에 문제가 생겼어요"), PageState::Active);

        assert_eq!(row.cells().len(), COLUMN_COUNT);
        assert_eq!(row.url(), url);
        assert!(row.cells()[1..16].iter().all(|c| c == "-"));
        assert_eq!(row.cells()[16], "모요 서버에 문제가 생겼어요");
    }

    #[test]
    fn unknown_page_is_labelled() {
        let row = SheetRow::new("https://www.moyoplan.com/plans/1", extract(""), PageState::Unknown);

        assert_eq!(row.cells().len(), COLUMN_COUNT);
        assert_eq!(row.cells()[16], "확인 불가");
    }
}
