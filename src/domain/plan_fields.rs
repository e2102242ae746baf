use once_cell::sync::Lazy;
use regex::Regex;

/// Written into a cell whenever its pattern finds nothing on the page.
pub const NOT_PROVIDED: &str = "제공안함";

/// Written into every field cell when the site served its error page.
pub const BLANK: &str = "-";

pub const FIELD_COUNT: usize = 15;

const SERVER_ERROR_BANNER: &str = "서버에 문제가 생겼어요";

static MVNO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").unwrap());
static PLAN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\s*(.*?)\s*\|").unwrap());
static MONTHLY_FEE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|\s*([\d,]+원)\s*\|").unwrap());
static MONTHLY_DATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"월\s*([.\d]+(?:GB|MB))").unwrap());
static DAILY_DATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"매일\s*([.\d]+(?:GB|MB))").unwrap());
static DATA_SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([.\d]+(?:mbps|gbps))\)").unwrap());
static CALL_MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+분|무제한)").unwrap());
static TEXT_MESSAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+건|무제한)").unwrap());
static CARRIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(LG U\+|SKT|KT)").unwrap());
static NETWORK_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(LTE|3G|4G|5G)").unwrap());
static DISCOUNT_INFO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+개월\s*이후\s*[\d,]+원)").unwrap());
static CONTRACT_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"통신사 약정(.*?)(?:통화|펼쳐보기)").unwrap());
static NUMBER_TRANSFER_FEE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"번호이동 수수료(.*?)일반 유심 배송").unwrap());
static NFC_SIM_DELIVERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NFC 유심 배송(.*?)eSIM").unwrap());

/// The attributes pulled out of a plan page, in sheet column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanField {
    Mvno,
    PlanName,
    MonthlyFee,
    MonthlyData,
    DailyData,
    DataSpeed,
    CallMinutes,
    TextMessages,
    Carrier,
    NetworkType,
    DiscountInfo,
    ContractTerm,
    NumberTransferFee,
    NfcSimDelivery,
    Esim,
}

impl PlanField {
    pub const ALL: [PlanField; FIELD_COUNT] = [
        PlanField::Mvno,
        PlanField::PlanName,
        PlanField::MonthlyFee,
        PlanField::MonthlyData,
        PlanField::DailyData,
        PlanField::DataSpeed,
        PlanField::CallMinutes,
        PlanField::TextMessages,
        PlanField::Carrier,
        PlanField::NetworkType,
        PlanField::DiscountInfo,
        PlanField::ContractTerm,
        PlanField::NumberTransferFee,
        PlanField::NfcSimDelivery,
        PlanField::Esim,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            PlanField::Mvno => "MVNO",
            PlanField::PlanName => "요금제명",
            PlanField::MonthlyFee => "월요금",
            PlanField::MonthlyData => "월 데이터",
            PlanField::DailyData => "일 데이터",
            PlanField::DataSpeed => "데이터 속도",
            PlanField::CallMinutes => "통화(분)",
            PlanField::TextMessages => "문자(건)",
            PlanField::Carrier => "통신사",
            PlanField::NetworkType => "망종류",
            PlanField::DiscountInfo => "할인정보",
            PlanField::ContractTerm => "통신사 약정",
            PlanField::NumberTransferFee => "번호이동 수수료",
            PlanField::NfcSimDelivery => "NFC 유심 배송",
            PlanField::Esim => "eSim",
        }
    }

    /// Leftmost match of this field's pattern, first capture group only.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        let pattern = match self {
            PlanField::Mvno => &MVNO,
            PlanField::PlanName => &PLAN_NAME,
            PlanField::MonthlyFee => &MONTHLY_FEE,
            PlanField::MonthlyData => &MONTHLY_DATA,
            PlanField::DailyData => &DAILY_DATA,
            PlanField::DataSpeed => &DATA_SPEED,
            PlanField::CallMinutes => &CALL_MINUTES,
            PlanField::TextMessages => &TEXT_MESSAGES,
            PlanField::Carrier => &CARRIER,
            PlanField::NetworkType => &NETWORK_TYPE,
            PlanField::DiscountInfo => &DISCOUNT_INFO,
            PlanField::ContractTerm => &CONTRACT_TERM,
            PlanField::NumberTransferFee => &NUMBER_TRANSFER_FEE,
            PlanField::NfcSimDelivery => &NFC_SIM_DELIVERY,
            PlanField::Esim => return find_esim_support(text),
        };

        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Span between `eSIM` and the first `지원` on the same line that is not a
/// "지원 안함" / "지원 안 함".
fn find_esim_support(text: &str) -> Option<&str> {
    const START: &str = "eSIM";
    const END: &str = "지원";

    text.match_indices(START).find_map(|(at, _)| {
        let tail = &text[at + START.len()..];
        let line = tail.split('\n').next().unwrap_or_default();

        line.match_indices(END).find_map(|(end_at, _)| {
            let after = &line[end_at + END.len()..];
            match after.starts_with(" 안함") || after.starts_with(" 안 함") {
                true => None,
                false => Some(&line[..end_at]),
            }
        })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    values: Vec<String>,
    error: Option<String>,
}

impl ExtractedFields {
    fn server_error() -> Self {
        ExtractedFields {
            values: vec![BLANK.to_string(); FIELD_COUNT],
            error: Some(format!("모요 {}", SERVER_ERROR_BANNER)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, field: PlanField) -> &str {
        let index = PlanField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        &self.values[index]
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Set when the page was the site's error page rather than a plan.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_parts(self) -> (Vec<String>, Option<String>) {
        (self.values, self.error)
    }
}

pub fn extract(text: &str) -> ExtractedFields {
    if text.contains(SERVER_ERROR_BANNER) {
        return ExtractedFields::server_error();
    }

    let values = PlanField::ALL
        .iter()
        .map(|field| field.find(text).unwrap_or(NOT_PROVIDED).to_string())
        .collect();

    ExtractedFields {
        values,
        error: None,
    }
}
