use anyhow::{bail, Context};
use itertools::Itertools;
use scraper::Html;
use url::Url;

/// How a plan page presented itself when it was visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// The page loaded and the plan detail panel could be opened.
    Active,
    /// The site raised an alert saying the plan is no longer offered.
    Expired,
    /// Neither the alert nor the detail panel showed up in time.
    Unknown,
}

impl PageState {
    pub fn status_label(&self) -> &'static str {
        match self {
            PageState::Active => "서비스 중입니다",
            PageState::Expired => "종료 되었습니다",
            PageState::Unknown => "확인 불가",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub url: String,
    pub state: PageState,
    pub raw_text: String,
}

impl PageRecord {
    pub fn new(url: impl Into<String>, state: PageState, raw_text: impl Into<String>) -> Self {
        PageRecord {
            url: url.into(),
            state,
            raw_text: raw_text.into(),
        }
    }
}

/// Flattens an html document into its visible text, skipping script and style bodies.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| e.name()))
                .is_some_and(|name| name == "script" || name == "style");

            match hidden {
                true => None,
                false => Some(&**text),
            }
        })
        .collect()
}

/// An inclusive range of plan ids sharing one url prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRange {
    prefix: String,
    pub start: u32,
    pub end: u32,
}

impl PlanRange {
    /// Builds the range from two plan urls whose last path segment is the plan id.
    /// Page urls are rebuilt from the first url's prefix.
    pub fn from_urls(first_url: &str, last_url: &str) -> anyhow::Result<Self> {
        let (prefix, start) = split_plan_url(first_url)?;
        let (_, end) = split_plan_url(last_url)?;

        Ok(PlanRange {
            prefix: prefix.to_string(),
            start,
            end,
        })
    }

    /// Builds the range from the two id inputs of the crawl form.
    /// When only one id is given the range holds just that plan.
    pub fn from_params(base_url: &str, start: &str, end: &str) -> anyhow::Result<Self> {
        let base_url = match base_url.ends_with('/') {
            true => base_url.to_string(),
            false => format!("{}/", base_url),
        };

        match (start.trim(), end.trim()) {
            ("", "") => bail!("Please enter at least one end parameter."),
            (only, "") | ("", only) => {
                let url = format!("{}{}", base_url, only);
                PlanRange::from_urls(&url, &url)
            }
            (start, end) => PlanRange::from_urls(
                &format!("{}{}", base_url, start),
                &format!("{}{}", base_url, end),
            ),
        }
    }

    pub fn page_url(&self, id: u32) -> String {
        format!("{}{}", self.prefix, id)
    }

    pub fn len(&self) -> usize {
        match self.start <= self.end {
            true => (self.end - self.start) as usize + 1,
            false => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits the ids into consecutive batches of at most `batch_size`.
    pub fn batches(&self, batch_size: usize) -> Vec<Vec<u32>> {
        let chunks = (self.start..=self.end).chunks(batch_size.max(1));
        let batches: Vec<Vec<u32>> = chunks.into_iter().map(|c| c.collect()).collect();
        batches
    }

    pub fn sheet_title(&self) -> String {
        format!("모요 요금제 {} ~ {}", self.start, self.end)
    }
}

fn split_plan_url(raw: &str) -> anyhow::Result<(&str, u32)> {
    Url::parse(raw).with_context(|| format!("Not a valid plan url: {}", raw))?;

    let Some((prefix, id)) = raw.rsplit_once('/') else {
        bail!("Plan url has no path: {}", raw);
    };
    let id = id
        .parse::<u32>()
        .with_context(|| format!("Plan url does not end with a plan number: {}", raw))?;

    Ok((&raw[..prefix.len() + 1], id))
}
