use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thirtyfour::prelude::*;
use tokio::time::Instant;

use crate::{
    configuration::CrawlerSettings,
    domain::plan_page::{html_to_text, PageRecord, PageState},
};

use super::Droid;

/// Button that opens the full plan detail panel.
const DETAIL_BUTTON_XPATH: &str = "//button[contains(@class, 'css-yg1ktq')]";
/// Appears once the detail panel has rendered.
const DETAIL_PANEL_CLASS: &str = "css-1ipix51";

#[async_trait]
pub trait PlanNavigator: Send {
    async fn visit(&mut self, url: &str) -> anyhow::Result<PageRecord>;
}

pub struct BrowserNavigator {
    droid: Droid,
    client: reqwest::Client,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl BrowserNavigator {
    pub fn new(droid: Droid, settings: &CrawlerSettings) -> Self {
        BrowserNavigator {
            droid,
            client: reqwest::Client::new(),
            wait_timeout: settings.wait_timeout(),
            poll_interval: settings.poll_interval(),
        }
    }

    pub async fn close(self) -> anyhow::Result<()> {
        self.droid.quit().await
    }

    /// Polls for a native alert until the wait timeout runs out.
    async fn alert_shown(&self) -> bool {
        let deadline = Instant::now() + self.wait_timeout;

        loop {
            if self.droid.driver.get_alert_text().await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn open_detail_panel(&self) -> WebDriverResult<()> {
        let driver = &self.droid.driver;

        let button = driver
            .query(By::XPath(DETAIL_BUTTON_XPATH))
            .wait(self.wait_timeout, self.poll_interval)
            .and_clickable()
            .first()
            .await?;
        driver
            .execute("arguments[0].click();", vec![button.to_json()?])
            .await?;

        driver
            .query(By::ClassName(DETAIL_PANEL_CLASS))
            .wait(self.wait_timeout, self.poll_interval)
            .first()
            .await?;

        Ok(())
    }

    /// Expired plans only render server side, so they are fetched without the browser.
    async fn fetch_expired(&self, url: &str) -> anyhow::Result<PageRecord> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch expired plan {}", url))?;

        if !res.status().is_success() {
            log::error!("Expired plan {} answered with {}", url, res.status());
            return Ok(PageRecord::new(url, PageState::Unknown, ""));
        }

        let html = res.text().await?;
        Ok(PageRecord::new(url, PageState::Expired, html_to_text(&html)))
    }
}

#[async_trait]
impl PlanNavigator for BrowserNavigator {
    async fn visit(&mut self, url: &str) -> anyhow::Result<PageRecord> {
        let driver = &self.droid.driver;
        driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;

        if self.alert_shown().await {
            driver.accept_alert().await?;
            return self.fetch_expired(url).await;
        }

        driver.refresh().await?;
        let state = match self.open_detail_panel().await {
            Ok(()) => PageState::Active,
            Err(e) => {
                log::error!("Plan detail panel never showed on {}: {:?}", url, e);
                PageState::Unknown
            }
        };

        let html = driver.source().await?;
        Ok(PageRecord::new(url, state, html_to_text(&html)))
    }
}
