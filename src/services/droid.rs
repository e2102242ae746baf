use anyhow::Context;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

use crate::configuration::CrawlerSettings;

const CHROME_ARGS: [&str; 4] = [
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-extensions",
];

/// A single chrome session. Not shared: one crawl drives it from start to end.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &CrawlerSettings) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.add_arg("--headless")?;
        }
        for arg in CHROME_ARGS {
            caps.add_arg(arg)?;
        }

        // http://chrome:4444/wd/hub
        // http://localhost:9515
        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps)
            .await
            .with_context(|| format!("Failed to start a session on {}", settings.webdriver_url))?;

        log::info!("Started chrome session on {}", settings.webdriver_url);

        Ok(Droid { driver })
    }

    pub async fn quit(self) -> anyhow::Result<()> {
        self.driver.quit().await?;
        Ok(())
    }
}
