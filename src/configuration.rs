use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub crawler: CrawlerSettings,
    pub google: GoogleSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct CrawlerSettings {
    pub base_url: String,
    pub webdriver_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub wait_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub batch_size: usize,
    pub headless: bool,
}

impl CrawlerSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

#[derive(Deserialize, Clone)]
pub struct GoogleSettings {
    pub credentials_path: String,
    pub drive_api_url: String,
    pub sheets_api_url: String,
    pub share_with_anyone: bool,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Message(e.to_string()))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // APP_CRAWLER__BATCH_SIZE=20 sets `Settings.crawler.batch_size`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::Environment;

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Environment = "Production".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
    }

    #[test]
    fn environment_rejects_unknown_names() {
        let env: Result<Environment, String> = "staging".to_string().try_into();
        assert!(env.is_err());
    }
}
