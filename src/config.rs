use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use crate::models::resource::Coordinate;
use crate::services::image_analysis::DEFAULT_MODEL;

/// `DATABASE_URL` value that selects the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Sample patrol images shipped under `static/patrol/`.
const PATROL_IMAGE_DIR: &str = "static/patrol";
const DEFAULT_PATROL_IMAGES: [&str; 6] = [
    "charging-station",
    "parking-lot",
    "street-lamp",
    "road-debris",
    "abandoned-car",
    "substation",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Security
    pub session_secret: Secret<String>,

    // Vision inference gateway
    pub vision_api_url: Option<String>,
    pub vision_api_key: Option<Secret<String>>,
    pub vision_model: String,

    // Drone patrol simulation
    pub patrol_detection_delay_secs: u64,
    pub patrol_reference_lat: f64,
    pub patrol_reference_lng: f64,
    pub patrol_image_urls: Vec<String>,

    // Simulated checkout
    pub payment_delay_ms: u64,

    pub maintenance_cron: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let base_url: String = config.get("base_url")?;

        let patrol_image_urls = config
            .get::<String>("patrol_image_urls")
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let patrol_image_urls = if patrol_image_urls.is_empty() {
            default_patrol_images(&base_url)
        } else {
            patrol_image_urls
        };

        Ok(Self {
            database_url: config.get("database_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            session_secret: Secret::new(config.get("session_secret")?),

            vision_api_url: config
                .get::<String>("vision_api_url")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            vision_api_key: config
                .get::<String>("vision_api_key")
                .ok()
                .filter(|key| !key.trim().is_empty())
                .map(Secret::new),
            vision_model: config
                .get("vision_model")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),

            patrol_detection_delay_secs: config.get("patrol_detection_delay_secs").unwrap_or(5),
            patrol_reference_lat: config.get("patrol_reference_lat").unwrap_or(48.8566),
            patrol_reference_lng: config.get("patrol_reference_lng").unwrap_or(2.3522),
            patrol_image_urls,

            payment_delay_ms: config.get("payment_delay_ms").unwrap_or(2000),

            maintenance_cron: config
                .get("maintenance_cron")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),

            base_url,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }

    pub fn patrol_detection_delay(&self) -> Duration {
        Duration::from_secs(self.patrol_detection_delay_secs)
    }

    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }

    pub fn patrol_reference_point(&self) -> Coordinate {
        Coordinate::new(self.patrol_reference_lat, self.patrol_reference_lng)
    }

    /// In-memory store, no delays, no vision gateway.
    pub fn for_tests() -> Self {
        let base_url = "http://localhost:3000".to_string();
        Self {
            database_url: MEMORY_DATABASE_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            session_secret: Secret::new("test-secret".to_string()),
            vision_api_url: None,
            vision_api_key: None,
            vision_model: DEFAULT_MODEL.to_string(),
            patrol_detection_delay_secs: 0,
            patrol_reference_lat: 48.8566,
            patrol_reference_lng: 2.3522,
            patrol_image_urls: default_patrol_images(&base_url),
            payment_delay_ms: 0,
            maintenance_cron: "0 */5 * * * *".to_string(),
            base_url,
        }
    }
}

fn default_patrol_images(base_url: &str) -> Vec<String> {
    DEFAULT_PATROL_IMAGES
        .iter()
        .map(|name| {
            format!(
                "{}/{}/{}.png",
                base_url.trim_end_matches('/'),
                PATROL_IMAGE_DIR,
                name
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patrol_images() {
        let urls = default_patrol_images("https://connecta.example/");
        assert_eq!(urls.len(), 6);
        assert_eq!(urls[0], "https://connecta.example/static/patrol/charging-station.png");
    }

    #[test]
    fn test_default_patrol_images_are_shipped() {
        let config = Config::for_tests();
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));

        for url in &config.patrol_image_urls {
            let relative = url
                .strip_prefix(&format!("{}/", config.base_url))
                .unwrap();
            let path = root.join(relative);
            let bytes = std::fs::read(&path)
                .unwrap_or_else(|e| panic!("{} is missing: {}", path.display(), e));
            assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", path.display());
        }
    }

    #[test]
    fn test_test_config_uses_memory_store() {
        let config = Config::for_tests();
        assert!(config.uses_memory_store());
        assert_eq!(config.payment_delay(), Duration::ZERO);
        assert_eq!(config.patrol_reference_point().latitude, 48.8566);
    }
}
