use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub perenual_key: Option<String>,
    pub plant_api_url: String,
    pub wikipedia_api_url: String,
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    /// Reads the environment, after loading a `.env` file if there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS inválido: '{}'", raw))?,
            ),
            Err(_) => Duration::from_secs(10),
        };

        let data_dir = env::var_os("PLANTITAS_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("plantitas")))
            .unwrap_or_else(|| PathBuf::from(".plantitas"));

        Ok(Self {
            mongo_uri: env::var("MONGO_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017/plantitas".to_string()),
            mongo_db: env::var("MONGO_DB").unwrap_or_else(|_| "plantitas".to_string()),
            perenual_key: env::var("PERENUAL_KEY").ok().filter(|k| !k.trim().is_empty()),
            plant_api_url: env::var("PLANT_API_URL")
                .unwrap_or_else(|_| "https://perenual.com/api".to_string()),
            wikipedia_api_url: env::var("WIKIPEDIA_API_URL")
                .unwrap_or_else(|_| "https://en.wikipedia.org/w/api.php".to_string()),
            data_dir,
            http_timeout,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}
