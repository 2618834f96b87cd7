use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub listing_path: String,
    pub csv_path: String,
    pub image_dir: String,
    pub checkpoint_path: String,
    pub user_agent: String,
    pub accept_language: String,
    pub item_delay_secs: u64,
    pub page_delay_secs: u64,
    pub retry_base_secs: u64,
    pub max_retries: u32,
    pub resume: bool,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let settings: Settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn listing_url(&self, page: u32) -> String {
        format!("{}{}?page={}", self.base_url, self.listing_path, page)
    }

    pub fn listing_root(&self) -> String {
        format!("{}{}", self.base_url, self.listing_path)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://www.regard.ru".to_string(),
            listing_path: "/catalog/1013/videokarty".to_string(),
            csv_path: "videokarty.csv".to_string(),
            image_dir: "images/videokarty".to_string(),
            checkpoint_path: "videokarty.checkpoint.json".to_string(),
            user_agent: "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Mobile Safari/537.36".to_string(),
            accept_language: "ru".to_string(),
            item_delay_secs: 5,
            page_delay_secs: 5,
            retry_base_secs: 60,
            max_retries: 4,
            resume: true,
        }
    }
}
