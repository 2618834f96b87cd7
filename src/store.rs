use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

const HEADER: [&str; 4] = ["Product Title", "Product Image", "Price", "Characteristics"];

// Extension candidates in preference order; png stays the default for
// responses with a missing or unrecognized Content-Type.
const IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    #[serde(rename = "Product Title")]
    pub title: String,
    #[serde(rename = "Product Image")]
    pub image_path: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Characteristics")]
    pub characteristics: String,
}

impl ProductRecord {
    // Identity excludes image_path: a re-crawl that derives a different
    // filename must still recognize the same product.
    fn dedup_key(&self) -> (String, String, String) {
        (
            self.title.clone(),
            self.price.clone(),
            self.characteristics.clone(),
        )
    }
}

/// Append-only CSV store with an in-memory duplicate index rebuilt from the
/// file at startup.
pub struct RecordStore {
    path: PathBuf,
    seen: HashSet<(String, String, String)>,
    data_rows: usize,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScrapeError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let mut writer = WriterBuilder::new().from_path(&path)?;
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        let file = File::open(&path)?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut seen = HashSet::new();
        let mut data_rows = 0;
        for result in reader.deserialize() {
            let record: ProductRecord = result?;
            seen.insert(record.dedup_key());
            data_rows += 1;
        }

        Ok(Self {
            path,
            seen,
            data_rows,
        })
    }

    pub fn contains(&self, record: &ProductRecord) -> bool {
        self.seen.contains(&record.dedup_key())
    }

    pub fn append(&mut self, record: &ProductRecord) -> Result<(), ScrapeError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        self.seen.insert(record.dedup_key());
        self.data_rows += 1;
        Ok(())
    }

    pub fn data_rows(&self) -> usize {
        self.data_rows
    }

    /// Row count including the header, matching the run summary arithmetic.
    pub fn total_rows(&self) -> usize {
        self.data_rows + 1
    }
}

pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, ScrapeError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of an already-downloaded image for this stem, if any extension
    /// candidate exists on disk. Existing files are never overwritten.
    pub fn find(&self, stem: &str) -> Option<PathBuf> {
        IMAGE_TYPES
            .iter()
            .map(|(_, ext)| self.dir.join(format!("{stem}.{ext}")))
            .find(|path| path.exists())
    }

    pub fn save(
        &self,
        stem: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<PathBuf, ScrapeError> {
        let extension = content_type
            .and_then(|value| {
                IMAGE_TYPES
                    .iter()
                    .find(|(mime, _)| value.starts_with(mime))
                    .map(|(_, ext)| *ext)
            })
            .unwrap_or("png");

        let path = self.dir.join(format!("{stem}.{extension}"));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointState {
    last_page: u32,
}

/// Persists the last fully processed listing page so the next run can skip
/// pages it already walked. Content dedup stays the correctness backstop.
pub struct Checkpoint;

impl Checkpoint {
    pub fn load<P: AsRef<Path>>(path: P) -> Option<u32> {
        let contents = fs::read_to_string(path).ok()?;
        let state: CheckpointState = serde_json::from_str(&contents).ok()?;
        Some(state.last_page)
    }

    pub fn store<P: AsRef<Path>>(path: P, last_page: u32) -> Result<(), ScrapeError> {
        let state = CheckpointState { last_page };
        fs::write(path, serde_json::to_string(&state)?)?;
        Ok(())
    }
}
