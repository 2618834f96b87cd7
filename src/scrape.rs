use std::time::Duration;

use url::Url;

use crate::config::Settings;
use crate::error::ScrapeError;
use crate::fetch::Fetcher;
use crate::parse;
use crate::store::{Checkpoint, ImageStore, ProductRecord, RecordStore};

enum ItemOutcome {
    Added,
    Duplicate,
}

pub struct RegardScraper {
    settings: Settings,
    fetcher: Fetcher,
    store: RecordStore,
    images: ImageStore,
    added: usize,
    failed: usize,
}

impl RegardScraper {
    pub fn new(settings: Settings) -> Result<Self, ScrapeError> {
        let fetcher = Fetcher::new(
            &settings.user_agent,
            &settings.accept_language,
            settings.max_retries,
            Duration::from_secs(settings.retry_base_secs),
        )?;
        let store = RecordStore::open(&settings.csv_path)?;
        let images = ImageStore::new(&settings.image_dir)?;

        tracing::info!(
            existing = store.data_rows(),
            csv = %settings.csv_path,
            "Opened record store"
        );

        Ok(Self {
            settings,
            fetcher,
            store,
            images,
            added: 0,
            failed: 0,
        })
    }

    pub async fn run(&mut self) -> Result<(), ScrapeError> {
        if let Err(err) = self.fetcher.probe_load_more(&self.settings.listing_root()).await {
            tracing::warn!(error = %err, "Load-more probe failed, continuing anyway");
        }

        let mut page = self.start_page();
        loop {
            let url = self.settings.listing_url(page);
            tracing::info!(page, %url, "Fetching listing page");

            let html = self.fetcher.get_text(&url).await?;
            let links = parse::listing_links(&html);
            if links.is_empty() {
                tracing::info!(page, "No more products. Exiting.");
                break;
            }

            for link in links {
                match link {
                    Some(href) => self.handle_item(&href).await?,
                    None => tracing::error!(page, "Listing card without a product link"),
                }
                self.throttle(self.settings.item_delay_secs).await;
            }

            Checkpoint::store(&self.settings.checkpoint_path, page)?;
            page += 1;
            self.throttle(self.settings.page_delay_secs).await;
        }

        tracing::info!(
            failed = self.failed,
            "Added {}/{} products",
            self.added,
            self.store.total_rows()
        );
        Ok(())
    }

    pub fn added(&self) -> usize {
        self.added
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    fn start_page(&self) -> u32 {
        if !self.settings.resume {
            return 1;
        }
        match Checkpoint::load(&self.settings.checkpoint_path) {
            Some(last_page) => {
                tracing::info!(last_page, "Resuming after checkpointed page");
                last_page + 1
            }
            None => 1,
        }
    }

    // One bad item must not end the crawl; only an exhausted rate limit does.
    async fn handle_item(&mut self, href: &str) -> Result<(), ScrapeError> {
        match self.process_item(href).await {
            Ok(ItemOutcome::Added) => self.added += 1,
            Ok(ItemOutcome::Duplicate) => {}
            Err(ScrapeError::Gone { url }) => {
                tracing::warn!(%url, "Product is no longer available");
            }
            Err(ScrapeError::MissingImage { title }) => {
                tracing::warn!(%title, "Skipping product without image");
            }
            Err(err @ ScrapeError::RateLimitExhausted { .. }) => return Err(err),
            Err(err) => {
                self.failed += 1;
                tracing::error!(href, error = %err, "Failed to process product");
            }
        }
        Ok(())
    }

    async fn process_item(&mut self, href: &str) -> Result<ItemOutcome, ScrapeError> {
        let detail_url = Url::parse(&self.settings.base_url)?.join(href)?;
        let html = self.fetcher.get_text(detail_url.as_str()).await?;
        let parsed = parse::product_details(&html, &self.settings.base_url);

        let image_url = parsed.image_url.ok_or(ScrapeError::MissingImage {
            title: parsed.title.clone(),
        })?;
        let stem = parse::image_stem(&detail_url).ok_or(ScrapeError::MissingLink)?;

        let image_path = match self.images.find(&stem) {
            Some(existing) => existing,
            None => {
                let (bytes, content_type) = self.fetcher.get_bytes(&image_url).await?;
                self.images.save(&stem, &bytes, content_type.as_deref())?
            }
        };

        let record = ProductRecord {
            title: parsed.title,
            image_path: image_path.to_string_lossy().into_owned(),
            price: parsed.price,
            characteristics: parsed.characteristics,
        };

        if self.store.contains(&record) {
            tracing::warn!(title = %record.title, "Skipping duplicate product");
            Ok(ItemOutcome::Duplicate)
        } else {
            self.store.append(&record)?;
            tracing::info!(title = %record.title, "Added product");
            Ok(ItemOutcome::Added)
        }
    }

    async fn throttle(&self, secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}
