#![allow(dead_code)]

pub mod counting_channel;
pub mod mock_transport;

use std::sync::Arc;
use tokio::sync::mpsc;

use counting_channel::CountingChannel;
use furigana::config::{MemorySettingsStore, StoredSettings};
use furigana::coordinator::Coordinator;
use furigana::core::ApiClient;
use furigana::host::TabHost;
use mock_transport::MockTransport;

pub const TEST_ENDPOINT: &str = "http://localhost:9000/furigana";
pub const TEST_KEY: &str = "sk-test";

pub const APPLY_TAG: &str = "furigana:apply-result";
pub const CACHE_TAG: &str = "furigana:cache-selection";

/// Background, pages and a scripted service wired together
pub struct TestContext {
    pub host: Arc<TabHost>,
    pub channel: Arc<CountingChannel>,
    pub transport: Arc<MockTransport>,
    pub settings: Arc<MemorySettingsStore>,
    pub coordinator: Arc<Coordinator>,
}

impl TestContext {
    /// Direct mode against the test endpoint, replying with `body`
    pub fn new(status: u16, body: &str) -> Self {
        Self::with_transport(MockTransport::replying(status, body))
    }

    pub fn with_transport(transport: MockTransport) -> Self {
        let settings = Arc::new(MemorySettingsStore::new(StoredSettings {
            api_endpoint: Some(TEST_ENDPOINT.to_string()),
            api_key: Some(TEST_KEY.to_string()),
            use_proxy: Some(false),
            ..Default::default()
        }));
        let transport = Arc::new(transport);

        let (background_tx, background_rx) = mpsc::unbounded_channel();
        let host = Arc::new(TabHost::new(Some(background_tx)));
        let channel = Arc::new(CountingChannel::new(host.clone()));
        let client = ApiClient::new(settings.clone(), transport.clone());
        let coordinator = Arc::new(Coordinator::new(client, channel.clone()));
        tokio::spawn(coordinator.clone().serve(background_rx));

        Self {
            host,
            channel,
            transport,
            settings,
            coordinator,
        }
    }

    /// A page with its agent loaded and `selected` as the live selection
    pub fn page_with_selection(&self, html: &str, selected: &str) -> u32 {
        let page = self
            .host
            .open_page_with_agent(html)
            .expect("Failed to load agent");
        self.host.select_text(page, selected).expect("Failed to select");
        page
    }

    pub fn html(&self, page: u32) -> String {
        self.host.page_html(page).expect("No such page")
    }

    pub fn status_message(&self, page: u32) -> Option<String> {
        self.host.status(page).and_then(|status| status.message)
    }
}
