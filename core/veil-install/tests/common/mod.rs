#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use veil_crypto::EnvelopeCodec;
use veil_install::{
    InstallConfig, InstallError, InstallResult, Installer, LinkResolver, UrlOpener,
};
use veil_storage::{KeyValueStore, MemoryStore};

/// Records every URL it is asked to open. URLs containing any of the
/// `reject` fragments fail.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
    reject: Vec<String>,
}

impl RecordingOpener {
    pub fn rejecting(fragments: &[&str]) -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            reject: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlOpener for RecordingOpener {
    async fn open(&self, url: &str) -> InstallResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.reject.iter().any(|f| url.contains(f.as_str())) {
            return Err(InstallError::Open(format!("refused {url}")));
        }
        Ok(())
    }
}

pub fn resolver() -> LinkResolver {
    LinkResolver::new(InstallConfig::default(), EnvelopeCodec::embedded())
}

pub fn installer(opener: Arc<RecordingOpener>, store: Arc<MemoryStore>) -> Installer {
    Installer::new(resolver(), opener, store as Arc<dyn KeyValueStore>)
}
