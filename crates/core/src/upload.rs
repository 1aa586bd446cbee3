//! Executing an upload set against a bucket

use std::path::Path;

use crate::diff::UploadSet;
use crate::error::Result;
use crate::traits::{ObjectStore, PutOptions};

/// Receives transfer events; every method defaults to a no-op
pub trait TransferObserver: Send + Sync {
    /// Pretend mode: the transfer that would have happened
    fn pretend(&self, _path: &Path, _key: &str) {}

    fn started(&self, _path: &Path, _key: &str, _total: u64) {}

    /// Bytes transferred so far for the current object; `total` is never zero
    fn progress(&self, _key: &str, _transferred: u64, _total: u64) {}

    fn finished(&self, _key: &str, _total: u64) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl TransferObserver for SilentObserver {}

/// Content type inferred from the file extension
pub fn guess_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// What an upload run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Keys uploaded (or that would be, in pretend mode), in upload order
    pub keys: Vec<String>,
    pub bytes: u64,
    pub pretend: bool,
}

/// Uploads each entry of an [`UploadSet`] once, in order
pub struct UploadScheduler<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    pretend: bool,
}

impl<'a> UploadScheduler<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self {
            store,
            bucket,
            pretend: false,
        }
    }

    /// Report intended uploads without touching the network
    pub fn pretend(mut self, pretend: bool) -> Self {
        self.pretend = pretend;
        self
    }

    /// Upload every entry; the first failure aborts the rest
    pub async fn run(
        &self,
        uploads: &UploadSet,
        observer: &dyn TransferObserver,
    ) -> Result<UploadReport> {
        let mut report = UploadReport {
            pretend: self.pretend,
            ..Default::default()
        };

        for (path, key) in uploads {
            if self.pretend {
                tracing::info!(path = %path.display(), %key, "would upload");
                observer.pretend(path, key);
                report.keys.push(key.clone());
                continue;
            }

            let total = std::fs::metadata(path)
                .map_err(|e| crate::error::Error::file(path, e))?
                .len();
            let options = PutOptions {
                content_type: guess_content_type(path),
                public_read: true,
                ..Default::default()
            };

            observer.started(path, key, total);
            let progress = |transferred: u64, reported_total: u64| {
                observer.progress(key, transferred, reported_total.max(1));
            };

            if let Err(e) = self
                .store
                .put_file(self.bucket, key, path, &options, &progress)
                .await
            {
                tracing::error!(
                    %key,
                    uploaded = report.keys.len(),
                    remaining = uploads.len() - report.keys.len(),
                    "upload failed, aborting sync"
                );
                return Err(e);
            }

            observer.finished(key, total);
            tracing::info!(%key, bytes = total, content_type = ?options.content_type, "uploaded");
            report.keys.push(key.clone());
            report.bytes += total;
        }

        Ok(report)
    }
}
