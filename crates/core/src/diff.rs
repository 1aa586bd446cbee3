//! Diffing local files against the remote index
//!
//! Sync is additive: files missing or changed remotely are uploaded, remote
//! objects with no local counterpart are left alone.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::index::{RemoteIndex, strip_quotes};
use crate::site::META_KEY;
use crate::walker::LocalFileRecord;

/// Local path -> destination key for everything that needs uploading
pub type UploadSet = BTreeMap<PathBuf, String>;

/// Why a file was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadReason {
    New,
    Changed,
}

/// Outcome of diffing one local tree against one remote index
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub uploads: UploadSet,
    pub reasons: BTreeMap<String, UploadReason>,
    pub skipped: usize,
    pub scanned: usize,
}

impl DiffResult {
    pub fn reason(&self, key: &str) -> Option<UploadReason> {
        self.reasons.get(key).copied()
    }
}

/// Whether a local digest matches a remote ETag
pub fn digests_match(local: &str, remote: &str) -> bool {
    strip_quotes(local) == strip_quotes(remote)
}

/// Compares local records against a remote index
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Classify every local record
    ///
    /// Accepts fallible records so a walk error aborts the diff.
    pub fn diff<I>(&self, local: I, remote: &RemoteIndex) -> Result<DiffResult>
    where
        I: IntoIterator<Item = Result<LocalFileRecord>>,
    {
        let mut result = DiffResult::default();
        for record in local {
            let record = record?;
            result.scanned += 1;
            let key = record.key();
            if key == META_KEY {
                tracing::warn!(
                    path = %record.path.display(),
                    "not uploading file that shadows the site marker"
                );
                result.skipped += 1;
                continue;
            }

            let reason = match remote.get(&key) {
                None => UploadReason::New,
                Some(existing) if !digests_match(&record.digest, &existing.digest) => {
                    UploadReason::Changed
                }
                Some(_) => {
                    tracing::debug!(%key, "unchanged");
                    result.skipped += 1;
                    continue;
                }
            };
            tracing::debug!(%key, ?reason, "needs upload");
            result.reasons.insert(key.clone(), reason);
            result.uploads.insert(record.path, key);
        }
        Ok(result)
    }
}
