use crate::error::{ErrorKind, Result};
use crate::mode::keys;
use crate::models::Produced;
use crate::provider::{Input, Provider};
use async_trait::async_trait;
use exn::ResultExt;
use serde_json::json;
use sieve_resource::DirectoryEntry;
use sieve_resource::media::DIRECTORY_MEDIA_TYPE;
use std::collections::BTreeMap;
use std::path::Path;

/// Features of a directory, computed from the listing its source produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryListing;

impl DirectoryListing {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for DirectoryListing {
    fn name(&self) -> &str {
        "directory-listing"
    }

    fn media_types(&self) -> &[&str] {
        &[DIRECTORY_MEDIA_TYPE]
    }

    fn keys(&self) -> &[&str] {
        &[
            keys::DIRECTORY_ENTRY_COUNT,
            keys::DIRECTORY_ENTRIES,
            keys::DIRECTORY_TOTAL_SIZE,
            keys::DIRECTORY_EXTENSIONS,
        ]
    }

    async fn extract(&self, input: &Input) -> Result<Vec<Produced>> {
        let entries: Vec<DirectoryEntry> = serde_json::from_slice(&input.bytes)
            .or_raise(|| ErrorKind::Malformed("directory listing is not valid JSON".to_string()))?;

        let mut produced = Vec::new();
        if input.wants(keys::DIRECTORY_ENTRY_COUNT) {
            produced.push(Produced::new(keys::DIRECTORY_ENTRY_COUNT, entries.len() as u64));
        }
        if input.wants(keys::DIRECTORY_ENTRIES) {
            let listing = entries
                .iter()
                .map(|e| json!({ "name": e.name, "is_dir": e.is_dir, "size": e.size }))
                .collect::<serde_json::Value>();
            produced.push(Produced::new(keys::DIRECTORY_ENTRIES, listing));
        }
        if input.wants(keys::DIRECTORY_TOTAL_SIZE) {
            let total = entries.iter().filter(|e| !e.is_dir).map(|e| e.size).sum::<u64>();
            produced.push(Produced::new(keys::DIRECTORY_TOTAL_SIZE, total));
        }
        if input.wants(keys::DIRECTORY_EXTENSIONS) {
            let mut extensions = BTreeMap::<String, u64>::new();
            for entry in entries.iter().filter(|e| !e.is_dir) {
                let extension = Path::new(&entry.name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                *extensions.entry(extension).or_default() += 1;
            }
            produced.push(Produced::new(keys::DIRECTORY_EXTENSIONS, json!(extensions)));
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;
    use std::collections::HashMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listing_features() {
        let listing = json!([
            { "name": "a.TXT", "size": 3 },
            { "name": "b.txt", "size": 4 },
            { "name": "Makefile", "size": 5 },
            { "name": "sub", "is_dir": true, "size": 0 },
        ]);
        let input = Input::new(listing.to_string().into_bytes(), DIRECTORY_MEDIA_TYPE, Duration::from_secs(1));
        let values = DirectoryListing
            .extract(&input)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.key, p.value))
            .collect::<HashMap<_, _>>();
        assert_eq!(values[keys::DIRECTORY_ENTRY_COUNT], FeatureValue::Number(4.0));
        assert_eq!(values[keys::DIRECTORY_TOTAL_SIZE], FeatureValue::Number(12.0));
        assert_eq!(values[keys::DIRECTORY_EXTENSIONS], FeatureValue::Json(json!({"": 1, "txt": 2})));
        let FeatureValue::Json(entries) = &values[keys::DIRECTORY_ENTRIES] else {
            panic!("entries should be JSON");
        };
        assert_eq!(entries[3]["is_dir"], json!(true));
    }

    #[tokio::test]
    async fn test_rejects_non_listing() {
        let input = Input::new(b"hello".to_vec(), DIRECTORY_MEDIA_TYPE, Duration::from_secs(1));
        let err = DirectoryListing.extract(&input).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }
}
