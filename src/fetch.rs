//! Source fetcher: retrieves the dataset and dictionary artifacts.
//!
//! Both artifacts are fetched concurrently since they are independent.
//! A location is either an `http(s)://` URL, downloaded with `reqwest`,
//! or a `file://` URL / plain path, copied from the local filesystem.
//! Retrieved files land in `[source].download_dir`.
//!
//! Any failure (network error, non-success status, missing file, write
//! error) aborts the run with [`IngestError::Fetch`]; a half-finished pair
//! is never handed to the loader.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::IngestError;
use crate::models::{ArtifactHandle, RawDatasetHandle, RawDictionaryHandle};

/// Fetch both artifacts concurrently.
pub async fn fetch_artifacts(
    source: &SourceConfig,
) -> Result<(RawDatasetHandle, RawDictionaryHandle), IngestError> {
    tokio::fs::create_dir_all(&source.download_dir)
        .await
        .map_err(|e| IngestError::fetch(&source.download_dir.display().to_string(), e))?;

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = source.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder
        .build()
        .map_err(|e| IngestError::fetch(&source.dataset_url, e))?;

    let dataset_dest = destination(&source.download_dir, "dataset", &source.dataset_url);
    let dictionary_dest = destination(&source.download_dir, "dictionary", &source.dictionary_url);

    tokio::try_join!(
        fetch_artifact(&client, &source.dataset_url, &dataset_dest),
        fetch_artifact(&client, &source.dictionary_url, &dictionary_dest),
    )
}

/// Retrieve one artifact to `dest`.
pub async fn fetch_artifact(
    client: &reqwest::Client,
    location: &str,
    dest: &Path,
) -> Result<ArtifactHandle, IngestError> {
    tracing::info!(location, dest = %dest.display(), "fetching artifact");

    let bytes = match Location::parse(location) {
        Location::Remote(url) => download(client, url).await?,
        Location::Local(path) => tokio::fs::read(&path)
            .await
            .map_err(|e| IngestError::fetch(location, e))?,
    };

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| IngestError::fetch(location, format!("writing {}: {}", dest.display(), e)))?;

    let handle = ArtifactHandle {
        path: dest.to_path_buf(),
        location: location.to_string(),
        retrieved_at: Utc::now(),
        bytes: bytes.len() as u64,
        sha256: format!("{:x}", Sha256::digest(&bytes)),
    };

    tracing::info!(
        location,
        bytes = handle.bytes,
        sha256 = %handle.sha256,
        "artifact retrieved"
    );

    Ok(handle)
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, IngestError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| IngestError::fetch(url, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Err(IngestError::fetch(url, format!("HTTP {}", status)));
    }

    let bytes = resp.bytes().await.map_err(|e| IngestError::fetch(url, e))?;
    Ok(bytes.to_vec())
}

#[derive(Debug, PartialEq)]
enum Location<'a> {
    Remote(&'a str),
    Local(PathBuf),
}

impl<'a> Location<'a> {
    fn parse(location: &'a str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Location::Remote(trimmed)
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            Location::Local(PathBuf::from(path))
        } else {
            Location::Local(PathBuf::from(trimmed))
        }
    }
}

/// `<dir>/<kind>-<last path segment>`, keeping the extension so the
/// dictionary reader can pick a format.
fn destination(dir: &Path, kind: &str, location: &str) -> PathBuf {
    let without_query = location.split(['?', '#']).next().unwrap_or(location);
    let name = without_query
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("artifact");
    dir.join(format!("{}-{}", kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_kinds() {
        assert_eq!(
            Location::parse("https://data.sba.gov/a.csv"),
            Location::Remote("https://data.sba.gov/a.csv")
        );
        assert_eq!(
            Location::parse("file:///tmp/a.csv"),
            Location::Local(PathBuf::from("/tmp/a.csv"))
        );
        assert_eq!(
            Location::parse("./fixtures/a.csv"),
            Location::Local(PathBuf::from("./fixtures/a.csv"))
        );
    }

    #[test]
    fn destination_keeps_file_name_and_extension() {
        let dir = Path::new("/downloads");
        assert_eq!(
            destination(dir, "dictionary", "https://x.org/files/dict.xlsx?raw=1"),
            PathBuf::from("/downloads/dictionary-dict.xlsx")
        );
        assert_eq!(
            destination(dir, "dataset", "https://x.org/"),
            PathBuf::from("/downloads/dataset-x.org")
        );
        assert_eq!(
            destination(dir, "dataset", ""),
            PathBuf::from("/downloads/dataset-artifact")
        );
    }

    #[tokio::test]
    async fn local_artifact_is_copied_with_digest() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("source.csv");
        std::fs::write(&src, "LoanNumber\n1\n").unwrap();
        let dest = tmp.path().join("dataset-source.csv");

        let client = reqwest::Client::new();
        let handle = fetch_artifact(&client, src.to_str().unwrap(), &dest)
            .await
            .unwrap();

        assert_eq!(handle.path, dest);
        assert_eq!(handle.bytes, 13);
        assert_eq!(handle.sha256.len(), 64);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "LoanNumber\n1\n");
    }

    #[tokio::test]
    async fn missing_local_artifact_is_a_fetch_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let client = reqwest::Client::new();
        let err = fetch_artifact(
            &client,
            "/definitely/not/here.csv",
            &tmp.path().join("out.csv"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.category(), "fetch");
    }
}
