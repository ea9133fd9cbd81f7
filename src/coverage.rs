// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

// Reduces a coverage.py JSON report to per-file percentages and publishes it
// to a storage bucket, once as the latest report and once under a dated
// history path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cli::CoverageArgs;

const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CoverageReport {
    meta: ReportMeta,
    files: BTreeMap<String, FileCoverage>,
    totals: Summary,
}

#[derive(Debug, Deserialize)]
struct ReportMeta {
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct FileCoverage {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    percent_covered: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MinimalReport {
    pub files: BTreeMap<String, f64>,
    pub last_updated: String,
    pub total_coverage: f64,
}

/// Round to two decimals on the exact binary value, ties to even.
/// `12.125` is exactly representable and becomes `12.12`; `2.675` is
/// stored just below the midpoint and becomes `2.67`.
fn round2(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }

    let bits = value.to_bits();
    let biased_exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased_exponent == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased_exponent - 1075)
    };
    if exponent >= 0 {
        return value;
    }

    // value * 100 == scaled / 2^shift, exactly
    let scaled = u128::from(mantissa) * 100;
    let shift = exponent.unsigned_abs();
    let hundredths = if shift >= 128 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if remainder > half || (remainder == half && quotient % 2 == 1) {
            quotient + 1
        } else {
            quotient
        }
    };

    let rounded = hundredths as f64 / 100.0;
    if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

/// Write the minimal report to `destination` and return its `last_updated`
/// stamp. `None` when there is nothing to report.
pub fn create_minimal_report(source: &Path, destination: &Path) -> Result<Option<String>> {
    if !source.is_file() {
        println!("File {} does not exist.", source.display());
        return Ok(None);
    }

    let content = fs::read_to_string(source)
        .with_context(|| format!("Failed to read coverage report: {}", source.display()))?;
    let raw: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse coverage report: {}", source.display()))?;

    let has_files = raw.as_object().is_some_and(|obj| obj.contains_key("files"));
    if !has_files {
        println!("Empty file, or unable to read contents of {}.", source.display());
        return Ok(None);
    }

    let report: CoverageReport = serde_json::from_value(raw)
        .with_context(|| format!("Unexpected coverage report layout in {}", source.display()))?;

    let timestamp = NaiveDateTime::parse_from_str(&report.meta.timestamp, SOURCE_TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid report timestamp '{}'", report.meta.timestamp))?;
    let last_updated = timestamp.format(TIMESTAMP_FORMAT).to_string();

    let minimal = MinimalReport {
        files: report
            .files
            .into_iter()
            .map(|(name, file)| (name, round2(file.summary.percent_covered)))
            .collect(),
        last_updated: last_updated.clone(),
        total_coverage: report.totals.percent_covered,
    };

    fs::write(destination, serde_json::to_string(&minimal)?)
        .with_context(|| format!("Failed to write minimal report: {}", destination.display()))?;

    Ok(Some(last_updated))
}

/// Latest and dated history destinations for a report stamped `last_updated`
pub fn upload_paths(blob_dir: &str, last_updated: &str) -> Result<[String; 2]> {
    let updated = NaiveDateTime::parse_from_str(last_updated, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid last_updated stamp '{last_updated}'"))?;

    Ok([
        format!("{blob_dir}/coverage-min.json"),
        format!("{blob_dir}/history/coverage-min/{}.json", updated.format(DATE_FORMAT)),
    ])
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, destination: &str, body: Vec<u8>) -> Result<()>;
}

/// Google Cloud Storage JSON API, simple media upload
pub struct GcsBlobStore {
    client: Client,
    storage_url: String,
    bucket: String,
    access_token: String,
}

impl GcsBlobStore {
    pub fn new(storage_url: &str, bucket: &str, access_token: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            storage_url: storage_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn upload(&self, destination: &str, body: Vec<u8>) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.storage_url, self.bucket);

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", destination)])
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload {destination}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Upload of {} to bucket {} failed with status {}: {}",
                destination,
                self.bucket,
                status,
                error_text
            ));
        }

        tracing::info!(bucket = %self.bucket, destination, "uploaded coverage report");
        Ok(())
    }
}

/// Upload the minimal report to both destinations and return them
pub async fn upload_report(
    store: &dyn BlobStore,
    minimal_file: &Path,
    blob_dir: &str,
    last_updated: &str,
) -> Result<Vec<String>> {
    let body = fs::read(minimal_file)
        .with_context(|| format!("Failed to read minimal report: {}", minimal_file.display()))?;

    let destinations = upload_paths(blob_dir, last_updated)?;
    for destination in &destinations {
        store.upload(destination, body.clone()).await?;
    }
    Ok(destinations.to_vec())
}

pub async fn run(args: &CoverageArgs) -> Result<()> {
    let minimal_file = Path::new(&args.minimal_file_name);
    let Some(last_updated) = create_minimal_report(Path::new(&args.source_file_name), minimal_file)? else {
        return Ok(());
    };

    let token = args
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow::anyhow!("An access token is required: pass --access-token or set GCS_ACCESS_TOKEN"))?;

    let store = GcsBlobStore::new(&args.storage_url, &args.bucket_name, token)?;
    let uploaded = upload_report(&store, minimal_file, &args.destination_blob_dir, &last_updated).await?;

    println!("File {} uploaded to {}.", args.minimal_file_name, uploaded.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_report(dir: &TempDir, report: &Value) -> std::path::PathBuf {
        let source = dir.path().join("coverage.json");
        fs::write(&source, report.to_string()).unwrap();
        source
    }

    fn sample_report() -> Value {
        json!({
            "meta": {"version": "7.2.7", "timestamp": "2023-05-14T09:30:12.345678"},
            "files": {
                "Packs/A/a.py": {"summary": {"percent_covered": 87.12345}},
                "Packs/B/b.py": {"summary": {"percent_covered": 50.0}}
            },
            "totals": {"percent_covered": 80.987654}
        })
    }

    #[test]
    fn test_round2_uses_exact_binary_value() {
        assert_eq!(round2(12.125), 12.12);
        assert_eq!(round2(12.375), 12.38);
        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(0.285), 0.28);
        assert_eq!(round2(87.12345), 87.12);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(-12.125), -12.12);
        assert_eq!(round2(0.0), 0.0);
    }

    fn coverage_args(dir: &TempDir, source: &std::path::Path) -> CoverageArgs {
        CoverageArgs {
            bucket_name: "coverage-bucket".to_string(),
            source_file_name: source.display().to_string(),
            minimal_file_name: dir.path().join("coverage_data.json").display().to_string(),
            destination_blob_dir: "code-coverage".to_string(),
            access_token: None,
            storage_url: "http://127.0.0.1:9".to_string(),
        }
    }

    #[tokio::test]
    async fn test_run_requires_access_token_to_upload() {
        let dir = TempDir::new().unwrap();
        let source = write_report(&dir, &sample_report());

        let err = run(&coverage_args(&dir, &source)).await.unwrap_err();

        assert!(err.to_string().contains("access token is required"));
        assert!(dir.path().join("coverage_data.json").exists());
    }

    #[tokio::test]
    async fn test_run_without_report_skips_upload() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("coverage.json");

        run(&coverage_args(&dir, &missing)).await.unwrap();

        assert!(!dir.path().join("coverage_data.json").exists());
    }

    #[test]
    fn test_minimal_report_contents() {
        let dir = TempDir::new().unwrap();
        let source = write_report(&dir, &sample_report());
        let destination = dir.path().join("coverage_data.json");

        let last_updated = create_minimal_report(&source, &destination).unwrap();
        assert_eq!(last_updated.as_deref(), Some("2023-05-14T09:30:12Z"));

        let written: MinimalReport = serde_json::from_str(&fs::read_to_string(&destination).unwrap()).unwrap();
        assert_eq!(written.files["Packs/A/a.py"], 87.12);
        assert_eq!(written.files["Packs/B/b.py"], 50.0);
        assert_eq!(written.last_updated, "2023-05-14T09:30:12Z");
        assert_eq!(written.total_coverage, 80.987654);
    }

    #[test]
    fn test_missing_or_empty_source_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("coverage_data.json");

        let missing = dir.path().join("nope.json");
        assert_eq!(create_minimal_report(&missing, &destination).unwrap(), None);

        let empty = write_report(&dir, &json!({}));
        assert_eq!(create_minimal_report(&empty, &destination).unwrap(), None);

        let no_files = write_report(&dir, &json!({"meta": {}, "totals": {}}));
        assert_eq!(create_minimal_report(&no_files, &destination).unwrap(), None);

        assert!(!destination.exists());
    }

    #[test]
    fn test_upload_paths_use_report_date() {
        let paths = upload_paths("code-coverage", "2023-05-14T09:30:12Z").unwrap();
        assert_eq!(
            paths,
            [
                "code-coverage/coverage-min.json".to_string(),
                "code-coverage/history/coverage-min/2023-05-14.json".to_string(),
            ]
        );
        assert!(upload_paths("code-coverage", "yesterday").is_err());
    }

    #[tokio::test]
    async fn test_upload_report_posts_both_destinations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/coverage-bucket/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "code-coverage/coverage-min.json"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/coverage-bucket/o"))
            .and(query_param("name", "code-coverage/history/coverage-min/2023-05-14.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let minimal = dir.path().join("coverage_data.json");
        fs::write(&minimal, r#"{"files":{},"last_updated":"2023-05-14T09:30:12Z","total_coverage":0.0}"#).unwrap();

        let store = GcsBlobStore::new(&server.uri(), "coverage-bucket", "secret").unwrap();
        let uploaded = upload_report(&store, &minimal, "code-coverage", "2023-05-14T09:30:12Z")
            .await
            .unwrap();

        assert_eq!(uploaded.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let store = GcsBlobStore::new(&server.uri(), "coverage-bucket", "bad").unwrap();
        let err = store.upload("code-coverage/coverage-min.json", b"{}".to_vec()).await.unwrap_err();

        assert!(err.to_string().contains("403"));
    }
}
