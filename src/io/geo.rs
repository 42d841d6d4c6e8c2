//! Download of GEO series matrices and platform annotations over HTTPS

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{DgeError, Result};

/// NCBI GEO download mirror
pub const GEO_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/geo";

const SERIES_MATRIX_SUFFIX: &str = "_series_matrix.txt.gz";

/// Directory stub GEO uses to bucket accessions: `GSE12345` -> `GSE12nnn`,
/// `GSE123` -> `GSEnnn`
pub fn accession_stub(accession: &str) -> Result<String> {
    let split = accession
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| DgeError::InvalidInput {
            reason: format!("'{}' is not a GEO accession", accession),
        })?;
    let (prefix, digits) = accession.split_at(split);
    if prefix.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DgeError::InvalidInput {
            reason: format!("'{}' is not a GEO accession", accession),
        });
    }
    let keep = digits.len().saturating_sub(3);
    Ok(format!("{}{}nnn", prefix, &digits[..keep]))
}

/// Series matrix file names linked from a GEO directory listing
pub fn parse_series_listing(html: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("href=\"") {
        rest = &rest[start + 6..];
        let Some(end) = rest.find('"') else { break };
        let target = &rest[..end];
        let name = target.rsplit('/').next().unwrap_or(target);
        if name.ends_with(SERIES_MATRIX_SUFFIX) && !files.iter().any(|f| f == name) {
            files.push(name.to_string());
        }
        rest = &rest[end..];
    }
    files
}

/// Pick the series matrix to analyse. A single file is used as is; with
/// several platforms the one naming `platform` is required.
pub fn choose_series_file(files: &[String], accession: &str, platform: Option<&str>) -> Result<String> {
    match files {
        [] => Err(DgeError::DatasetUnavailable {
            accession: accession.to_string(),
            reason: "no series matrix files listed".to_string(),
        }),
        [only] => {
            if let Some(gpl) = platform {
                if !only.contains(gpl) {
                    log::warn!("Series {} has a single matrix {}; ignoring platform {}", accession, only, gpl);
                }
            }
            Ok(only.clone())
        }
        many => {
            let gpl = platform.ok_or_else(|| DgeError::DatasetUnavailable {
                accession: accession.to_string(),
                reason: format!("series spans several platforms, choose one of: {}", many.join(", ")),
            })?;
            let tag = format!("-{}_", gpl);
            many.iter()
                .find(|f| f.contains(&tag))
                .cloned()
                .ok_or_else(|| DgeError::DatasetUnavailable {
                    accession: accession.to_string(),
                    reason: format!("no matrix for platform {} among: {}", gpl, many.join(", ")),
                })
        }
    }
}

/// Blocking GEO client caching downloads in `dest_dir`
pub struct GeoClient {
    client: Client,
    base_url: String,
    dest_dir: PathBuf,
}

impl GeoClient {
    pub fn new<P: AsRef<Path>>(dest_dir: P) -> Result<Self> {
        Self::with_base_url(GEO_BASE_URL, dest_dir)
    }

    pub fn with_base_url<P: AsRef<Path>>(base_url: &str, dest_dir: P) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent(concat!("tumor_dge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        std::fs::create_dir_all(dest_dir.as_ref())?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dest_dir: dest_dir.as_ref().to_path_buf(),
        })
    }

    fn series_dir_url(&self, accession: &str) -> Result<String> {
        Ok(format!(
            "{}/series/{}/{}/matrix/",
            self.base_url,
            accession_stub(accession)?,
            accession
        ))
    }

    /// Download (or reuse) the series matrix of `accession`, returning its local path
    pub fn fetch_series(&self, accession: &str, platform: Option<&str>) -> Result<PathBuf> {
        let dir_url = self.series_dir_url(accession)?;
        log::info!("Listing {}", dir_url);
        let listing = self.get_text(&dir_url, accession)?;
        let files = parse_series_listing(&listing);
        log::info!("Found {} series matrix file(s) for {}", files.len(), accession);

        let file = choose_series_file(&files, accession, platform)?;
        self.download(&format!("{}{}", dir_url, file), &file, accession)
    }

    /// Download (or reuse) the `GPLxxx.annot.gz` platform annotation
    pub fn fetch_platform_annotation(&self, platform: &str) -> Result<PathBuf> {
        let file = format!("{}.annot.gz", platform);
        let url = format!(
            "{}/platforms/{}/{}/annot/{}",
            self.base_url,
            accession_stub(platform)?,
            platform,
            file
        );
        self.download(&url, &file, platform)
    }

    fn get_text(&self, url: &str, accession: &str) -> Result<String> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(DgeError::DatasetUnavailable {
                accession: accession.to_string(),
                reason: format!("GET {} returned {}", url, response.status()),
            });
        }
        Ok(response.text()?)
    }

    fn download(&self, url: &str, file_name: &str, accession: &str) -> Result<PathBuf> {
        let dest = self.dest_dir.join(file_name);
        if dest.exists() {
            log::info!("Using locally cached {}", dest.display());
            return Ok(dest);
        }

        log::info!("Downloading {}", url);
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(DgeError::DatasetUnavailable {
                accession: accession.to_string(),
                reason: format!("GET {} returned {}", url, response.status()),
            });
        }
        let bytes = response.bytes()?;

        // Write under a temporary name so an interrupted download is not reused
        let partial = self.dest_dir.join(format!("{}.part", file_name));
        let mut out = File::create(&partial)?;
        out.write_all(&bytes)?;
        out.sync_all()?;
        std::fs::rename(&partial, &dest)?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), dest.display());
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accession_stub() {
        assert_eq!(accession_stub("GSE12345").unwrap(), "GSE12nnn");
        assert_eq!(accession_stub("GSE1234").unwrap(), "GSE1nnn");
        assert_eq!(accession_stub("GSE123").unwrap(), "GSEnnn");
        assert_eq!(accession_stub("GPL570").unwrap(), "GPLnnn");
        assert!(accession_stub("series").is_err());
        assert!(accession_stub("123").is_err());
    }

    #[test]
    fn test_parse_series_listing() {
        let html = r#"<html><body>
<a href="/geo/series/GSE1nnn/">Parent Directory</a>
<a href="GSE1234-GPL570_series_matrix.txt.gz">GSE1234-GPL570_series_matrix.txt.gz</a>
<a href="GSE1234-GPL96_series_matrix.txt.gz">GSE1234-GPL96_series_matrix.txt.gz</a>
<a href="GSE1234-GPL96_series_matrix.txt.gz">dup</a>
</body></html>"#;
        let files = parse_series_listing(html);
        assert_eq!(
            files,
            vec![
                "GSE1234-GPL570_series_matrix.txt.gz".to_string(),
                "GSE1234-GPL96_series_matrix.txt.gz".to_string()
            ]
        );
    }

    #[test]
    fn test_choose_single_file() {
        let files = vec!["GSE9_series_matrix.txt.gz".to_string()];
        assert_eq!(choose_series_file(&files, "GSE9", None).unwrap(), files[0]);
    }

    #[test]
    fn test_choose_by_platform() {
        let files = vec![
            "GSE1234-GPL570_series_matrix.txt.gz".to_string(),
            "GSE1234-GPL96_series_matrix.txt.gz".to_string(),
        ];
        assert_eq!(
            choose_series_file(&files, "GSE1234", Some("GPL96")).unwrap(),
            files[1]
        );
        assert!(choose_series_file(&files, "GSE1234", None).is_err());
        assert!(choose_series_file(&files, "GSE1234", Some("GPL1")).is_err());
        assert!(choose_series_file(&[], "GSE1234", None).is_err());
    }
}
