//! Granule downloads from the NASA data repository.
//!
//! Downloads stream in fixed-size chunks and are verified against the
//! reported content length. A file that already exists with the expected
//! byte length is never downloaded again; a partial or corrupted file is
//! deleted and fetched from scratch. Retry policy belongs to the pipeline,
//! not here.

use crate::types::{GediError, GediResult};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Download chunk size: 128 KiB
const CHUNK_SIZE: usize = 128 * 1024;

/// Environment variable holding an Earthdata bearer token
pub const TOKEN_ENV_VAR: &str = "EARTHDATA_TOKEN";

/// Streams granules from the data repository into a local directory
pub struct GranuleDownloader {
    client: reqwest::blocking::Client,
    save_dir: PathBuf,
    token: Option<String>,
}

impl GranuleDownloader {
    /// Create a downloader saving into `save_dir`, authenticating with the
    /// given bearer token when one is provided
    pub fn new<P: AsRef<Path>>(save_dir: P, token: Option<String>) -> GediResult<Self> {
        let save_dir = save_dir.as_ref().to_path_buf();
        fs::create_dir_all(&save_dir)?;

        // Granules run to gigabytes; only the connection attempt is bounded
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .connect_timeout(std::time::Duration::from_secs(30))
            .user_agent("gedisub/0.2.0 (GEDI Subsetting Pipeline)")
            .build()
            .map_err(|e| GediError::Download(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            save_dir,
            token,
        })
    }

    /// Create a downloader taking its token from the environment
    pub fn from_env<P: AsRef<Path>>(save_dir: P) -> GediResult<Self> {
        let token = std::env::var(TOKEN_ENV_VAR).ok();
        if token.is_none() {
            log::warn!(
                "{} is not set; downloads from protected collections will fail",
                TOKEN_ENV_VAR
            );
        }
        Self::new(save_dir, token)
    }

    /// Local path a URL's granule will be saved to
    pub fn target_path(&self, url: &str) -> GediResult<PathBuf> {
        let filename = url.rsplit('/').next().unwrap_or_default();
        if !filename.contains("GEDI") {
            return Err(GediError::Download(format!(
                "invalid granule URL {}, filename does not look like a GEDI granule",
                url
            )));
        }
        Ok(self.save_dir.join(filename))
    }

    /// Download one granule, returning the local path.
    ///
    /// Skips the transfer when a complete file of the expected size is
    /// already present.
    pub fn download_granule(&self, url: &str) -> GediResult<PathBuf> {
        let target = self.target_path(url)?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let mut response = request
            .send()
            .map_err(|e| GediError::Download(format!("request for {} failed: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(GediError::Download(format!(
                "not authorized for {}; check the {} credentials",
                url, TOKEN_ENV_VAR
            )));
        }
        if !response.status().is_success() {
            return Err(GediError::Download(format!(
                "download of {} failed with status {}",
                url,
                response.status()
            )));
        }

        let expected = response
            .content_length()
            .ok_or_else(|| GediError::Download(format!("no content length reported for {}", url)))?;

        if self.precheck_existing(&target, expected)? {
            return Ok(target);
        }

        log::info!(
            "Downloading granule ({:.1} MB) to {}",
            expected as f64 / (1024.0 * 1024.0),
            target.display()
        );

        let mut file = fs::File::create(&target)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received: u64 = 0;
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| GediError::Download(format!("transfer from {} failed: {}", url, e)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            received += n as u64;
        }
        file.flush()?;
        drop(file);

        if received != expected {
            fs::remove_file(&target)?;
            return Err(GediError::Download(format!(
                "incomplete download of {}: got {} of {} bytes",
                url, received, expected
            )));
        }

        log::info!("Download complete: {}", target.display());
        Ok(target)
    }

    /// Returns true when a complete file is already on disk. A file with a
    /// different byte length is deleted so the caller re-downloads it.
    fn precheck_existing(&self, path: &Path, expected: u64) -> GediResult<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let actual = fs::metadata(path)?.len();
        if actual == expected {
            log::info!("File {} already complete, skipping download", path.display());
            return Ok(true);
        }
        log::warn!(
            "File {} exists but has {} of {} bytes, downloading again",
            path.display(),
            actual,
            expected
        );
        fs::remove_file(path)?;
        Ok(false)
    }
}
