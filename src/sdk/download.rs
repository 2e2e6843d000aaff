// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote archive download.
//!
//! Streams a remote file to disk while reporting byte progress. The body is
//! first written to a sibling `.part` file, and only moved onto the target
//! path once the whole body has been received. Thus, an interrupted download
//! never looks like a finished one to a caller that checks for existence.

use crate::path::partial_path;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{rename, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, info, instrument};

/// Size of write buffer used while streaming a download to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// HTTP downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Construct new downloader with default HTTP client.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::HttpClient`] if HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::HttpClient)?;

        Ok(Self { client })
    }

    /// Download file at URL to target path.
    ///
    /// Creates parent directories of target path first. Progress is shown
    /// through given progress bar as a percentage when the server reports a
    /// content length, and as a running byte count otherwise. Returns the
    /// number of bytes written.
    ///
    /// Does not check if target path already exists.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::CreateDir`] if parent directory cannot be
    ///   created.
    /// - Return [`DownloadError::Request`] if request or body stream fails.
    /// - Return [`DownloadError::Status`] if server responds without success.
    /// - Return [`DownloadError::Write`] if file cannot be written.
    #[instrument(skip(self, url, path, bar), level = "debug")]
    pub async fn download(
        &self,
        url: impl AsRef<str>,
        path: impl AsRef<Path>,
        bar: &ProgressBar,
    ) -> Result<u64> {
        let url = url.as_ref();
        let path = path.as_ref();
        info!("download {url} to {:?}", path.display());

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|err| DownloadError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DownloadError::Request {
                source: err,
                url: url.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status,
                url: url.to_string(),
            });
        }

        let total = response.content_length().filter(|total| *total > 0);
        debug!("server reported content length {total:?}");
        style_bar(bar, total)?;

        let staging = partial_path(path);
        let file = File::create(&staging).await.map_err(|err| DownloadError::Write {
            source: err,
            path: staging.clone(),
        })?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| DownloadError::Request {
                source: err,
                url: url.to_string(),
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|err| DownloadError::Write {
                    source: err,
                    path: staging.clone(),
                })?;

            downloaded += chunk.len() as u64;
            bar.set_position(downloaded);
            bar.set_message(progress_message(downloaded, total));
        }

        writer.flush().await.map_err(|err| DownloadError::Write {
            source: err,
            path: staging.clone(),
        })?;
        drop(writer);

        rename(&staging, path)
            .await
            .map_err(|err| DownloadError::Write {
                source: err,
                path: path.to_path_buf(),
            })?;

        bar.finish_with_message(format!("downloaded {}", path.display()));
        info!("download complete: {downloaded} bytes");

        Ok(downloaded)
    }
}

/// Describe download progress.
///
/// Shows percentage of total alongside byte counts if total is known, or just
/// the running byte count otherwise.
pub fn progress_message(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let percent = (downloaded as f64 / total as f64) * 100.0;
            format!("{percent:.1}% ({downloaded}/{total} bytes)")
        }
        _ => format!("{downloaded} bytes"),
    }
}

fn style_bar(bar: &ProgressBar, total: Option<u64>) -> Result<()> {
    match total {
        Some(total) => {
            let style = ProgressStyle::with_template(
                "{elapsed_precise:.green}  {msg:<40}  [{wide_bar:.yellow/blue}]",
            )?
            .progress_chars("-Cco.");
            bar.set_style(style);
            bar.set_length(total);
        }
        None => {
            let style = ProgressStyle::with_template("{elapsed_precise:.green}  {spinner}  {msg}")?;
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(100));
        }
    }

    Ok(())
}

/// Download error types.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP client cannot be constructed.
    #[error("failed to build http client")]
    HttpClient(#[source] reqwest::Error),

    /// Parent directory of download cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Request could not be sent, or its body could not be streamed.
    #[error("request to {url} failed")]
    Request {
        #[source]
        source: reqwest::Error,
        url: String,
    },

    /// Server responded with non-success status.
    #[error("request to {url} failed with status {status}")]
    Status { status: StatusCode, url: String },

    /// Downloaded content cannot be written to disk.
    #[error("failed to write download to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
type Result<T, E = DownloadError> = std::result::Result<T, E>;
