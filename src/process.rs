//! The fetch → resize pipeline, and its direct (non-job) entry points.
//!
//! [`fetch_and_resize`] is the single code path both the job workers and the
//! direct callers run. Decoding and resampling are CPU-bound, so the resize
//! step is moved onto tokio's blocking pool instead of stalling an async
//! worker thread.
//!
//! Direct callers that want the finished PNG (any embedding that prefers to
//! await a result instead of polling a job) use [`thumbnail_png`]; the CLI
//! `resize` command uses [`resize_to_sink`]. Errors are returned to the caller
//! unchanged.

use crate::fetch::{FetchError, Fetcher};
use crate::imaging::{BufferError, ImageBuffer, ThumbnailSize, resize};
use crate::sink::{ResultSink, SinkError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Resize task failed: {0}")]
    Resize(String),
    #[error(transparent)]
    Encode(#[from] BufferError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Fetch `url` and normalize it to `size`.
pub async fn fetch_and_resize(
    fetcher: &dyn Fetcher,
    url: &str,
    size: ThumbnailSize,
) -> Result<ImageBuffer, ProcessError> {
    let source = fetcher.fetch(url).await?;
    debug!(
        url,
        width = source.width(),
        height = source.height(),
        "resizing fetched image"
    );
    tokio::task::spawn_blocking(move || resize(&source, size))
        .await
        .map_err(|e| ProcessError::Resize(e.to_string()))
}

/// Fetch, resize, and encode as PNG (with alpha).
pub async fn thumbnail_png(
    fetcher: &dyn Fetcher,
    url: &str,
    size: ThumbnailSize,
) -> Result<Vec<u8>, ProcessError> {
    let thumbnail = fetch_and_resize(fetcher, url, size).await?;
    Ok(thumbnail.to_png()?)
}

/// Fetch, resize, and hand the thumbnail to `sink` as `name`.
pub async fn resize_to_sink(
    fetcher: &dyn Fetcher,
    url: &str,
    size: ThumbnailSize,
    sink: &dyn ResultSink,
    name: &str,
) -> Result<PathBuf, ProcessError> {
    let thumbnail = fetch_and_resize(fetcher, url, size).await?;
    Ok(sink.write(name, &thumbnail)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MockFetcher;
    use crate::sink::tests::MemorySink;

    #[tokio::test]
    async fn fetch_and_resize_produces_target_size() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/wide.png", 512, 256);

        let out = fetch_and_resize(&fetcher, "https://img/wide.png", ThumbnailSize::default())
            .await
            .unwrap();
        assert_eq!(out.dimensions(), (128, 128));
    }

    #[tokio::test]
    async fn thumbnail_png_decodes_back_to_target() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/tall.png", 90, 400);
        let size = ThumbnailSize::square(64).unwrap();

        let png = thumbnail_png(&fetcher, "https://img/tall.png", size)
            .await
            .unwrap();
        let back = ImageBuffer::decode(&png).unwrap();
        assert_eq!(back.dimensions(), (64, 64));
    }

    #[tokio::test]
    async fn fetch_errors_propagate_unchanged() {
        let fetcher = MockFetcher::new();
        let decode = FetchError::Decode {
            url: "https://img/page.html".into(),
            reason: "unsupported format".into(),
        };
        fetcher.respond("https://img/page.html", Err(decode.clone()));

        let err = thumbnail_png(&fetcher, "https://img/page.html", ThumbnailSize::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Fetch(e) if e == decode));
    }

    #[tokio::test]
    async fn resize_to_sink_writes_named_thumbnail() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/wide.png", 512, 256);
        let sink = MemorySink::new();

        let path = resize_to_sink(
            &fetcher,
            "https://img/wide.png",
            ThumbnailSize::default(),
            &sink,
            "me",
        )
        .await
        .unwrap();
        assert_eq!(path, PathBuf::from("me.png"));
        assert_eq!(
            *sink.written.lock().unwrap(),
            vec![("me".to_string(), (128, 128))]
        );
    }

    #[tokio::test]
    async fn resize_to_sink_skips_sink_on_fetch_error() {
        let fetcher = MockFetcher::new();
        let sink = MemorySink::new();

        let err = resize_to_sink(
            &fetcher,
            "https://img/missing.png",
            ThumbnailSize::default(),
            &sink,
            "me",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::Fetch(FetchError::Transport { .. })));
        assert!(sink.names().is_empty());
    }
}
