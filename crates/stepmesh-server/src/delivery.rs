//! Handing converted meshes to clients.
//!
//! Streamed responses own the output file through a [`GuardedStream`]:
//! the file is deleted when the body is dropped, whether it was sent in
//! full or the client went away halfway.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::Serialize;
use stepmesh_kernel::MeshFormat;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::ServiceError;
use crate::store::ArtifactGuard;

/// How a successful conversion is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Stream the mesh in the conversion response.
    Inline,
    /// Keep the mesh on disk and return a link to it.
    Deferred,
}

pin_project! {
    /// A body stream that keeps its source file alive until dropped.
    pub struct GuardedStream<S> {
        #[pin]
        inner: S,
        guard: ArtifactGuard,
    }
}

impl<S> GuardedStream<S> {
    /// Tie `guard` to the lifetime of `inner`.
    pub fn new(inner: S, guard: ArtifactGuard) -> Self {
        Self { inner, guard }
    }
}

impl<S: Stream> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Body of a deferred conversion response.
#[derive(Debug, Clone, Serialize)]
pub struct DeferredResponse {
    pub success: bool,
    pub download_url: String,
    pub filename: String,
}

impl DeferredResponse {
    pub fn new(download_name: &str) -> Self {
        Self {
            success: true,
            download_url: format!("/download/{download_name}"),
            filename: download_name.to_string(),
        }
    }
}

/// Stream the guarded file as an attachment named `download_name`.
pub async fn stream_file(
    guard: ArtifactGuard,
    download_name: &str,
    format: MeshFormat,
) -> Result<Response, ServiceError> {
    let file = tokio::fs::File::open(guard.path()).await?;
    let len = file.metadata().await?.len();
    debug!(path = %guard.path().display(), bytes = len, "Streaming mesh");

    let body = Body::from_stream(GuardedStream::new(ReaderStream::new(file), guard));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{download_name}\""))
        .map_err(|e| ServiceError::Io(std::io::Error::other(e)))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(format.content_type()),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        body,
    )
        .into_response())
}

/// Deliver a converted mesh in `mode`.
pub async fn deliver(
    mode: DeliveryMode,
    output: ArtifactGuard,
    download_name: &str,
    format: MeshFormat,
) -> Result<Response, ServiceError> {
    match mode {
        DeliveryMode::Inline => stream_file(output, download_name, format).await,
        DeliveryMode::Deferred => {
            output.disarm();
            Ok(Json(DeferredResponse::new(download_name)).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_guarded_stream_deletes_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.stl");
        std::fs::write(&path, vec![7u8; 10_000]).unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let mut stream = GuardedStream::new(ReaderStream::new(file), ArtifactGuard::new(&path));
        let mut total = 0;
        while let Some(chunk) = stream.next().await {
            total += chunk.unwrap().len();
            assert!(path.exists());
        }
        assert_eq!(total, 10_000);
        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_aborted_stream_still_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.glb");
        std::fs::write(&path, vec![1u8; 100_000]).unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let mut stream = GuardedStream::new(ReaderStream::new(file), ArtifactGuard::new(&path));
        assert!(stream.next().await.is_some());
        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stream_file_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.glb");
        std::fs::write(&path, b"glTF").unwrap();

        let resp = stream_file(ArtifactGuard::new(&path), "abc_x.glb", MeshFormat::Glb)
            .await
            .unwrap();
        let headers = resp.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "model/gltf-binary");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"abc_x.glb\""
        );
        drop(resp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_deferred_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.stl");
        std::fs::write(&path, b"solid").unwrap();

        let resp = deliver(
            DeliveryMode::Deferred,
            ArtifactGuard::new(&path),
            "abc_x.stl",
            MeshFormat::Stl,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(path.exists());
    }

    #[test]
    fn test_deferred_response_json() {
        let json = serde_json::to_value(DeferredResponse::new("id_part.stl")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "download_url": "/download/id_part.stl",
                "filename": "id_part.stl",
            })
        );
    }
}
