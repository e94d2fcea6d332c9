//! Utility functions
//!
use std::path::Path;

use anyhow::Result;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

/// Download a file from a URL to a given filepath.
///
/// The file is written next to its destination first and moved into place
/// once complete, so an interrupted download leaves no truncated file behind.
pub async fn download_file(client: &Client, url: &str, filepath: impl AsRef<Path>) -> Result<()> {
    let filepath = filepath.as_ref();
    let partial = filepath.with_extension("part");

    let resp = client.get(url).send().await?.error_for_status()?;

    let mut file = tokio::fs::File::create(&partial).await?;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    tokio::fs::rename(&partial, filepath).await?;

    Ok(())
}

/// Multipart item framing one JPEG image of a `multipart/x-mixed-replace` stream.
pub fn as_jpeg_stream_item(data: &[u8]) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stream_item_is_framed_by_the_boundary() {
        let item = as_jpeg_stream_item(&[0xff, 0xd8]);
        assert!(item.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(item.ends_with(&[0xff, 0xd8, b'\r', b'\n', b'\r', b'\n']));
    }

    #[tokio::test]
    async fn download_writes_the_body() -> Result<()> {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/model.onnx");
                then.status(200).body("weights");
            })
            .await;

        let dir = tempfile::tempdir()?;
        let target = dir.path().join("model.onnx");
        download_file(&Client::new(), &server.url("/model.onnx"), &target).await?;

        mock.assert_async().await;
        assert_eq!(std::fs::read_to_string(&target)?, "weights");
        assert!(!target.with_extension("part").exists());

        Ok(())
    }
}
