//! Push captured frames to the data socket of the measurement server.
//!
use bytes::Bytes;
use common::protocol::{FrameMsg, ProtoMsg};
use futures::sink::SinkExt;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::Error;

/// Connect to `address`, announce `camera` and forward every frame received
/// on `frames` until the channel closes.
///
/// Returns the number of frames sent.
pub async fn send_frames(
    address: &str,
    camera: &str,
    mut frames: mpsc::Receiver<Vec<u8>>,
) -> Result<u64, Error> {
    let stream = TcpStream::connect(address).await?;
    log::info!("Connected to {} as camera {}", address, camera);

    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());

    let init_msg = ProtoMsg::ConnectReq(camera.to_owned()).serialize()?;
    transport.send(Bytes::from(init_msg)).await?;

    let mut seq = 0;
    while let Some(jpeg) = frames.recv().await {
        let msg = ProtoMsg::FrameMsg(FrameMsg::new(camera.to_owned(), seq, jpeg)).serialize()?;
        transport.send(Bytes::from(msg)).await?;
        log::debug!("Sent frame {}", seq);
        seq += 1;
    }

    log::info!("Frame source closed after {} frames", seq);
    Ok(seq)
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frames_follow_the_handshake_in_capture_order() -> Result<(), Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let transport = Framed::new(socket, LengthDelimitedCodec::new());
            transport
                .map(|data| ProtoMsg::deserialize(&data.expect("frame")).expect("message"))
                .collect::<Vec<_>>()
                .await
        });

        let (tx, rx) = mpsc::channel(4);
        tx.send(vec![1]).await?;
        tx.send(vec![2, 2]).await?;
        drop(tx);

        let sent = send_frames(&address, "front", rx).await?;
        assert_eq!(sent, 2);

        let received = server.await?;
        assert_eq!(
            received,
            vec![
                ProtoMsg::ConnectReq("front".into()),
                ProtoMsg::FrameMsg(FrameMsg::new("front".into(), 0, vec![1])),
                ProtoMsg::FrameMsg(FrameMsg::new("front".into(), 1, vec![2, 2])),
            ]
        );

        Ok(())
    }
}
