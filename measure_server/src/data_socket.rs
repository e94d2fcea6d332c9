//! Data socket module to receive camera frames via network.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Result};
use bytes::Bytes;
use common::protocol::ProtoMsg;
use futures::StreamExt;
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    meter::METER,
    pubsub::{CameraFrame, FrameHub},
};

/// Bind the data socket and publish incoming frames on the hub.
pub async fn spawn_data_socket(
    hub: Arc<FrameHub>,
    addr: &str,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let socket: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(socket).await?;
    let local_addr = listener.local_addr()?;
    log::info!("Data socket listening on {}", local_addr);

    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        loop {
            let (socket, _peer_addr) = listener.accept().await?;
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                if let Err(e) = handle_incoming(hub, socket).await {
                    log::warn!("Camera connection failed: {e}");
                }
            });
        }
    });

    Ok((local_addr, handle))
}

async fn handle_incoming(hub: Arc<FrameHub>, stream: TcpStream) -> Result<()> {
    let addr = stream.peer_addr()?;
    log::info!("{}: New TCP connection", &addr);

    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());

    let camera = match transport.next().await {
        Some(Ok(data)) => match ProtoMsg::deserialize(&data) {
            Ok(ProtoMsg::ConnectReq(camera)) => camera,
            _ => bail!("{addr}: first message is no connect request"),
        },
        _ => bail!("{addr}: closed before connect request"),
    };
    log::info!("{}: Publishing camera {}", &addr, &camera);

    let sender = hub.get_broadcast_sender(&camera).await;

    while let Some(res) = transport.next().await {
        match res {
            Ok(data) => match ProtoMsg::deserialize(&data) {
                Ok(ProtoMsg::FrameMsg(msg)) => {
                    METER.tick_received();
                    let frame = CameraFrame {
                        seq: msg.seq,
                        jpeg: Bytes::from(msg.data),
                    };
                    if sender.send(frame).is_err() {
                        log::trace!("No stream watching camera {}", &camera);
                    }
                }
                Ok(other) => log::warn!("{}: Unexpected message {:?}", &addr, other),
                Err(e) => log::warn!("{}: Undecodable message: {}", &addr, e),
            },
            Err(e) => {
                log::warn!("Error in TCP codec: {e}");
                break;
            }
        }
    }

    log::info!("{}: Camera {} disconnected", &addr, &camera);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use common::protocol::FrameMsg;
    use futures::SinkExt;

    #[tokio::test]
    async fn frames_reach_subscribers_of_the_announced_camera() -> Result<()> {
        let hub = Arc::new(FrameHub::new());
        let mut rx = hub.get_broadcast_receiver("front").await;
        let (addr, _handle) = spawn_data_socket(Arc::clone(&hub), "127.0.0.1:0").await?;

        let stream = TcpStream::connect(addr).await?;
        let mut transport = Framed::new(stream, LengthDelimitedCodec::new());
        transport
            .send(Bytes::from(ProtoMsg::ConnectReq("front".into()).serialize()?))
            .await?;
        transport
            .send(Bytes::from(
                ProtoMsg::FrameMsg(FrameMsg::new("front".into(), 41, vec![1, 2, 3])).serialize()?,
            ))
            .await?;

        let frame = rx.recv().await?;
        assert_eq!(frame.seq, 41);
        assert_eq!(&frame.jpeg[..], &[1, 2, 3]);

        Ok(())
    }
}
