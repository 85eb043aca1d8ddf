//! TCP RPC client — sends invocations and pairs replies by sequence.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::ipc::codec::{BasicDecoder, BasicEncoder, MessageHeader, MessageType};
use crate::ipc::frame::{decode_frame, write_frame};
use crate::types::{CodecError, Error, IpcConfig, Result};

/// A single connection to an RPC server. Calls are issued one at a time.
///
/// Incoming bytes accumulate in `read_buf` until a whole frame is present,
/// so a call abandoned on timeout never leaves the stream mid-frame. Replies
/// that arrive after their call timed out are skipped by sequence.
#[derive(Debug)]
pub struct RpcClient {
    stream: TcpStream,
    read_buf: BytesMut,
    next_sequence: u32,
    ipc_config: IpcConfig,
    broken: bool,
}

impl RpcClient {
    pub async fn connect(addr: impl ToSocketAddrs, ipc_config: IpcConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(peer = %stream.peer_addr()?, "RPC client connected");
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(256),
            next_sequence: 0,
            ipc_config,
            broken: false,
        })
    }

    /// Call `service`/`request` and wait for its reply.
    ///
    /// Returns a decoder positioned at the first result.
    pub async fn invoke<F>(&mut self, service: u8, request: u8, write_args: F) -> Result<BasicDecoder>
    where
        F: FnOnce(&mut BasicEncoder) -> std::result::Result<(), CodecError>,
    {
        let header = self.send(MessageType::Invocation, service, request, write_args).await?;
        let call_timeout = self.ipc_config.call_timeout;
        tokio::time::timeout(call_timeout, self.receive_reply(&header))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "no reply to service {} request {} within {}ms",
                    service,
                    request,
                    call_timeout.as_millis()
                ))
            })?
    }

    /// Send a call that gets no reply.
    pub async fn send_oneway<F>(&mut self, service: u8, request: u8, write_args: F) -> Result<()>
    where
        F: FnOnce(&mut BasicEncoder) -> std::result::Result<(), CodecError>,
    {
        self.send(MessageType::Oneway, service, request, write_args).await?;
        Ok(())
    }

    /// Whether the connection lost frame alignment or was closed.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    async fn send<F>(
        &mut self,
        message_type: MessageType,
        service: u8,
        request: u8,
        write_args: F,
    ) -> Result<MessageHeader>
    where
        F: FnOnce(&mut BasicEncoder) -> std::result::Result<(), CodecError>,
    {
        if self.broken {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection unusable after a framing failure",
            )));
        }

        let header = MessageHeader {
            message_type,
            service,
            request,
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let mut encoder = BasicEncoder::with_header(&header);
        write_args(&mut encoder)?;
        if let Err(e) = write_frame(&mut self.stream, &encoder.into_bytes()).await {
            self.broken = true;
            return Err(e.into());
        }
        Ok(header)
    }

    async fn receive_reply(&mut self, call: &MessageHeader) -> Result<BasicDecoder> {
        loop {
            let mut reply = BasicDecoder::new(self.next_frame().await?);
            let header = reply.read_header()?;
            let answers = matches!(
                header.message_type,
                MessageType::Reply | MessageType::Notification
            );

            if answers && is_earlier(header.sequence, call.sequence) {
                tracing::debug!(
                    sequence = header.sequence,
                    expected = call.sequence,
                    "Discarding reply to an abandoned call"
                );
                continue;
            }
            if answers
                && header.service == call.service
                && header.request == call.request
                && header.sequence == call.sequence
            {
                return Ok(reply);
            }
            return Err(Error::unexpected_reply(format!(
                "expected {:?}, got {:?}",
                call.reply(),
                header
            )));
        }
    }

    /// Next complete frame. Cancel-safe: partial frames stay in `read_buf`.
    async fn next_frame(&mut self) -> Result<Bytes> {
        loop {
            match decode_frame(&mut self.read_buf, self.ipc_config.max_frame_bytes) {
                Ok(Some(payload)) => return Ok(payload),
                Ok(None) => {}
                Err(e) => {
                    if !e.is_recoverable() {
                        self.broken = true;
                    }
                    return Err(e.into());
                }
            }

            match self.stream.read_buf(&mut self.read_buf).await {
                Ok(0) => {
                    self.broken = true;
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed before reply",
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    self.broken = true;
                    return Err(e.into());
                }
            }
        }
    }
}

/// `sequence` was issued before `current`, allowing for wrap-around.
fn is_earlier(sequence: u32, current: u32) -> bool {
    let distance = current.wrapping_sub(sequence);
    distance != 0 && distance <= u32::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::frame::read_frame;
    use crate::types::FrameError;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn short_timeout() -> IpcConfig {
        IpcConfig {
            call_timeout: Duration::from_millis(50),
            ..IpcConfig::default()
        }
    }

    /// Encoded reply frame echoing the call's header with `sequence` as result.
    async fn reply_frame(request: &[u8]) -> Vec<u8> {
        let header = BasicDecoder::new(request.to_vec()).read_header().unwrap();
        let mut encoder = BasicEncoder::with_header(&header.reply());
        encoder.write_u32(header.sequence);
        let mut wire = Vec::new();
        write_frame(&mut wire, &encoder.into_bytes()).await.unwrap();
        wire
    }

    /// Answers every call, holding the first reply back for 150ms. With
    /// `split_first` the first reply is written in two pieces around the delay.
    async fn late_server(split_first: bool) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut first = true;
            while let Ok(Some(request)) = read_frame(&mut stream, 65535).await {
                let wire = reply_frame(&request).await;
                if first {
                    first = false;
                    let split = if split_first { 2 } else { 0 };
                    stream.write_all(&wire[..split]).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    stream.write_all(&wire[split..]).await.unwrap();
                } else {
                    stream.write_all(&wire).await.unwrap();
                }
            }
        });
        addr
    }

    async fn call_sequence(client: &mut RpcClient) -> Result<u32> {
        let mut reply = client.invoke(1, 1, |_| Ok(())).await?;
        Ok(reply.read_u32()?)
    }

    /// Accepts one connection and answers every frame with `reply`.
    async fn canned_server(reply: Vec<u8>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(_)) = read_frame(&mut stream, 65535).await {
                write_frame(&mut stream, &reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_rejects_reply_with_wrong_sequence() {
        let wrong = BasicEncoder::with_header(&MessageHeader {
            message_type: MessageType::Reply,
            service: 1,
            request: 1,
            sequence: 41,
        });
        let addr = canned_server(wrong.into_bytes().to_vec()).await;

        let mut client = RpcClient::connect(addr, IpcConfig::default()).await.unwrap();
        let err = client.invoke(1, 1, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply(_)));
    }

    #[tokio::test]
    async fn test_times_out_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let config = IpcConfig {
            call_timeout: Duration::from_millis(50),
            ..IpcConfig::default()
        };
        let mut client = RpcClient::connect(addr, config).await.unwrap();
        let err = client.invoke(1, 1, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_argument_encoding_error_is_not_sent() {
        let addr = canned_server(Vec::new()).await;
        let mut client = RpcClient::connect(addr, IpcConfig::default()).await.unwrap();
        let err = client
            .invoke(1, 1, |args| args.write_callback(&[1u8, 2], &3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::InvalidCallback)));
    }

    #[tokio::test]
    async fn test_late_reply_is_skipped_after_timeout() {
        let addr = late_server(false).await;
        let mut client = RpcClient::connect(addr, short_timeout()).await.unwrap();

        let err = call_sequence(&mut client).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        for expected in 1..4 {
            assert_eq!(call_sequence(&mut client).await.unwrap(), expected);
        }
        assert!(!client.is_broken());
    }

    #[tokio::test]
    async fn test_timeout_mid_frame_keeps_stream_aligned() {
        let addr = late_server(true).await;
        let mut client = RpcClient::connect(addr, short_timeout()).await.unwrap();

        let err = call_sequence(&mut client).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        assert_eq!(call_sequence(&mut client).await.unwrap(), 1);
        assert_eq!(call_sequence(&mut client).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_oversized_reply_breaks_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(_)) = read_frame(&mut stream, 65535).await {
                stream.write_all(&[0xFF, 0xFF, 0x00, 0x00]).await.unwrap();
            }
        });

        let config = IpcConfig {
            max_frame_bytes: 64,
            ..IpcConfig::default()
        };
        let mut client = RpcClient::connect(addr, config).await.unwrap();
        let err = client.invoke(1, 1, |_| Ok(())).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::FrameTooLarge { length: 65535, limit: 64 })
        ));
        assert!(client.is_broken());

        let err = client.invoke(1, 1, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotConnected));
        let err = client.send_oneway(1, 2, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_accepts_matching_notification() {
        let notification = BasicEncoder::with_header(&MessageHeader {
            message_type: MessageType::Notification,
            service: 1,
            request: 1,
            sequence: 0,
        });
        let addr = canned_server(notification.into_bytes().to_vec()).await;

        let mut client = RpcClient::connect(addr, IpcConfig::default()).await.unwrap();
        let reply = client.invoke(1, 1, |_| Ok(())).await.unwrap();
        assert_eq!(reply.remaining(), 0);
    }

    #[tokio::test]
    async fn test_closed_connection_breaks_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream, 65535).await;
        });

        let mut client = RpcClient::connect(addr, IpcConfig::default()).await.unwrap();
        let err = client.invoke(1, 1, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
        assert!(client.is_broken());
    }

    #[test]
    fn test_is_earlier_wraps() {
        assert!(is_earlier(0, 1));
        assert!(is_earlier(u32::MAX, 0));
        assert!(!is_earlier(5, 5));
        assert!(!is_earlier(41, 0));
    }
}
