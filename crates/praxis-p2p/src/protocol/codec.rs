//! Canonical-JSON codecs for the libp2p `request_response` protocols.
//!
//! Wire format per message:
//!   [4 bytes big-endian length][canonical-JSON-encoded payload]

use std::io;

use async_trait::async_trait;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::{request_response, StreamProtocol};
use serde::{de::DeserializeOwned, Serialize};

use super::types::{CardExchangeRequest, CardExchangeResponse, McpRequest, McpResponse};

const MAX_MSG_BYTES: usize = 4 * 1024 * 1024; // 4 MiB

pub const CARD_EXCHANGE_PROTO: StreamProtocol = StreamProtocol::new("/ai-agent/card/1.0.0");
pub const MCP_BRIDGE_PROTO: StreamProtocol = StreamProtocol::new("/mcp/bridge/1.0.0");

fn encode_canonical<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    praxis_canon::canonicalize_value(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn decode_json<T: DeserializeOwned>(data: &[u8]) -> io::Result<T> {
    serde_json::from_slice(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

async fn write_framed<W, T>(io: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize,
{
    let payload = encode_canonical(value)?;
    if payload.len() > MAX_MSG_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }
    let len = payload.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(&payload).await?;
    io.close().await
}

async fn read_framed<R, T>(io: &mut R) -> io::Result<T>
where
    R: AsyncRead + Unpin + Send,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MSG_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "incoming message too large",
        ));
    }
    let mut payload = vec![0u8; len];
    io.read_exact(&mut payload).await?;
    decode_json(&payload)
}

/// `request_response::Codec` for capability-card exchange.
#[derive(Clone, Default, Debug)]
pub struct CardExchangeCodec;

#[async_trait]
impl request_response::Codec for CardExchangeCodec {
    type Protocol = StreamProtocol;
    type Request = CardExchangeRequest;
    type Response = CardExchangeResponse;

    async fn read_request<T>(&mut self, _proto: &StreamProtocol, io: &mut T) -> io::Result<CardExchangeRequest>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_framed(io).await
    }

    async fn read_response<T>(&mut self, _proto: &StreamProtocol, io: &mut T) -> io::Result<CardExchangeResponse>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_framed(io).await
    }

    async fn write_request<T>(
        &mut self,
        _proto: &StreamProtocol,
        io: &mut T,
        req: CardExchangeRequest,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_framed(io, &req).await
    }

    async fn write_response<T>(
        &mut self,
        _proto: &StreamProtocol,
        io: &mut T,
        resp: CardExchangeResponse,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_framed(io, &resp).await
    }
}

/// `request_response::Codec` for the MCP bridge: a peer forwards an
/// `McpRequest` and gets back the responder's local `McpResponse`.
#[derive(Clone, Default, Debug)]
pub struct McpBridgeCodec;

#[async_trait]
impl request_response::Codec for McpBridgeCodec {
    type Protocol = StreamProtocol;
    type Request = McpRequest;
    type Response = McpResponse;

    async fn read_request<T>(&mut self, _proto: &StreamProtocol, io: &mut T) -> io::Result<McpRequest>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_framed(io).await
    }

    async fn read_response<T>(&mut self, _proto: &StreamProtocol, io: &mut T) -> io::Result<McpResponse>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_framed(io).await
    }

    async fn write_request<T>(
        &mut self,
        _proto: &StreamProtocol,
        io: &mut T,
        req: McpRequest,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_framed(io, &req).await
    }

    async fn write_response<T>(
        &mut self,
        _proto: &StreamProtocol,
        io: &mut T,
        resp: McpResponse,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_framed(io, &resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    #[tokio::test]
    async fn card_exchange_round_trips_through_the_frame() {
        let mut buf = Vec::new();
        write_framed(
            &mut buf,
            &CardExchangeResponse {
                card: praxis_card::CapabilityCard::builder("agent", "1.0"),
            },
        )
        .await
        .unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded: CardExchangeResponse = read_framed(&mut cursor).await.unwrap();
        assert_eq!(decoded.card.name, "agent");
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_MSG_BYTES as u32) + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let result: io::Result<CardExchangeResponse> = read_framed(&mut cursor).await;
        assert!(result.is_err());
    }
}
