use crate::router::{self, AppState};
use assist_core::ipc::{decode_request, encode_response, AssistResponse};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

fn le_codec() -> LengthDelimitedCodec {
    // 4-byte little-endian length prefix + MessagePack payload
    LengthDelimitedCodec::builder().little_endian().new_codec()
}

pub async fn run_unix_server(
    socket_path: &str,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC Server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let state = state.clone();
                tokio::spawn(async move {
                    let (read, write) = stream.into_split();
                    serve_connection(read, write, &state).await;
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

/// Answer framed requests on one connection until the peer hangs up.
pub async fn serve_connection<R, W>(read: R, write: W, state: &AppState)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match decode_request(&bytes_mut) {
            Ok(request) => router::handle_request(request, state).await,
            Err(e) => AssistResponse::err(format!("Deserialization error: {}", e))
                .with_kind("client_input"),
        };

        match encode_response(&response) {
            Ok(resp_bytes) => {
                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist_core::catalog::Catalog;
    use assist_core::config::AssistConfig;
    use assist_core::gateway::{Gateway, HttpGateway};
    use assist_core::ipc::AssistRequest;
    use assist_core::renderer::EchoRenderer;
    use assist_core::session_store::InMemorySessionStore;
    use crate::subsystems::booking::BookingOrchestrator;

    fn test_state() -> AppState {
        let config = AssistConfig::from_toml(
            r#"
            [service]
            socket_path = "/tmp/assist-ipc-test.sock"
            log_level = "debug"

            [gateway]
            base_url = "http://127.0.0.1:9"
            "#,
        )
        .unwrap();
        let gateway = Gateway::from_http(HttpGateway::new(&config.gateway).unwrap());

        AppState {
            orchestrator: Arc::new(BookingOrchestrator::new(
                Arc::new(InMemorySessionStore::new()),
                gateway,
                Arc::new(EchoRenderer),
                "Bangalore",
            )),
            catalog: Arc::new(Catalog::default()),
            backend: None,
            config,
        }
    }

    async fn round_trip<S>(framed: &mut tokio_util::codec::Framed<S, LengthDelimitedCodec>, payload: Vec<u8>) -> AssistResponse
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        framed.send(Bytes::from(payload)).await.unwrap();
        let frame = framed.next().await.unwrap().unwrap();
        rmp_serde::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_framed_requests_answered_in_order() {
        let state = Arc::new(test_state());
        let (client, server) = tokio::io::duplex(64 * 1024);

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            let (read, write) = tokio::io::split(server);
            serve_connection(read, write, &server_state).await;
        });

        let mut framed = tokio_util::codec::Framed::new(client, le_codec());

        let pong = round_trip(&mut framed, rmp_serde::to_vec_named(&AssistRequest::Ping).unwrap()).await;
        assert!(pong.is_ok());
        assert_eq!(pong.data.unwrap()["pong"], true);

        let created = round_trip(
            &mut framed,
            rmp_serde::to_vec_named(&AssistRequest::CreateSession {
                customer_id: Some("C1".to_string()),
                vin: Some("V1".to_string()),
            })
            .unwrap(),
        )
        .await;
        let session_id = created.data.unwrap()["session_id"].as_str().unwrap().to_string();

        let greeting = round_trip(
            &mut framed,
            rmp_serde::to_vec_named(&AssistRequest::SendMessage {
                session_id: Some(session_id.clone()),
                message: Some("hello".to_string()),
                customer_id: None,
                vin: None,
                coordinates: None,
            })
            .unwrap(),
        )
        .await;
        let data = greeting.data.unwrap();
        assert_eq!(data["outcome"], "greeting");
        assert_eq!(data["session_id"], session_id.as_str());

        drop(framed);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_error_response() {
        let state = Arc::new(test_state());
        let (client, server) = tokio::io::duplex(4096);

        let server_state = state.clone();
        tokio::spawn(async move {
            let (read, write) = tokio::io::split(server);
            serve_connection(read, write, &server_state).await;
        });

        let mut framed = tokio_util::codec::Framed::new(client, le_codec());
        let resp = round_trip(&mut framed, vec![0xc1, 0x00, 0xff]).await;

        assert!(!resp.is_ok());
        assert_eq!(resp.kind.as_deref(), Some("client_input"));
        assert!(resp.error.unwrap().starts_with("Deserialization error"));
    }
}
