use std::net::SocketAddr;
use std::path::PathBuf;

use protocol_core::checksum::ChecksumType;
use protocol_core::config::ConfigBuilder;
use protocol_core::connection::{Connection, Role};
use protocol_core::message::{Args, CallResponse, Headers};
use tokio::net::{TcpListener, UnixListener};
use tokio_util::compat::TokioAsyncReadCompatExt;

#[allow(dead_code)]
#[derive(Debug)]
pub enum ServerTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

pub struct RpcServer {
    target: ServerTarget,
}

impl RpcServer {
    pub fn new(target: ServerTarget) -> Self {
        Self { target }
    }

    pub async fn run(&self) {
        match &self.target {
            ServerTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path).expect("failed to bind unix socket");
                log::info!("server listening on unix socket {:?}", path);
                loop {
                    let (stream, _) = listener.accept().await.expect("failed to accept");
                    log::info!("accepted unix connection");
                    tokio::spawn(Self::handle_connection(stream.compat()));
                }
            }
            ServerTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await.expect("failed to bind tcp socket");
                log::info!("server listening on tcp {:?}", addr);
                loop {
                    let (stream, peer) = listener.accept().await.expect("failed to accept");
                    log::info!("accepted tcp connection from {:?}", peer);
                    tokio::spawn(Self::handle_connection(stream.compat()));
                }
            }
        }
    }

    /// Drives one accepted connection: performs the handshake as the
    /// acceptor, then answers every inbound call with an echo-style reply.
    async fn handle_connection<T>(stream: T)
    where
        T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + 'static,
    {
        let config = ConfigBuilder::new("0.0.0.0:0", "demo-server").build();
        let (_conn, mut inbound, handle) =
            match Connection::establish(stream, config, Role::Acceptor).await {
                Ok(parts) => parts,
                Err(e) => {
                    log::error!("handshake failed: {}", e);
                    return;
                }
            };

        while let Some(call) = inbound.recv().await {
            log::info!(
                "inbound call id={} service={} endpoint={}",
                call.id,
                call.request.service,
                String::from_utf8_lossy(&call.request.args.arg1)
            );

            let reply = format!(
                "ack: {}",
                String::from_utf8_lossy(&call.request.args.arg3)
            );
            let response = CallResponse {
                more_fragments: false,
                tracing: call.request.tracing,
                headers: Headers::new(),
                checksum_type: ChecksumType::Crc32,
                args: Args {
                    arg1: Vec::new(),
                    arg2: Vec::new(),
                    arg3: reply.into_bytes(),
                },
            };
            if let Err(e) = call.responder.respond(response).await {
                log::error!("failed to send response: {}", e);
            }
        }

        log::info!("connection closed");
        let _ = handle.await;
    }
}
