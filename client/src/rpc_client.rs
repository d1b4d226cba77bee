use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use log::*;
use tokio::net::{TcpStream, UnixStream};
use tokio_util::compat::TokioAsyncReadCompatExt;

use protocol_core::config::ConfigBuilder;
use protocol_core::connection::{Connection, Role};
use protocol_core::message::Args;

#[allow(dead_code)]
#[derive(Debug)]
pub enum ClientTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

pub struct RpcClient {
    target: ClientTarget,
    process_name: String,
}

impl RpcClient {
    pub fn new(target: ClientTarget, process_name: impl Into<String>) -> Self {
        Self {
            target,
            process_name: process_name.into(),
        }
    }

    /// Connects, issues a single call against `service`/`endpoint`, and
    /// prints the response payload.
    pub async fn call_once(&self, service: &str, endpoint: &str, payload: &[u8]) {
        info!("connecting to target: {:?}", self.target);
        match &self.target {
            ClientTarget::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .expect("failed to connect unix socket");
                info!("unix socket connected");
                self.process_stream(stream.compat(), service, endpoint, payload)
                    .await;
            }
            ClientTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr)
                    .await
                    .expect("failed to connect tcp socket");
                info!("tcp socket connected");
                self.process_stream(stream.compat(), service, endpoint, payload)
                    .await;
            }
        }
    }

    async fn process_stream<T>(&self, stream: T, service: &str, endpoint: &str, payload: &[u8])
    where
        T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + 'static,
    {
        let config = ConfigBuilder::new("0.0.0.0:0", self.process_name.clone()).build();
        let (conn, mut inbound, handle) = Connection::establish(stream, config, Role::Initiator)
            .await
            .expect("handshake failed");

        // This demo client never accepts inbound calls; drain the channel so
        // the receive loop never blocks trying to deliver one.
        tokio::spawn(async move { while inbound.recv().await.is_some() {} });

        info!("sending call {}::{}", service, endpoint);
        let start = Instant::now();
        let response = conn
            .call(
                service,
                5_000,
                Args {
                    arg1: endpoint.as_bytes().to_vec(),
                    arg2: Vec::new(),
                    arg3: payload.to_vec(),
                },
            )
            .await
            .expect("call failed");
        let elapsed = start.elapsed();

        info!(
            "received {} byte response in {:.2}ms",
            response.args.arg3.len(),
            elapsed.as_secs_f64() * 1000.0
        );
        info!("{}", String::from_utf8_lossy(&response.args.arg3));

        conn.close().await;
        let _ = handle.await;
    }
}
