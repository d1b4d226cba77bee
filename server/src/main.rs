mod rpc_server;

use rpc_server::{RpcServer, ServerTarget};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // let target = ServerTarget::Unix(PathBuf::from("/tmp/protocol-core.sock"));
    let target = ServerTarget::Tcp("127.0.0.1:7890".parse().unwrap());

    let server = RpcServer::new(target);
    server.run().await;
}
