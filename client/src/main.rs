mod rpc_client;

use rpc_client::{ClientTarget, RpcClient};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // let target = ClientTarget::Unix(PathBuf::from("/tmp/protocol-core.sock"));
    let target = ClientTarget::Tcp("127.0.0.1:7890".parse().unwrap());

    let client = RpcClient::new(target, "demo-client");
    client
        .call_once("kv", "getValue", b"hello from the demo client")
        .await;
}
