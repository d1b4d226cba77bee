//! Drives two in-process connections through handshake, a multi-call
//! exchange, and shutdown over a `tokio::io::duplex` pair — no real socket
//! involved.

use protocol_core::config::ConfigBuilder;
use protocol_core::connection::{Connection, Role};
use protocol_core::message::{Args, CallResponse, ErrorCode, Headers};
use protocol_core::checksum::ChecksumType;
use tokio_util::compat::TokioAsyncReadCompatExt;

async fn establish_pair(
    max_frame_size: usize,
) -> (
    Connection,
    Connection,
    tokio::sync::mpsc::UnboundedReceiver<protocol_core::connection::Inbound>,
    tokio::sync::mpsc::UnboundedReceiver<protocol_core::connection::Inbound>,
) {
    let (client_io, server_io) = tokio::io::duplex(1024 * 1024);
    let client_io = client_io.compat();
    let server_io = server_io.compat();

    let server_config = ConfigBuilder::new("127.0.0.1:9000", "it-server")
        .max_frame_size(max_frame_size)
        .build();
    let client_config = ConfigBuilder::new("127.0.0.1:9001", "it-client")
        .max_frame_size(max_frame_size)
        .build();

    let server_fut = Connection::establish(server_io, server_config, Role::Acceptor);
    let client_fut = Connection::establish(client_io, client_config, Role::Initiator);
    let (server_result, client_result) = tokio::join!(server_fut, client_fut);
    let (server_conn, server_inbound, _) =
        server_result.unwrap_or_else(|e| panic!("server handshake: {e}"));
    let (client_conn, client_inbound, _) =
        client_result.unwrap_or_else(|e| panic!("client handshake: {e}"));

    (client_conn, server_conn, client_inbound, server_inbound)
}

#[tokio::test]
async fn full_call_response_cycle_across_many_ids() {
    let (client, server, mut client_inbound, mut server_inbound) = establish_pair(65535).await;

    let server_task = tokio::spawn(async move {
        for _ in 0..5 {
            let call = server_inbound.recv().await.expect("inbound call");
            let reply = format!("echo:{}", String::from_utf8_lossy(&call.request.args.arg3));
            call.responder
                .respond(CallResponse {
                    more_fragments: false,
                    tracing: call.request.tracing,
                    headers: Headers::new(),
                    checksum_type: ChecksumType::Crc32,
                    args: Args {
                        arg1: Vec::new(),
                        arg2: Vec::new(),
                        arg3: reply.into_bytes(),
                    },
                })
                .await
                .unwrap();
        }
    });
    tokio::spawn(async move { while client_inbound.recv().await.is_some() {} });

    for i in 0..5 {
        let response = client
            .call(
                "kv",
                2_000,
                Args {
                    arg1: b"set".to_vec(),
                    arg2: Vec::new(),
                    arg3: format!("value-{i}").into_bytes(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&response.args.arg3),
            format!("echo:value-{i}")
        );
    }

    server_task.await.unwrap();
    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn application_error_surfaces_to_caller() {
    let (client, _server, mut client_inbound, mut server_inbound) = establish_pair(65535).await;
    tokio::spawn(async move { while client_inbound.recv().await.is_some() {} });

    tokio::spawn(async move {
        let call = server_inbound.recv().await.expect("inbound call");
        call.responder
            .respond_error(ErrorCode::BadRequest, "no such key")
            .await
            .unwrap();
    });

    let err = client
        .call(
            "kv",
            2_000,
            Args {
                arg1: b"get".to_vec(),
                arg2: Vec::new(),
                arg3: b"missing".to_vec(),
            },
        )
        .await
        .unwrap_err();
    match err {
        protocol_core::Error::Remote(code, msg) => {
            assert_eq!(code, ErrorCode::BadRequest as u8);
            assert_eq!(msg, "no such key");
        }
        other => panic!("expected Remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn large_call_fragments_across_many_small_frames() {
    let (client, server, mut client_inbound, mut server_inbound) = establish_pair(256).await;
    tokio::spawn(async move { while client_inbound.recv().await.is_some() {} });

    let server_task = tokio::spawn(async move {
        let call = server_inbound.recv().await.expect("inbound call");
        assert_eq!(call.request.args.arg3.len(), 50_000);
        call.responder
            .respond(CallResponse {
                more_fragments: false,
                tracing: call.request.tracing,
                headers: Headers::new(),
                checksum_type: ChecksumType::None,
                args: Args {
                    arg1: Vec::new(),
                    arg2: Vec::new(),
                    arg3: vec![0x42; 30_000],
                },
            })
            .await
            .unwrap();
    });

    let response = client
        .call(
            "blob",
            10_000,
            Args {
                arg1: b"put".to_vec(),
                arg2: Vec::new(),
                arg3: vec![0x99; 50_000],
            },
        )
        .await
        .unwrap();
    assert_eq!(response.args.arg3.len(), 30_000);

    server_task.await.unwrap();
    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn closing_one_side_fails_the_others_pending_calls() {
    let (client, server, mut client_inbound, server_inbound) = establish_pair(65535).await;
    tokio::spawn(async move { while client_inbound.recv().await.is_some() {} });
    drop(server_inbound);

    server.close().await;

    let result = client
        .call(
            "kv",
            1_000,
            Args {
                arg1: b"get".to_vec(),
                arg2: Vec::new(),
                arg3: b"key".to_vec(),
            },
        )
        .await;
    assert!(result.is_err());
}
