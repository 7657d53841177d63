//! End-to-end scenarios from spec.md §8, run against a real TCP loopback
//! connection between a `DirectClient` and a `Server`.

use std::time::Duration;

use rpc_test_support::{adder_service, connect, err_service, slow_service, spawn_server, Args, UserReq, UserResp};

#[tokio::test]
async fn simple_add_returns_sum() {
    let addr = spawn_server(vec![adder_service()]).await;
    let client = connect(addr).await;

    let mut reply: i64 = 0;
    client
        .call("Adder", "Add", &Args { a: 3, b: 5 }, &mut reply)
        .await
        .expect("Add should succeed");
    assert_eq!(reply, 8);
}

#[tokio::test]
async fn struct_shaped_reply_round_trips() {
    let addr = spawn_server(vec![adder_service()]).await;
    let client = connect(addr).await;

    let req = UserReq {
        user_id: 10045,
        user_name: "Zev".to_owned(),
        married: true,
        param: Args { a: 11, b: 5 },
    };
    let mut reply = UserResp::default();
    client
        .call("Adder", "DoComplex", &req, &mut reply)
        .await
        .expect("DoComplex should succeed");

    assert_eq!(
        reply,
        UserResp {
            uuid: "ABCD-ABCD-ABCD-ABCD-ABCD".to_owned(),
            address: "CHINA".to_owned(),
            status: vec![Args { a: 3, b: 4 }, Args { a: 6, b: 8 }],
        }
    );
}

#[tokio::test]
async fn method_error_surfaces_exact_text_and_connection_survives() {
    let addr = spawn_server(vec![err_service(), adder_service()]).await;
    let client = connect(addr).await;

    let mut reply = UserResp::default();
    let err = client
        .call("ErrService", "GetErr", &UserReq::default(), &mut reply)
        .await
        .expect_err("GetErr always fails");
    assert_eq!(err.to_string(), "remote returned an error: a unexpected error");

    // The connection must still be usable for a later call.
    let mut sum = 0i64;
    client
        .call("Adder", "Add", &Args { a: 1, b: 2 }, &mut sum)
        .await
        .expect("connection should remain usable after a per-call error");
    assert_eq!(sum, 3);
}

#[tokio::test]
async fn type_mismatched_reply_fails_to_decode() {
    let addr = spawn_server(vec![adder_service()]).await;
    let client = connect(addr).await;

    let req = UserReq {
        user_id: 1,
        user_name: "x".to_owned(),
        married: false,
        param: Args { a: 1, b: 1 },
    };
    // DoComplex's reply is a UserResp on the wire; decoding it as an i64
    // must fail rather than silently truncate.
    let mut reply: i64 = 0;
    let err = client.call("Adder", "DoComplex", &req, &mut reply).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn cancelled_call_does_not_desync_the_next_call() {
    let addr = spawn_server(vec![slow_service(Duration::from_secs(3))]).await;
    let client = connect(addr).await;

    let req = UserReq {
        user_id: 1,
        user_name: "x".to_owned(),
        married: false,
        param: Args { a: 1, b: 1 },
    };
    let mut reply = UserResp::default();
    let err = client
        .call_with_timeout("SlowAdder", "DoComplex", &req, &mut reply, Duration::from_millis(100))
        .await
        .expect_err("100ms deadline should fire before the 3s sleep completes");
    assert_eq!(err.to_string(), "call was cancelled");

    let mut sum = 0i64;
    client
        .call("SlowAdder", "Add", &Args { a: 1, b: 2 }, &mut sum)
        .await
        .expect("a call right after a cancellation must still decode correctly");
    assert_eq!(sum, 3);
}
