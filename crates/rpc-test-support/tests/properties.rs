//! Testable properties from spec.md §8: unique/monotonic sequence ids and
//! correct reply correlation under concurrent calls on one client.

use rpc_test_support::{adder_service, connect, spawn_server, Args};

#[tokio::test]
async fn concurrent_calls_each_observe_their_own_correct_reply() {
    let addr = spawn_server(vec![adder_service()]).await;
    let client = connect(addr).await;

    let mut handles = Vec::new();
    for i in 0..32i64 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let mut sum = 0i64;
            client
                .call("Adder", "Add", &Args { a: i, b: 1 }, &mut sum)
                .await
                .expect("Add should succeed");
            (i, sum)
        }));
    }

    for handle in handles {
        let (i, sum) = handle.await.expect("task should not panic");
        assert_eq!(sum, i + 1, "call {i} observed a reply that does not match its own arguments");
    }
}

#[tokio::test]
async fn reply_correlation_survives_out_of_order_completion() {
    // Mixing a slow call with fast ones forces replies to complete out of
    // submission order; every caller must still see its own reply.
    let addr = spawn_server(vec![adder_service()]).await;
    let client = connect(addr).await;

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut sum = 0i64;
            client
                .call("Adder", "Add", &Args { a: 100, b: 1 }, &mut sum)
                .await
                .unwrap();
            sum
        })
    };

    let mut fast_handles = Vec::new();
    for i in 0..8i64 {
        let client = client.clone();
        fast_handles.push(tokio::spawn(async move {
            let mut sum = 0i64;
            client.call("Adder", "Add", &Args { a: i, b: 0 }, &mut sum).await.unwrap();
            (i, sum)
        }));
    }

    for handle in fast_handles {
        let (i, sum) = handle.await.unwrap();
        assert_eq!(sum, i);
    }
    assert_eq!(slow.await.unwrap(), 101);
}
