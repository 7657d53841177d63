use serde::{Deserialize, Serialize};

use rpc_server::Service;

/// Mirrors the source's `test.Args` — also exercised as the nested field of
/// [`UserReq`]/[`UserResp::status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Args {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserReq {
    pub user_id: i64,
    pub user_name: String,
    pub married: bool,
    pub param: Args,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserResp {
    pub uuid: String,
    pub address: String,
    pub status: Vec<Args>,
}

/// Builds the `Adder` service from spec.md §8's end-to-end scenarios 1-2:
/// `Add` sums its arguments, `DoComplex` returns a fixed response.
pub fn adder_service() -> Service {
    Service::new("Adder")
        .method("Add", |args: Args| async move { Ok::<i64, String>(args.a + args.b) })
        .method("DoComplex", |_req: UserReq| async move {
            Ok::<UserResp, String>(UserResp {
                uuid: "ABCD-ABCD-ABCD-ABCD-ABCD".to_owned(),
                address: "CHINA".to_owned(),
                status: vec![Args { a: 3, b: 4 }, Args { a: 6, b: 8 }],
            })
        })
}

/// Builds the `ErrService` service from spec.md §8 scenario 3: `GetErr`
/// always fails with a fixed error text.
pub fn err_service() -> Service {
    Service::new("ErrService").method("GetErr", |_req: UserReq| async move {
        Err::<UserResp, String>("a unexpected error".to_owned())
    })
}

/// Builds the `SlowAdder` service used by spec.md §8 scenario 5: `DoComplex`
/// sleeps before replying, long enough for a short client deadline to fire
/// first.
pub fn slow_service(sleep: std::time::Duration) -> Service {
    Service::new("SlowAdder")
        .method("Add", |args: Args| async move { Ok::<i64, String>(args.a + args.b) })
        .method("DoComplex", move |_req: UserReq| {
            let sleep = sleep;
            async move {
                tokio::time::sleep(sleep).await;
                Ok::<UserResp, String>(UserResp {
                    uuid: "ABCD-ABCD-ABCD-ABCD-ABCD".to_owned(),
                    address: "CHINA".to_owned(),
                    status: vec![],
                })
            }
        })
}
