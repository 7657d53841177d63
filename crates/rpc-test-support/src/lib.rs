//! Shared fixtures for RPC runtime tests: an `Adder`/`ErrService`-style demo
//! service (grounded in the source's `test` package) and a harness to spin
//! up a client/server pair over real TCP on loopback.

mod fixtures;
mod harness;

pub use fixtures::{adder_service, err_service, slow_service, Args, UserReq, UserResp};
pub use harness::{connect, spawn_server};
