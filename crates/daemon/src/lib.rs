//! The codescope daemon: a line-delimited JSON-RPC server over stdio,
//! routing the query tool surface onto one dispatcher.

mod lifecycle;
mod router;
mod server;
mod tools;

pub use lifecycle::{Daemon, LifecycleError, build_router, run};
pub use router::{Request, Response, Router, RpcError};
pub use server::{Server, ShutdownHandle};
pub use tools::ToolHandler;
