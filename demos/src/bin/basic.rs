//! Replies with the id of the request it was invoked for.

use std::convert::Infallible;
use std::process::ExitCode;

use ferrule_engine::{Context, Options};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Response {
    #[serde(rename = "requestId")]
    request_id: String,
}

async fn handler(ctx: Context, _event: serde_json::Value) -> Result<Response, Infallible> {
    Ok(Response {
        request_id: ctx.request_id().to_string(),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    ferrule_engine::start(handler, Options::new()).await
}
