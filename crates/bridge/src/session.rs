//! MCP protocol session over a line-delimited byte stream (stdio in production).
//!
//! One JSON-RPC message per line. Requests other than `tools/call` are answered inline;
//! each `tools/call` runs on its own task so slow backends do not block the session. A single
//! writer task owns the output stream, so response lines never interleave.
//!
//! A malformed line (bad JSON or invalid UTF-8) is answered with a parse error and the session
//! keeps reading.

use crate::dispatcher::{Dispatcher, ToolCall};
use rmcp::model::Tool;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Protocol version answered when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;
const SERVER_NOT_INITIALIZED: i64 = -32002;

/// How long in-flight tool calls may keep running once shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serve one session until `reader` reaches EOF.
///
/// In-flight tool calls are awaited before returning, and every response they produce is
/// written.
///
/// # Errors
///
/// Returns an error if reading the input or writing the output fails.
pub async fn serve<R, W>(dispatcher: Dispatcher, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    serve_until(dispatcher, reader, writer, std::future::pending()).await
}

/// Like [`serve`], but stops reading once `shutdown` resolves.
///
/// Tool calls already in flight at that point get up to [`SHUTDOWN_GRACE`] to finish and have
/// their responses written; calls still running after that are aborted.
///
/// # Errors
///
/// Returns an error if reading the input or writing the output fails.
pub async fn serve_until<R, W, S>(
    dispatcher: Dispatcher,
    reader: R,
    writer: W,
    shutdown: S,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_frames(writer, rx));

    let mut session = Session {
        dispatcher,
        initialized: false,
        tx,
        in_flight: JoinSet::new(),
    };

    info!("session started");
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::new();
    tokio::pin!(shutdown);
    let (read_result, interrupted) = loop {
        line.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut line) => Some(read),
            () = &mut shutdown => None,
        };
        match read {
            Some(Ok(0)) => break (Ok(()), false),
            Some(Ok(_)) => {
                session.handle_line(&line);
                while session.in_flight.try_join_next().is_some() {}
            }
            Some(Err(e)) => break (Err(e), false),
            None => break (Ok(()), true),
        }
    };

    let pending = session.in_flight.len();
    if interrupted {
        info!(pending, "shutdown requested");
        if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut session.in_flight))
            .await
            .is_err()
        {
            warn!(
                aborted = session.in_flight.len(),
                "tool calls still running at shutdown"
            );
            session.in_flight.abort_all();
        }
    } else {
        if pending > 0 {
            debug!(pending, "waiting for in-flight tool calls");
        }
        drain(&mut session.in_flight).await;
    }
    drop(session);

    let write_result = writer_task.await.map_err(io::Error::other)?;
    info!("session ended");
    read_result.and(write_result)
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "tool call task failed");
        }
    }
}

struct Session {
    dispatcher: Dispatcher,
    initialized: bool,
    tx: mpsc::UnboundedSender<Value>,
    in_flight: JoinSet<()>,
}

impl Session {
    fn handle_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        // Invalid UTF-8 is a parse error like any other malformed frame.
        let msg: Value = match serde_json::from_slice(line) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "unparseable frame");
                self.send(error_frame(&Value::Null, PARSE_ERROR, "Parse error"));
                return;
            }
        };

        // Replies from the client; this server never issues requests.
        if msg.get("result").is_some() || msg.get("error").is_some() {
            return;
        }

        let id = msg.get("id").cloned();
        let Some(method) = msg.get("method").and_then(Value::as_str) else {
            self.send(error_frame(
                &id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid request",
            ));
            return;
        };

        let Some(id) = id else {
            debug!(method, "notification");
            return;
        };

        let params = msg.get("params");
        match method {
            "initialize" => {
                self.initialized = true;
                info!("client initialized");
                self.send(result_frame(&id, &initialize_result(params)));
            }
            "ping" => self.send(result_frame(&id, &json!({}))),
            "tools/list" | "tools/call" if !self.initialized => {
                self.send(error_frame(
                    &id,
                    SERVER_NOT_INITIALIZED,
                    "Server not initialized",
                ));
            }
            "tools/list" => {
                let tools = ToolList {
                    tools: self.dispatcher.list_tools(),
                };
                self.send(result_frame(&id, &tools));
            }
            "tools/call" => match parse_tool_call(params) {
                Ok(call) => self.spawn_call(id, call),
                Err(message) => self.send(error_frame(&id, INVALID_PARAMS, &message)),
            },
            other => {
                self.send(error_frame(
                    &id,
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {other}"),
                ));
            }
        }
    }

    fn spawn_call(&mut self, id: Value, call: ToolCall) {
        debug!(tool = %call.name, "dispatching tool call");
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        self.in_flight.spawn(async move {
            let result = dispatcher.dispatch(call).await;
            let _ = tx.send(result_frame(&id, &result));
        });
    }

    fn send(&self, frame: Value) {
        // Fails only once the writer has stopped; the read loop notices on its own.
        let _ = self.tx.send(frame);
    }
}

#[derive(Serialize)]
struct ToolList {
    tools: Vec<Tool>,
}

fn initialize_result(params: Option<&Value>) -> Value {
    let protocol_version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

fn parse_tool_call(params: Option<&Value>) -> Result<ToolCall, String> {
    let Some(params) = params.and_then(Value::as_object) else {
        return Err("params must be an object".to_string());
    };
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return Err("params.name must be a string".to_string());
    };
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return Err("params.arguments must be an object".to_string()),
    };
    Ok(ToolCall::new(name, arguments))
}

fn result_frame<T: Serialize>(id: &Value, result: &T) -> Value {
    match serde_json::to_value(result) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(e) => error_frame(id, INTERNAL_ERROR, &format!("failed to encode result: {e}")),
    }
}

fn error_frame(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

async fn write_frames<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
