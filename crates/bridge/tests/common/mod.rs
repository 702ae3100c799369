use anyhow::Context as _;
use serde_json::Value;
use std::io::{BufRead as _, BufReader, Write as _};
use std::process::{ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

pub use unrelated_test_support::{KillOnDrop, StubServer};

/// The bridge binary with piped stdio, killed on drop.
pub struct BridgeProcess {
    child: KillOnDrop,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl BridgeProcess {
    pub fn spawn(args: &[&str], envs: &[(&str, &str)]) -> anyhow::Result<Self> {
        let bin = env!("CARGO_BIN_EXE_unrelated-mcp-rest-bridge");
        let mut cmd = Command::new(bin);
        cmd.args(args)
            .env_remove("REST_BRIDGE_BASE_URL")
            .env_remove("REST_BRIDGE_API_KEY")
            .env_remove("RUST_LOG")
            .envs(envs.iter().copied())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().context("spawn bridge")?;

        let stdin = child.stdin.take().context("bridge stdin")?;
        let stdout = child.stdout.take().context("bridge stdout")?;
        Ok(Self {
            child: KillOnDrop(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    pub fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        writeln!(stdin, "{}", serde_json::to_string(msg)?)?;
        stdin.flush()?;
        Ok(())
    }

    /// Read the next frame; errors on EOF.
    pub fn recv(&mut self) -> anyhow::Result<Value> {
        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).context("read bridge stdout")?;
        anyhow::ensure!(n > 0, "bridge closed stdout");
        serde_json::from_str(&line).with_context(|| format!("parse frame: {line}"))
    }

    pub fn request(&mut self, id: u64, method: &str, params: Value) -> anyhow::Result<Value> {
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))?;
        let resp = self.recv()?;
        anyhow::ensure!(resp["id"] == id, "unexpected response: {resp}");
        Ok(resp)
    }

    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    pub fn wait(&mut self) -> anyhow::Result<ExitStatus> {
        self.child.0.wait().context("wait for bridge")
    }
}

/// Text of the first content block of a `tools/call` response.
pub fn tool_text(resp: &Value) -> anyhow::Result<&str> {
    resp["result"]["content"][0]["text"]
        .as_str()
        .with_context(|| format!("no text content in {resp}"))
}
