//! stdio transport: a spawned child process speaking newline-delimited
//! JSON-RPC on its stdin/stdout. Unlike an echo shim, requests are actually
//! framed and written to the child, and responses are read back and parsed.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};

use praxis_mcp::{McpRequest, McpResponse};

use crate::config::StdioBackendConfig;
use crate::error::BackendError;

/// A running stdio-backend child process and its framed JSON-RPC handles.
pub struct StdioChild {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioChild {
    pub fn spawn(config: &StdioBackendConfig) -> Result<Self, BackendError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        if !config.inherit_env {
            cmd.env_clear();
        }
        for (k, v) in &config.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(BackendError::PipeUnavailable)?;
        let stdout = child.stdout.take().ok_or(BackendError::PipeUnavailable)?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Returns `Some(exit_status)` if the child has already exited, without
    /// blocking.
    pub fn try_wait(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.child.try_wait()
    }

    /// Write `req` as a single JSON-RPC line, read back one response line,
    /// and parse it.
    pub async fn call(&mut self, req: &McpRequest) -> Result<McpResponse, BackendError> {
        let mut line = serde_json::to_vec(req).map_err(|e| BackendError::MalformedFrame(e.to_string()))?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .await
            .map_err(BackendError::Spawn)?;
        self.stdin.flush().await.map_err(BackendError::Spawn)?;

        let response_line = self
            .stdout
            .next_line()
            .await
            .map_err(BackendError::Spawn)?
            .ok_or(BackendError::ChildExited)?;

        serde_json::from_str(&response_line).map_err(|e| BackendError::MalformedFrame(e.to_string()))
    }

    /// Send SIGTERM-equivalent shutdown, wait up to `grace`, then kill.
    pub async fn shutdown(mut self, grace: std::time::Duration) {
        drop(self.stdin);
        let _ = tokio::time::timeout(grace, self.child.wait()).await;
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_roundtrip_via_cat() {
        // `cat` echoes stdin to stdout line-for-line — a cheap stand-in for
        // a real JSON-RPC child in tests.
        let config = StdioBackendConfig {
            command: "cat".to_string(),
            args: Vec::new(),
            env: Default::default(),
            working_dir: None,
            inherit_env: true,
        };
        let mut child = StdioChild::spawn(&config).expect("spawn cat");
        let req = McpRequest {
            id: "1".into(),
            method: "ping".into(),
            server_name: String::new(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: None,
        };
        // `cat` echoes the request bytes back; parse it as a response-shaped
        // value isn't meaningful, so just assert the framing round-trips.
        let line = serde_json::to_string(&req).unwrap();
        child.stdin.write_all(line.as_bytes()).await.unwrap();
        child.stdin.write_all(b"\n").await.unwrap();
        child.stdin.flush().await.unwrap();
        let echoed = child.stdout.next_line().await.unwrap().unwrap();
        assert_eq!(echoed, line);
        child.shutdown(std::time::Duration::from_secs(1)).await;
    }
}
