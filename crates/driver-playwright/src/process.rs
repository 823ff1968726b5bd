//! Sidecar process lifecycle and request/reply correlation.
//!
//! Requests get sequential ids; a oneshot channel per id correlates the
//! reply. The reader task owns the child's stdout and completes pending
//! channels as reply lines arrive. When the sidecar dies, every pending
//! request fails with a transport error instead of hanging.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as NodeCommand};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::protocol::{Command, Request, Response, WireError};

const DRIVER_JS: &str = include_str!("driver.js");

/// How a request failed: the sidecar answered with an error payload, or
/// the process or pipe went away.
#[derive(Debug)]
pub(crate) enum RequestFailure {
    Wire(WireError),
    Transport(String),
}

impl RequestFailure {
    pub(crate) fn message(&self) -> String {
        match self {
            RequestFailure::Wire(err) => err.message.clone(),
            RequestFailure::Transport(reason) => reason.clone(),
        }
    }

    pub(crate) fn is_timeout(&self) -> bool {
        matches!(self, RequestFailure::Wire(err) if err.is_timeout())
    }
}

type Callbacks = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RequestFailure>>>>>;

/// One running sidecar: the `node` child plus its reply dispatch task.
pub(crate) struct DriverProcess {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    callbacks: Callbacks,
    last_id: AtomicU64,
}

impl DriverProcess {
    /// Writes the embedded script into the system temp dir, spawns `node`
    /// on it and starts the reader tasks.
    pub(crate) async fn spawn(node_binary: &Path) -> std::io::Result<Self> {
        // Unique per spawn: watching both sites runs two sidecars in one
        // process and the scripts must not clobber each other mid-launch.
        static SCRIPT_SEQ: AtomicU64 = AtomicU64::new(0);
        let script_path = std::env::temp_dir().join(format!(
            "rdvw-driver-{}-{}.js",
            std::process::id(),
            SCRIPT_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&script_path, DRIVER_JS).await?;

        let mut child = NodeCommand::new(node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("sidecar stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("sidecar stdout was not piped"))?;
        let stderr = child.stderr.take();

        let callbacks: Callbacks = Arc::new(Mutex::new(HashMap::new()));
        let reader_callbacks = Arc::clone(&callbacks);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => dispatch_line(&reader_callbacks, &line).await,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(
                            target = "rdv.playwright",
                            error = %err,
                            "sidecar stdout read failed"
                        );
                        break;
                    }
                }
            }
            let mut pending = reader_callbacks.lock().await;
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(RequestFailure::Transport(
                    "driver sidecar ended before replying".to_owned(),
                )));
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target = "rdv.playwright", "sidecar: {line}");
                }
            });
        }

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            callbacks,
            last_id: AtomicU64::new(0),
        })
    }

    /// Sends one command and awaits its reply.
    pub(crate) async fn request(&self, command: Command) -> Result<Value, RequestFailure> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.callbacks.lock().await.insert(id, tx);

        let request = Request { id, command };
        let line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(err) => {
                self.callbacks.lock().await.remove(&id);
                return Err(RequestFailure::Transport(format!(
                    "request serialization failed: {err}"
                )));
            }
        };

        {
            let mut stdin = self.stdin.lock().await;
            let write = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            };
            if let Err(err) = write.await {
                self.callbacks.lock().await.remove(&id);
                return Err(RequestFailure::Transport(format!(
                    "sidecar write failed: {err}"
                )));
            }
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RequestFailure::Transport(
                "driver sidecar ended before replying".to_owned(),
            )),
        }
    }

    /// Waits briefly for the child to exit after `close_browser`, then
    /// kills it.
    pub(crate) async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(3), child.wait()).await {
            Ok(Ok(status)) => debug!(target = "rdv.playwright", %status, "sidecar exited"),
            Ok(Err(err)) => warn!(target = "rdv.playwright", error = %err, "sidecar wait failed"),
            Err(_) => {
                warn!(target = "rdv.playwright", "sidecar did not exit in time, killing it");
                if let Err(err) = child.kill().await {
                    warn!(target = "rdv.playwright", error = %err, "sidecar kill failed");
                }
            }
        }
    }
}

async fn dispatch_line(callbacks: &Callbacks, line: &str) {
    let response: Response = match serde_json::from_str(line) {
        Ok(response) => response,
        Err(err) => {
            warn!(
                target = "rdv.playwright",
                error = %err,
                "unparseable sidecar reply: {line}"
            );
            return;
        }
    };
    let Some(tx) = callbacks.lock().await.remove(&response.id) else {
        debug!(
            target = "rdv.playwright",
            id = response.id,
            "reply for an abandoned request"
        );
        return;
    };
    let result = match response.error {
        Some(error) => Err(RequestFailure::Wire(error)),
        None => Ok(response.value.unwrap_or(Value::Null)),
    };
    let _ = tx.send(result);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_callbacks() -> Callbacks {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[tokio::test]
    async fn test_dispatch_completes_the_matching_request() {
        let callbacks = empty_callbacks();
        let (tx, rx) = oneshot::channel();
        callbacks.lock().await.insert(3, tx);

        dispatch_line(&callbacks, r#"{"id":3,"ok":true,"value":42}"#).await;

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value, Value::from(42));
        assert!(callbacks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_routes_error_payloads() {
        let callbacks = empty_callbacks();
        let (tx, rx) = oneshot::channel();
        callbacks.lock().await.insert(0, tx);

        dispatch_line(
            &callbacks,
            r#"{"id":0,"ok":false,"error":{"name":"TimeoutError","message":"Timeout 60000ms exceeded"}}"#,
        )
        .await;

        let failure = rx.await.unwrap().unwrap_err();
        assert!(failure.is_timeout());
        assert!(failure.message().contains("60000ms"));
    }

    #[tokio::test]
    async fn test_dispatch_ignores_abandoned_and_garbage_replies() {
        let callbacks = empty_callbacks();
        // Unknown id and non-JSON are both dropped without side effects.
        dispatch_line(&callbacks, r#"{"id":99,"ok":true,"value":null}"#).await;
        dispatch_line(&callbacks, "not json at all").await;
        assert!(callbacks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_replies_correlate_by_id() {
        let callbacks = empty_callbacks();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        callbacks.lock().await.insert(1, tx_a);
        callbacks.lock().await.insert(2, tx_b);

        dispatch_line(&callbacks, r#"{"id":2,"ok":true,"value":"second"}"#).await;
        dispatch_line(&callbacks, r#"{"id":1,"ok":true,"value":"first"}"#).await;

        assert_eq!(rx_a.await.unwrap().unwrap(), Value::from("first"));
        assert_eq!(rx_b.await.unwrap().unwrap(), Value::from("second"));
    }
}
