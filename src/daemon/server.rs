//! Daemon server — Unix socket server that handles CLI requests.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::config::DATA_DIR;
use crate::resolve::ResolveRequest;
use crate::service::KnowledgeBase;

use super::protocol::{Request, Response};

/// Default socket path (in project's .cartograph directory)
pub fn socket_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join("cartograph.sock")
}

/// PID file path
pub fn pid_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join("daemon.pid")
}

/// Serve `kb` on the project's socket until a `shutdown` request arrives.
pub async fn start_daemon(root: &Path, kb: Arc<KnowledgeBase>) -> Result<()> {
    let sock_path = socket_path(root);
    let pid_file = pid_path(root);

    if let Some(dir) = sock_path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    // Remove stale socket if exists
    if sock_path.exists() {
        tokio::fs::remove_file(&sock_path).await?;
    }

    tokio::fs::write(&pid_file, std::process::id().to_string()).await?;

    let listener = UnixListener::bind(&sock_path)
        .with_context(|| format!("binding {}", sock_path.display()))?;
    info!(socket = %sock_path.display(), "daemon listening");

    kb.start();
    let shutdown = Arc::new(Notify::new());

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let kb = Arc::clone(&kb);
                    let shutdown = Arc::clone(&shutdown);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, &kb, &shutdown).await {
                            debug!(error = %e, "client handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            },
            _ = shutdown.notified() => break,
        }
    }

    info!("daemon shutting down");
    kb.shutdown();
    let _ = tokio::fs::remove_file(&sock_path).await;
    let _ = tokio::fs::remove_file(&pid_file).await;

    Ok(())
}

/// Handle a single client connection. Requests are answered in order until
/// the client closes its end.
async fn handle_client(stream: UnixStream, kb: &KnowledgeBase, shutdown: &Notify) -> Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!(?request, "received request");
                process_request(request, kb).await
            }
            Err(e) => Response::error(format!("bad request: {}", e)),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;

        if matches!(response, Response::Goodbye) {
            shutdown.notify_one();
            break;
        }
    }

    Ok(())
}

fn respond<T: serde::Serialize>(result: crate::Result<T>) -> Response {
    match result {
        Ok(data) => Response::ok(data),
        Err(e) => Response::error(e.to_string()),
    }
}

/// Process a request and return a response. Also used by the CLI when no
/// daemon is running.
pub async fn process_request(request: Request, kb: &KnowledgeBase) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Shutdown => Response::Goodbye,

        // ─── Queries ───────────────────────────────────────────
        Request::Search { query, version } => {
            respond(kb.search(&query, version.as_deref()).await)
        }

        Request::Node { id, version } => respond(kb.get_node(&id, version.as_deref()).await),

        Request::Callers {
            id,
            max_depth,
            include_indirect,
            version,
        } => respond(
            kb.callers(&id, max_depth, include_indirect, version.as_deref())
                .await,
        ),

        Request::Callees {
            id,
            max_depth,
            include_indirect,
            version,
        } => respond(
            kb.callees(&id, max_depth, include_indirect, version.as_deref())
                .await,
        ),

        Request::Inheritance {
            id,
            max_depth,
            version,
        } => respond(kb.inheritance(&id, max_depth, version.as_deref()).await),

        Request::Implementations { id, version } => {
            respond(kb.implementations(&id, version.as_deref()).await)
        }

        Request::Resolve {
            name,
            kind,
            containing_type,
            namespace,
            version,
        } => {
            let req = ResolveRequest {
                name,
                kind,
                containing_type,
                namespace,
            };
            respond(kb.resolve(&req, version.as_deref()).await)
        }

        Request::Stats { version } => respond(kb.statistics(version.as_deref()).await),

        Request::Versions => respond(kb.versions().await),

        // ─── Writes ────────────────────────────────────────────
        Request::Ingest { batch } => respond(kb.ingest(&batch).await),

        Request::DeleteSource { source_file } => {
            respond(kb.delete_source_file(&source_file).await)
        }

        // ─── Cache ─────────────────────────────────────────────
        Request::CacheStats => Response::ok(kb.cache_stats()),

        Request::CacheInvalidate { version } => {
            kb.invalidate_cache(version.as_deref());
            Response::ok(serde_json::json!({
                "invalidated": version.unwrap_or_else(|| "*".to_string())
            }))
        }

        Request::CacheToggle { enabled } => {
            kb.set_cache_enabled(enabled);
            Response::ok(kb.cache_stats())
        }
    }
}

/// Check if daemon is running by checking PID file and process.
pub fn is_daemon_running(root: &Path) -> bool {
    let pid_file = pid_path(root);

    if !pid_file.exists() {
        return false;
    }

    // Read PID and check if process is alive
    if let Ok(pid_str) = std::fs::read_to_string(&pid_file) {
        if let Ok(pid) = pid_str.trim().parse::<i32>() {
            // Check if process exists (signal 0 = check existence)
            unsafe {
                return libc::kill(pid, 0) == 0;
            }
        }
    }

    false
}

/// Send a request to the daemon and get a response.
pub async fn send_request(root: &Path, request: &Request) -> Result<Response> {
    let sock_path = socket_path(root);
    let stream = UnixStream::connect(&sock_path)
        .await
        .with_context(|| format!("connecting to {}", sock_path.display()))?;
    let (read_half, mut writer) = stream.into_split();

    let mut request_json = serde_json::to_string(request)?;
    request_json.push('\n');
    writer.write_all(request_json.as_bytes()).await?;
    writer.flush().await?;

    let mut lines = BufReader::new(read_half).lines();
    let line = lines
        .next_line()
        .await?
        .context("daemon closed the connection without replying")?;

    let response: Response = serde_json::from_str(&line)?;
    Ok(response)
}
