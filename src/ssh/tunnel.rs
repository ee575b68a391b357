// ABOUTME: Local Unix socket that relays every connection to a remote socket over SSH.
// ABOUTME: Used to reach /var/run/docker.sock on hosts without exposing the engine on TCP.

use super::error::{Error, Result};
use super::session::HostKeyVerifier;
use russh::client::Handle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running socket relay. Dropping it stops accepting and removes the socket file.
pub struct Tunnel {
    local_path: PathBuf,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Tunnel {
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.shutdown.cancel();
        let _ = std::fs::remove_file(&self.local_path);
    }
}

pub(crate) fn open(handle: Arc<Handle<HostKeyVerifier>>, remote_socket: String) -> Result<Tunnel> {
    let local_path = next_socket_path();
    let _ = std::fs::remove_file(&local_path);

    let listener = UnixListener::bind(&local_path)
        .map_err(|e| Error::Tunnel(format!("cannot bind {}: {}", local_path.display(), e)))?;

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(accept_loop(
        listener,
        handle,
        remote_socket,
        shutdown.clone(),
    ));

    Ok(Tunnel {
        local_path,
        shutdown,
        task: Some(task),
    })
}

fn next_socket_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("hadron-{}-{}.sock", std::process::id(), n))
}

async fn accept_loop(
    listener: UnixListener,
    handle: Arc<Handle<HostKeyVerifier>>,
    remote_socket: String,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _)) => {
                let handle = Arc::clone(&handle);
                let remote_socket = remote_socket.clone();
                let shutdown = shutdown.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        relayed = relay(stream, &handle, &remote_socket) => {
                            if let Err(e) = relayed {
                                tracing::debug!(error = %e, "tunnel connection ended with error");
                            }
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "tunnel accept failed");
                break;
            }
        }
    }
}

async fn relay(
    mut local: UnixStream,
    handle: &Handle<HostKeyVerifier>,
    remote_socket: &str,
) -> Result<()> {
    let channel = handle
        .channel_open_direct_streamlocal(remote_socket)
        .await
        .map_err(|e| Error::Tunnel(format!("cannot open {}: {}", remote_socket, e)))?;
    let mut remote = channel.into_stream();
    tokio::io::copy_bidirectional(&mut local, &mut remote).await?;
    Ok(())
}
