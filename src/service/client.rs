//! Client side of the resident service.
//!
//! A request that finds no service listening starts one (`lia serve` from the
//! current executable, detached into its own process group with output
//! appended to the daemon log) and is retried once the socket accepts
//! connections.

use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tokio::net::UnixStream;

use super::protocol::{read_frame, write_frame, Request, Response};
use crate::config::LiaConfig;
use crate::error::{LiaError, Result};
use crate::search::SearchHit;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ServiceClient {
    socket_path: PathBuf,
    log_file: PathBuf,
    start_timeout: Duration,
    autostart: bool,
}

impl ServiceClient {
    pub fn new(socket_path: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            log_file: log_file.into(),
            start_timeout: Duration::from_secs(30),
            autostart: true,
        }
    }

    pub fn from_config(config: &LiaConfig) -> Self {
        Self {
            start_timeout: Duration::from_secs(config.server.start_timeout_secs),
            ..Self::new(config.resolved_socket_path(), config.resolved_log_file())
        }
    }

    /// Never start a service; connection failures are returned as is.
    pub fn without_autostart(mut self) -> Self {
        self.autostart = false;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn search(&self, query: &str, topic_filter: Option<&str>) -> Result<Vec<SearchHit>> {
        let request = Request::search(query, topic_filter.map(str::to_string));
        Ok(self.request(&request).await?.results)
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .request(&Request::history(limit))
            .await?
            .history
            .unwrap_or_default())
    }

    pub async fn ping(&self) -> Result<()> {
        self.request(&Request::ping()).await.map(|_| ())
    }

    /// Stop the service. Returns `false` if none was running; never starts one.
    pub async fn stop(&self) -> Result<bool> {
        match self.exchange(&Request::stop()).await {
            Ok(response) => into_result(response).map(|_| true),
            Err(LiaError::IpcConnection { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn request(&self, request: &Request) -> Result<Response> {
        let response = match self.exchange(request).await {
            Err(LiaError::IpcConnection { path, source }) if self.autostart => {
                tracing::debug!(socket = %path.display(), error = %source, "no service, starting one");
                let child = self.spawn_service()?;
                self.wait_until_ready(child).await?;
                self.exchange(request).await?
            }
            other => other?,
        };
        into_result(response)
    }

    async fn exchange(&self, request: &Request) -> Result<Response> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| LiaError::IpcConnection {
                path: self.socket_path.clone(),
                source,
            })?;
        write_frame(&mut stream, request).await?;
        read_frame(&mut stream)
            .await?
            .ok_or_else(|| LiaError::Protocol("service closed the connection".into()))
    }

    fn spawn_service(&self) -> Result<Child> {
        let exe = std::env::current_exe()?;
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        let child = Command::new(exe)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .process_group(0)
            .spawn()?;
        tracing::info!(pid = child.id(), log = %self.log_file.display(), "started matching service");
        Ok(child)
    }

    /// Poll until the socket accepts a connection, the child exits, or the
    /// start timeout elapses.
    async fn wait_until_ready(&self, mut child: Child) -> Result<()> {
        let deadline = Instant::now() + self.start_timeout;
        loop {
            // Checked first: a concurrently started service may own the socket
            // while our child exits because of it.
            if UnixStream::connect(&self.socket_path).await.is_ok() {
                return Ok(());
            }
            if let Some(status) = child.try_wait()? {
                return Err(LiaError::ModelLoad(format!(
                    "matching service exited during startup ({status}); see {}",
                    self.log_file.display()
                )));
            }
            if Instant::now() >= deadline {
                return Err(LiaError::Service(format!(
                    "matching service did not start within {}s; see {}",
                    self.start_timeout.as_secs(),
                    self.log_file.display()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn into_result(response: Response) -> Result<Response> {
    match response.error {
        Some(message) => Err(LiaError::Service(message)),
        None => Ok(response),
    }
}
