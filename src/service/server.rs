//! Resident matching service.
//!
//! Holds the loaded model, the embedding cache, the knowledge store and the
//! query history for the lifetime of the process. Connections are handled on
//! their own tasks; every request is executed by a single blocking worker in
//! arrival order, so a slow query delays later ones but a vanished client
//! never affects service state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

use super::protocol::{read_frame, write_frame, Op, Request, Response};
use crate::config::LiaConfig;
use crate::embedding::{self, EmbeddingCache, EmbeddingProvider};
use crate::error::{LiaError, Result};
use crate::history::QueryHistory;
use crate::knowledge::KnowledgeStore;
use crate::search::QueryPipeline;

/// Default number of entries returned for a history request without a limit.
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Pending requests beyond this block the submitting connection.
const QUEUE_DEPTH: usize = 64;

/// Everything a request needs, owned by the worker.
pub struct ServiceContext {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    store: KnowledgeStore,
    history: QueryHistory,
}

impl ServiceContext {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: EmbeddingCache,
        store: KnowledgeStore,
        history: QueryHistory,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            history,
        }
    }

    /// Build the context from configuration around an already loaded model.
    ///
    /// A database that cannot be opened only costs persistence: the cache
    /// falls back to memory.
    pub fn open(config: &LiaConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = KnowledgeStore::open(
            config.resolved_data_dir(),
            &config.storage.catch_all_topic,
        )?;
        let model_version = provider.model_version().to_string();

        let cache = if config.storage.persist_embeddings {
            let db_path = config.resolved_db_path();
            match crate::db::open_database(&db_path) {
                Ok(conn) => EmbeddingCache::with_store(model_version, conn)?,
                Err(e) => {
                    tracing::warn!(
                        db = %db_path.display(),
                        error = %format!("{e:#}"),
                        "embedding cache not persisted"
                    );
                    EmbeddingCache::new(model_version)
                }
            }
        } else {
            EmbeddingCache::new(model_version)
        };

        tracing::info!(
            data_dir = %store.data_dir().display(),
            cached = cache.len(),
            "service context ready"
        );

        Ok(Self::new(
            provider,
            cache,
            store,
            QueryHistory::new(config.resolved_history_path()),
        ))
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Execute one request.
    pub fn handle(&mut self, request: Request) -> Response {
        match request.op {
            Op::Search => {
                let Some(query) = request.query.filter(|q| !q.trim().is_empty()) else {
                    return Response::error("search request without a query");
                };
                if let Err(e) = self.history.append(&query) {
                    tracing::warn!(error = %e, "failed to record query history");
                }
                let mut pipeline =
                    QueryPipeline::new(&mut self.store, &self.cache, self.provider.as_ref());
                match pipeline.search(&query, request.topic_filter.as_deref()) {
                    Ok(results) => Response::results(results),
                    Err(e) => {
                        tracing::warn!(query = %query, error = %e, "search failed");
                        Response::error(e.to_string())
                    }
                }
            }
            Op::History => {
                match self
                    .history
                    .recent(request.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
                {
                    Ok(entries) => Response::history(entries),
                    Err(e) => Response::error(e.to_string()),
                }
            }
            Op::Ping | Op::Stop => Response::default(),
        }
    }
}

struct Job {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// A bound service, ready to accept connections.
pub struct ResidentService {
    listener: UnixListener,
    socket_path: PathBuf,
    jobs: mpsc::Sender<Job>,
    worker: JoinHandle<()>,
}

impl ResidentService {
    /// Bind the socket and start the worker. Must be called inside a tokio
    /// runtime.
    ///
    /// A leftover socket file from a dead service is removed; a live one is
    /// an error.
    pub fn bind(socket_path: impl AsRef<Path>, context: ServiceContext) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        if socket_path.exists() {
            if std::os::unix::net::UnixStream::connect(&socket_path).is_ok() {
                return Err(LiaError::Service(format!(
                    "another service is already listening on {}",
                    socket_path.display()
                )));
            }
            std::fs::remove_file(&socket_path)?;
            tracing::debug!(socket = %socket_path.display(), "removed stale socket");
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        let (jobs, queue) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::task::spawn_blocking(move || run_worker(context, queue));

        tracing::info!(socket = %socket_path.display(), "listening");
        Ok(Self {
            listener,
            socket_path,
            jobs,
            worker,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until a stop request or a termination signal.
    /// Queued requests are answered before the socket is removed.
    pub async fn run(self) -> Result<()> {
        let shutdown = Arc::new(Notify::new());
        let mut terminate = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let jobs = self.jobs.clone();
                        let shutdown = Arc::clone(&shutdown);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, jobs, shutdown).await {
                                tracing::warn!(error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                _ = shutdown.notified() => {
                    tracing::info!("stop requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted, draining queue");
                    submit(&self.jobs, Request::stop()).await;
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("terminated, draining queue");
                    submit(&self.jobs, Request::stop()).await;
                    break;
                }
            }
        }

        let Self {
            listener,
            socket_path,
            jobs,
            worker,
        } = self;
        drop(listener);
        drop(jobs);
        if let Err(e) = std::fs::remove_file(&socket_path) {
            tracing::warn!(socket = %socket_path.display(), error = %e, "failed to remove socket");
        }
        worker
            .await
            .map_err(|e| LiaError::Service(format!("worker panicked: {e}")))?;
        tracing::info!("service stopped");
        Ok(())
    }
}

/// Load the model, build the context and serve until stopped.
///
/// The model is loaded before the socket is bound, so clients never connect
/// to a service that cannot answer.
pub async fn serve(config: LiaConfig) -> anyhow::Result<()> {
    tracing::info!(model = %config.embedding.model, "loading embedding model");
    let embedding_config = config.embedding.clone();
    let provider = tokio::task::spawn_blocking(move || embedding::create_provider(&embedding_config))
        .await?
        .map_err(|e| {
            tracing::error!(error = %format!("{e:#}"), "model load failed");
            LiaError::ModelLoad(format!("{e:#}"))
        })?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(provider);
    tracing::info!("embedding provider ready");

    let context = ServiceContext::open(&config, provider)?;
    let service = ResidentService::bind(config.resolved_socket_path(), context)?;
    service.run().await?;
    Ok(())
}

fn run_worker(mut context: ServiceContext, mut queue: mpsc::Receiver<Job>) {
    while let Some(Job { request, reply }) = queue.blocking_recv() {
        let stop = request.op == Op::Stop;
        let response = context.handle(request);
        // The client may have gone away; its answer is discarded.
        let _ = reply.send(response);
        if stop {
            break;
        }
    }
    tracing::debug!(
        cache_hits = context.cache().hits(),
        cache_misses = context.cache().misses(),
        "worker finished"
    );
}

async fn submit(jobs: &mpsc::Sender<Job>, request: Request) -> Response {
    let (reply, answer) = oneshot::channel();
    if jobs.send(Job { request, reply }).await.is_err() {
        return Response::error("service is shutting down");
    }
    answer
        .await
        .unwrap_or_else(|_| Response::error("service is shutting down"))
}

async fn handle_connection(
    mut stream: UnixStream,
    jobs: mpsc::Sender<Job>,
    shutdown: Arc<Notify>,
) -> Result<()> {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(LiaError::Protocol(message)) => {
                tracing::warn!(%message, "rejected frame");
                write_frame(&mut stream, &Response::error(message)).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let op = request.op;
        tracing::debug!(?op, "request");
        let response = submit(&jobs, request).await;
        let written = write_frame(&mut stream, &response).await;
        if op == Op::Stop {
            shutdown.notify_one();
            return written;
        }
        written?;
    }
}
