//! Process wiring: source reader, broadcaster and HTTP server together

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::http::{AppState, StreamServer};
use crate::source::{SourceReader, StreamEnd};

/// A configured relay with its listener already bound
pub struct Relay {
    broadcaster: Broadcaster,
    source: SourceReader,
    server: StreamServer,
}

impl Relay {
    /// Bind the listener described by `config`
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let addr = config.listen_addr()?;
        let broadcaster = Broadcaster::new(config.queue_capacity);
        let source = SourceReader::new(&config.fifo, config.chunk_size);
        let state = Arc::new(AppState::new(broadcaster.clone(), source.stats()));
        let server = StreamServer::bind(addr, state).await?;

        Ok(Self {
            broadcaster,
            source,
            server,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.local_addr()?)
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Run until `shutdown` resolves
    ///
    /// Failing to open the source is fatal and returned as an error. Once the
    /// source is open, its end (clean or not) is only logged and the server
    /// keeps accepting listeners, who will receive nothing further.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Relay {
            broadcaster,
            source,
            server,
        } = self;

        tracing::info!(addr = %server.local_addr()?, "Server started");

        let serve = server.serve(shutdown);
        tokio::pin!(serve);

        tokio::select! {
            served = &mut serve => {
                broadcaster.close_all();
                served?;
                return Ok(());
            }
            outcome = source.run(&broadcaster) => match outcome {
                Ok(StreamEnd::Eof) => {
                    tracing::info!("Audio source closed; listeners stay connected");
                }
                Err(e) if e.is_startup() => {
                    tracing::error!("Error opening audio source: {}", e);
                    broadcaster.close_all();
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::error!("Error reading audio source: {}", e);
                }
            },
        }

        serve.await?;
        Ok(())
    }
}
