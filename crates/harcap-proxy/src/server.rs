use crate::handler::HarCaptureHandler;
use crate::{CertificateAuthority, Error, Result};
use harcap_core::HarRecorder;
use hudsucker::Proxy;
use rustls::crypto::aws_lc_rs::default_provider;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// MITM proxy that records every exchange into a [`HarRecorder`]
pub struct ProxyServer {
    addr: SocketAddr,
    ca: CertificateAuthority,
    recorder: Arc<HarRecorder>,
}

impl ProxyServer {
    /// A proxy listening on `127.0.0.1:port`
    pub fn new(port: u16, ca: CertificateAuthority, recorder: Arc<HarRecorder>) -> Self {
        Self {
            addr: ([127, 0, 0, 1], port).into(),
            ca,
            recorder,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn recorder(&self) -> &Arc<HarRecorder> {
        &self.recorder
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let authority = self.ca.to_authority()?;

        let proxy = Proxy::builder()
            .with_addr(self.addr)
            .with_ca(authority)
            .with_rustls_connector(default_provider())
            .with_http_handler(HarCaptureHandler::new(Arc::clone(&self.recorder)))
            .with_graceful_shutdown(shutdown)
            .build()
            .map_err(|e| Error::Proxy(format!("Failed to build proxy: {}", e)))?;

        tracing::info!("Proxy listening on http://{}", self.addr);

        proxy
            .start()
            .await
            .map_err(|e| Error::Proxy(format!("Proxy failed: {}", e)))?;

        tracing::info!(
            "Proxy stopped with {} flows still in flight",
            self.recorder.in_flight_count()
        );
        Ok(())
    }
}

/// Resolves on Ctrl+C. Never resolves when the handler cannot be installed.
pub async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
