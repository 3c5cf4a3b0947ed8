//! Tower middleware enforcing x402 payments on the routes it wraps.
//!
//! ```ignore
//! let offer = PaymentRequirement::for_network("base-sepolia", pay_to, "1000000", resource)?;
//! let layer = X402Layer::new(Paygate::try_new(vec![offer], FacilitatorClient::from_env()?)?);
//! let app = Router::new().route("/data", get(handler)).layer(layer);
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use super::paygate::Paygate;

/// Layer wrapping services in a [`Paygate`].
#[derive(Debug, Clone)]
pub struct X402Layer {
    gate: Arc<Paygate>,
}

impl X402Layer {
    /// Creates a layer enforcing `gate`.
    #[must_use]
    pub fn new(gate: Paygate) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    /// The gate this layer enforces.
    #[must_use]
    pub fn paygate(&self) -> &Paygate {
        &self.gate
    }
}

impl From<Paygate> for X402Layer {
    fn from(gate: Paygate) -> Self {
        Self::new(gate)
    }
}

impl<S> Layer<S> for X402Layer
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = X402Service;

    fn layer(&self, inner: S) -> Self::Service {
        X402Service {
            gate: Arc::clone(&self.gate),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service that runs every request through a [`Paygate`] before the wrapped
/// service.
#[derive(Clone)]
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct X402Service {
    gate: Arc<Paygate>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl Service<Request> for X402Service {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        let inner = self.inner.clone();
        Box::pin(async move { Ok(gate.handle_request(inner, req).await) })
    }
}
