//! Request tracing middleware.

use std::time::Instant;

use tracing::{Instrument, error, info, info_span};

use super::{Middleware, Next};
use crate::error::Result;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Opens an `http.request` span around the rest of the pipeline and logs
/// the outcome with its latency.
///
/// Register it first so the span covers every other middleware.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn process(&self, req: Request, next: Next) -> BoxFuture<Result<Response>> {
        let span = info_span!("http.request", method = %req.method(), path = req.path());

        Box::pin(
            async move {
                let started = Instant::now();
                let result = next.run(req).await;
                let latency_us = started.elapsed().as_micros() as u64;

                match &result {
                    Ok(res) => info!(status = res.status_code().as_u16(), latency_us, "request completed"),
                    Err(e) => error!(error = %e, latency_us, "request failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}
