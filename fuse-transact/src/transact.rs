//! The call-by-call transaction pump
//!
//! One invocation per channel exchange: consumes at most one inbound
//! reply and produces at most one outbound request.

use crate::context::FuseContext;
use crate::decode::FuseResponse;
use crate::encode::RequestBuilder;
use crate::instance::{CancelToken, FuseInstance, ReadyWait};
use crate::kernel::FUSE_MIN_READ_BUFFER;
use crate::provider::{NtStatus, Provider};

use tracing::debug;

/// Failures surfaced to the caller of an exchange.
///
/// Remote protocol errors are not exchange failures: they become the
/// operation's own result status.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransactError {
    #[error("malformed reply buffer")]
    InvalidParameter,

    #[error("request buffer below the protocol minimum")]
    BufferTooSmall,

    #[error("readiness wait cancelled")]
    Cancelled,

    #[error("protocol negotiation was denied")]
    AccessDenied,

    #[error("framework delivery failed: {0:?}")]
    Provider(NtStatus),
}

impl FuseInstance {
    /// Runs one channel exchange.
    ///
    /// `response` carries the peer's reply to an earlier request, if
    /// any; `request` receives the next outbound message, if the caller
    /// can transmit one. Returns the number of bytes written into
    /// `request` (zero when no message was built).
    ///
    /// # Errors
    /// Returns [`TransactError`] for malformed buffers, framework
    /// delivery failures, a cancelled readiness wait or a denied
    /// negotiation; see the error type for the taxonomy.
    pub fn transact(
        &self,
        provider: &dyn Provider,
        response: Option<&[u8]>,
        request: Option<&mut [u8]>,
        cancel: &CancelToken,
    ) -> Result<usize, TransactError> {
        // both buffers are validated before any context lookup
        let response = match response {
            Some(buf) => {
                Some(FuseResponse::parse(buf).map_err(|_| TransactError::InvalidParameter)?)
            }
            None => None,
        };
        if let Some(buf) = request.as_deref() {
            if buf.len() < FUSE_MIN_READ_BUFFER as usize {
                return Err(TransactError::BufferTooSmall);
            }
        }

        if let Some(rsp) = response {
            self.consume_reply(provider, &rsp)?;
        }

        match request {
            Some(buf) => self.produce_request(provider, buf, cancel),
            None => Ok(0),
        }
    }

    fn consume_reply(
        &self,
        provider: &dyn Provider,
        rsp: &FuseResponse<'_>,
    ) -> Result<(), TransactError> {
        let mut ctx = match self.ioq().end_processing(rsp.unique()) {
            Some(ctx) => ctx,
            None => {
                // the operation was already finished or cancelled
                debug!(unique = rsp.unique(), "stale reply dropped");
                return Ok(());
            }
        };

        if ctx.resume_with(self, rsp) {
            // another request must be sent for the same operation
            self.ioq().post_pending(ctx);
        } else if ctx.has_handle() {
            let result = ctx.take_response();
            drop(ctx);
            provider.deliver(result).map_err(TransactError::Provider)?;
        }
        // engine-originated operations end here without delivery
        Ok(())
    }

    fn produce_request(
        &self,
        provider: &dyn Provider,
        buf: &mut [u8],
        cancel: &CancelToken,
    ) -> Result<usize, TransactError> {
        let mut builder = RequestBuilder::new(buf);

        let mut ctx = match self.ioq().next_pending() {
            Some(ctx) => ctx,
            None => {
                // nothing queued: ask the framework for a new operation,
                // but only once the protocol version is settled
                match self.gate().wait_ready(cancel) {
                    ReadyWait::Cancelled => return Err(TransactError::Cancelled),
                    ReadyWait::Denied => return Err(TransactError::AccessDenied),
                    ReadyWait::Ready => {}
                }

                match provider.next_request().map_err(TransactError::Provider)? {
                    Some(request) => {
                        debug!(hint = request.hint, "new operation");
                        FuseContext::from_request(self.next_token(), request)
                    }
                    None => return Ok(0),
                }
            }
        };

        let suspended = if ctx.pre_resolved().is_some() {
            false
        } else {
            ctx.send(self, &mut builder)
        };

        if suspended {
            self.ioq().start_processing(ctx);
        } else if let Some(status) = ctx.pre_resolved() {
            // outcome known without a protocol round trip
            let mut result = ctx.take_response();
            result.status = status;
            drop(ctx);
            provider.deliver(result).map_err(TransactError::Provider)?;
        } else if !ctx.has_handle() && ctx.undrained_forget() {
            // keep draining the forget payload on later exchanges
            self.ioq().post_pending(ctx);
        } else if ctx.has_handle() {
            let result = ctx.take_response();
            drop(ctx);
            provider.deliver(result).map_err(TransactError::Provider)?;
        }

        Ok(builder.written())
    }
}
