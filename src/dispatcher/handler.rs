use super::context::{Request, Response};
use crate::error::HandlerResult;

/// Something bound to a verb or status code.
///
/// Configurable handlers (the compiling servers) are structs implementing
/// this trait with their configuration as fields. A bare closure is wrapped
/// in [`FnHandler`] at registration time.
pub trait Handler: Send + Sync {
    /// Produce a status code. 200-class codes mean the response has been
    /// finalized; anything else may trigger an error handler.
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult;
}

/// Normalized form of a bare callable registered as a handler.
pub struct FnHandler<F>(pub F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        (self.0)(req, res)
    }
}

/// Renderer handed to a custom 500 handler so it can fall back to the
/// built-in diagnostic page.
pub type DiagnosticRenderer = fn(&Request, &mut Response);

/// Entry of the status-code error handler table.
pub(crate) enum ErrorRoute {
    /// Any handler, invoked like a verb handler
    Handler(Box<dyn Handler>),
    /// A 500 handler that also receives the default diagnostic renderer
    Internal(Box<InternalFn>),
}

pub(crate) type InternalFn =
    dyn Fn(&mut Request, &mut Response, DiagnosticRenderer) -> HandlerResult + Send + Sync;

impl ErrorRoute {
    pub(crate) fn invoke(
        &self,
        req: &mut Request,
        res: &mut Response,
        fallback: DiagnosticRenderer,
    ) -> HandlerResult {
        match self {
            ErrorRoute::Handler(handler) => handler.handle(req, res),
            ErrorRoute::Internal(f) => f(req, res, fallback),
        }
    }
}
