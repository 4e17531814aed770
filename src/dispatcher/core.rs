//! The application dispatcher: verb routing, lifecycle events and the
//! status-code driven error handling cascade.

use super::context::{Request, Response};
use super::diagnostics::{self, render_internal_error};
use super::handler::{DiagnosticRenderer, ErrorRoute, FnHandler, Handler};
use crate::error::{ControlSignal, Failure, HandlerResult, Interrupt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn};

/// Verb consulted when a request's verb has no route.
pub const NOT_FOUND_VERB: &str = "404";

type RequestListener = Box<dyn Fn(&mut Request, &mut Response) + Send + Sync>;
type ExceptionListener = Box<dyn Fn(&Failure, &Request, &Response) + Send + Sync>;

/// Lifecycle events a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    BeginRequest,
    EndRequest,
}

/// Verb route table, error handler table and lifecycle listeners.
///
/// Tables are built at startup through the `&mut self` registration methods;
/// request handling only reads them, so a built application is shared as
/// `Arc<Application>` without locking.
pub struct Application {
    verbs: HashMap<String, Arc<dyn Handler>>,
    error_handlers: HashMap<u16, ErrorRoute>,
    begin_request: Vec<RequestListener>,
    end_request: Vec<RequestListener>,
    exception: Vec<ExceptionListener>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// Create an application with the built-in 403 and 404 pages.
    pub fn new() -> Self {
        let mut app = Application {
            verbs: HashMap::new(),
            error_handlers: HashMap::new(),
            begin_request: Vec::new(),
            end_request: Vec::new(),
            exception: Vec::new(),
        };
        app.register_error_fn(403, diagnostics::forbidden);
        app.register_error_fn(404, diagnostics::not_found);
        app
    }

    /// Add or replace the handler for `verb`.
    pub fn register_verb<H>(&mut self, verb: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.verbs.insert(verb.into(), Arc::new(handler));
        self
    }

    /// Shorthand for [`register_verb`](Self::register_verb) with a bare callable.
    pub fn register_verb_fn<F>(&mut self, verb: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_verb(verb, FnHandler(f))
    }

    /// Add or replace the handler run when a request ends with `status`.
    pub fn register_error_handler<H>(&mut self, status: u16, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.error_handlers
            .insert(status, ErrorRoute::Handler(Box::new(handler)));
        self
    }

    /// Shorthand for [`register_error_handler`](Self::register_error_handler)
    /// with a bare callable.
    pub fn register_error_fn<F>(&mut self, status: u16, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_error_handler(status, FnHandler(f))
    }

    /// Register a 500 handler that receives the default diagnostic renderer.
    pub fn register_internal_error_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, DiagnosticRenderer) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        self.error_handlers
            .insert(500, ErrorRoute::Internal(Box::new(f)));
        self
    }

    /// Listen for `beginRequest` or `endRequest`. Listeners run in
    /// registration order on the thread handling the request.
    pub fn on<F>(&mut self, event: Event, listener: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        match event {
            Event::BeginRequest => self.begin_request.push(Box::new(listener)),
            Event::EndRequest => self.end_request.push(Box::new(listener)),
        }
        self
    }

    /// Listen for `exception`: fired with each failure before the 500 path.
    pub fn on_exception<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&Failure, &Request, &Response) + Send + Sync + 'static,
    {
        self.exception.push(Box::new(listener));
        self
    }

    /// Registered verbs, sorted.
    #[must_use]
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.verbs.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    #[must_use]
    pub fn has_error_handler(&self, status: u16) -> bool {
        self.error_handlers.contains_key(&status)
    }

    /// Per-request entry point.
    ///
    /// Returns `Err` only for a [`ControlSignal`], which skips the
    /// `endRequest` listeners and must be passed on to the transport
    /// unchanged. Every other outcome, failures included, has been turned
    /// into a response by the time this returns.
    pub fn handle(&self, req: &mut Request, res: &mut Response) -> Result<(), ControlSignal> {
        req.parse_path();
        let span = info_span!("request", method = %req.method, uri = %req.uri, verb = %req.verb);
        let _enter = span.enter();

        match self.dispatch(req, res) {
            Ok(()) => {}
            Err(Interrupt::Control(signal)) => {
                debug!(%signal, "control signal unwinding request");
                return Err(signal);
            }
            Err(Interrupt::Failure(failure)) => self.fail(req, res, failure)?,
        }

        for listener in &self.end_request {
            listener(req, res);
        }
        Ok(())
    }

    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), Interrupt> {
        for listener in &self.begin_request {
            listener(req, res);
        }

        // a beginRequest listener may have rewritten the verb
        let route = self
            .verbs
            .get(&req.verb)
            .or_else(|| self.verbs.get(NOT_FOUND_VERB));
        let status = match route {
            Some(handler) => handler.handle(req, res)?,
            None => {
                debug!(verb = %req.verb, "no route for verb");
                404
            }
        };

        if let Some(route) = self.error_handlers.get(&status) {
            debug!(status, "running error handler");
            // the error route sees the status the handler returned, even when
            // the handler never wrote a head
            res.set_status(status);
            route.invoke(req, res, render_internal_error)?;
        }
        Ok(())
    }

    fn fail(
        &self,
        req: &mut Request,
        res: &mut Response,
        failure: Failure,
    ) -> Result<(), ControlSignal> {
        warn!(error = %failure, "request failed");
        for listener in &self.exception {
            listener(&failure, req, res);
        }
        res.error = Some(failure);

        match self.error_handlers.get(&500) {
            Some(route) => match route.invoke(req, res, render_internal_error) {
                Ok(_) => {}
                Err(Interrupt::Control(signal)) => return Err(signal),
                Err(Interrupt::Failure(secondary)) => {
                    error!(error = %secondary, "500 handler failed; using the default page");
                    render_internal_error(req, res);
                }
            },
            None => render_internal_error(req, res),
        }
        Ok(())
    }
}
