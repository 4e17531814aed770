use super::request::{parse_request, BodyLimits, RequestError};
use super::response::{write_response, write_status};
use crate::dispatcher::{Application, Response};
use crate::error::ControlSignal;
use may_minihttp::HttpService;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

/// `HttpService` driving an [`Application`].
///
/// Cloned once per connection by may_minihttp; clones share the application.
#[derive(Clone)]
pub struct JoltService {
    app: Arc<Application>,
    limits: BodyLimits,
}

impl JoltService {
    pub fn new(app: Arc<Application>, limits: BodyLimits) -> Self {
        Self { app, limits }
    }

    pub fn application(&self) -> &Application {
        &self.app
    }
}

impl HttpService for JoltService {
    fn call(
        &mut self,
        req: may_minihttp::Request,
        out: &mut may_minihttp::Response,
    ) -> io::Result<()> {
        let mut request = match parse_request(req, self.limits) {
            Ok(request) => request,
            Err(err @ RequestError::TooLarge { .. }) => {
                warn!(error = %err, "rejecting request body");
                write_status(out, 413);
                return Ok(());
            }
            Err(RequestError::Io(err)) => return Err(err),
        };

        let mut response = Response::new();
        match self.app.handle(&mut request, &mut response) {
            Ok(()) => {}
            Err(ControlSignal::Stop) => {
                debug!(uri = %request.uri, "request stopped by handler");
            }
            Err(ControlSignal::Eof) => {
                debug!(uri = %request.uri, "peer went away, dropping connection");
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "EOF"));
            }
        }
        write_response(&response, out);
        Ok(())
    }
}
