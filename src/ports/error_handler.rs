use crate::core::context::Context;

/// ErrorHandler defines the port for rendering a failed request.
///
/// The dispatcher invokes it at most once per request, with the error the
/// middleware chain returned. Implementations must check
/// [`ResponseWriter::committed`](crate::core::context::ResponseWriter::committed)
/// and leave an already committed response alone.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle_error(&self, err: eyre::Report, c: &mut Context);
}

impl<F> ErrorHandler for F
where
    F: Fn(eyre::Report, &mut Context) + Send + Sync + 'static,
{
    fn handle_error(&self, err: eyre::Report, c: &mut Context) {
        self(err, c)
    }
}
