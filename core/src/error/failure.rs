use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{ExecutorError, GraphError};

/// A failure recorded against a node or a whole plan.
///
/// Cloning is cheap: aborting a queue hands the same failure to every plan in it.
/// Format with `{:#}` to include the full cause chain.
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::msg(message))
    }

    /// Convert a payload caught by `std::panic::catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::msg(format!("panicked: {message}"))
    }

    /// Wrap this failure in another layer of context.
    pub fn context<C>(&self, context: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::new(self.clone()).context(context))
    }

    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.0.root_cause()
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        if let Some(e) = self.0.downcast_ref::<E>() {
            return Some(e);
        }
        // Failures re-wrapped through `context` nest one level down.
        self.0
            .chain()
            .find_map(|cause| cause.downcast_ref::<Failure>())
            .and_then(|inner| inner.downcast_ref::<E>())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}

impl From<ExecutorError> for Failure {
    fn from(err: ExecutorError) -> Self {
        Self::new(err.into())
    }
}

impl From<GraphError> for Failure {
    fn from(err: GraphError) -> Self {
        Self::new(err.into())
    }
}
