//! Per-continuation configuration.

use std::borrow::Cow;
use std::future::Future;

use crate::cont::Continuation;
use crate::error::Result;

/// Options applied to a [`Continuation`] when it starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: Option<Cow<'static, str>>,
    pub capture_panics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: None,
            capture_panics: true,
        }
    }
}

/// Builder for a configured [`Continuation`].
///
/// ```rust
/// use cont_bridge::builder;
///
/// let cont = builder()
///     .name("fetch-profile")
///     .start(async { Ok(7_u32) });
/// assert_eq!(cont.name(), Some("fetch-profile"));
/// assert_eq!(cont.result().unwrap(), 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

/// Start configuring a continuation; the result type is picked by [`Builder::start`].
pub fn builder() -> Builder {
    Builder::new()
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label attached to the continuation's trace events.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Whether a panic inside the computation is captured as [`Error::Panicked`](crate::Error::Panicked).
    ///
    /// When disabled, the panic unwinds out of whichever call resumed the
    /// computation: the constructor, or the delivery that woke it.
    pub fn capture_panics(mut self, capture: bool) -> Self {
        self.config.capture_panics = capture;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the continuation and run it until its first suspension.
    pub fn start<R, F>(self, computation: F) -> Continuation<R>
    where
        R: Send + 'static,
        F: Future<Output = Result<R>> + Send + 'static,
    {
        Continuation::with_config(self.config, computation)
    }
}
