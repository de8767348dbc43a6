//! Commonly used imports
//!
//! Use `use cont_bridge::prelude::*;` for quick access to the most common types and functions.

// Core types
pub use crate::{Continuation, Error, Iteration, Result, State, Suspension};

// Bridges
pub use crate::bridge::{CallbackBridge, Deliver, Feed, IterationBridge, callback, iterate};

// Construction and driving
pub use crate::config::builder;
pub use crate::cont::continuation;
pub use crate::handler::{handle, wait};

// Loop sugar
pub use crate::for_await;
