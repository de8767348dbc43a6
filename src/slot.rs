//! Write-once storage for the outcome of a computation.

use crate::error::{Error, Result};

enum SlotState<R> {
    Empty,
    Value(R),
    Failed(Error),
    Taken,
}

/// Holds either a value or a captured error, written at most once.
///
/// ```rust
/// use cont_bridge::ResultSlot;
///
/// let mut slot = ResultSlot::new();
/// slot.write(5).unwrap();
/// assert!(slot.write(6).is_err());
/// assert_eq!(slot.take().unwrap(), 5);
/// ```
pub struct ResultSlot<R> {
    state: SlotState<R>,
}

impl<R> ResultSlot<R> {
    pub const fn new() -> Self {
        Self {
            state: SlotState::Empty,
        }
    }

    /// Store a value. Fails with [`Error::SlotOccupied`] if anything was stored before.
    pub fn write(&mut self, value: R) -> Result<()> {
        self.store(Ok(value))
    }

    /// Store a captured error. Fails with [`Error::SlotOccupied`] if anything was stored before.
    pub fn fail(&mut self, error: Error) -> Result<()> {
        self.store(Err(error))
    }

    /// Store an outcome, keeping whatever was written first.
    pub fn store(&mut self, outcome: Result<R>) -> Result<()> {
        if !matches!(self.state, SlotState::Empty) {
            return Err(Error::SlotOccupied);
        }
        self.state = match outcome {
            Ok(value) => SlotState::Value(value),
            Err(error) => SlotState::Failed(error),
        };
        Ok(())
    }

    /// Whether an outcome has ever been stored, including one already taken.
    pub fn is_written(&self) -> bool {
        !matches!(self.state, SlotState::Empty)
    }

    /// Take the stored outcome. `None` if nothing was stored or it was already taken.
    pub fn try_take(&mut self) -> Option<Result<R>> {
        match std::mem::replace(&mut self.state, SlotState::Taken) {
            SlotState::Value(value) => Some(Ok(value)),
            SlotState::Failed(error) => Some(Err(error)),
            SlotState::Empty => {
                self.state = SlotState::Empty;
                None
            }
            SlotState::Taken => None,
        }
    }

    /// Take the stored outcome, returning the captured error as `Err`.
    ///
    /// Falls back to `R::default()` when no value is available.
    pub fn take(&mut self) -> Result<R>
    where
        R: Default,
    {
        self.try_take().unwrap_or_else(|| Ok(R::default()))
    }
}

impl<R> Default for ResultSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for ResultSlot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            SlotState::Empty => "Empty",
            SlotState::Value(_) => "Value",
            SlotState::Failed(_) => "Failed",
            SlotState::Taken => "Taken",
        };
        f.debug_struct("ResultSlot").field("state", &state).finish()
    }
}
