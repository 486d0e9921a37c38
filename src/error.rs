use thiserror::Error;

use crate::handle::{Kind, ObjectId};

/// Errors raised by toolkit operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error("null handle where an object is required")]
    NullHandle,
    #[error("handle {0} does not refer to a live object")]
    StaleHandle(ObjectId),
    #[error("handle {handle} is a {found}, expected {expected}")]
    WrongKind {
        handle: ObjectId,
        expected: Kind,
        found: Kind,
    },
    #[error("placing {child} under {parent} would make it its own ancestor")]
    WouldCycle { child: ObjectId, parent: ObjectId },
    #[error("an Application already exists ({0})")]
    ApplicationExists(ObjectId),
    #[error("event loop of {0} is already running")]
    EventLoopRunning(ObjectId),
}

impl WidgetError {
    /// Caller bugs, as opposed to requests the toolkit declines.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            WidgetError::ApplicationExists(_) | WidgetError::EventLoopRunning(_)
        )
    }
}

/// Result type for toolkit operations.
pub type WidgetResult<T> = Result<T, WidgetError>;
