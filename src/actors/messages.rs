//! Message types for actor communication

use crate::AlarmEvent;

/// Commands that can be sent to the AlarmEmitter
#[derive(Debug)]
pub enum EmitterCommand {
    /// Serialize and publish one alarm event
    Emit(AlarmEvent),

    /// Gracefully shut down after observing in-flight sends
    Shutdown,
}
