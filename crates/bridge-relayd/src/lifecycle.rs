//! Node lifecycle operations driving the relay.
//!
//! A node start, shutdown or crash is delivered as a sequence of stages; the
//! relay reacts to exactly one stage of each.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationalState {
    #[default]
    Down,
    Operating,
}

impl OperationalState {
    pub const fn is_operating(&self) -> bool {
        matches!(self, OperationalState::Operating)
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationalState::Down => write!(f, "down"),
            OperationalState::Operating => write!(f, "operating"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartStage {
    PhysicalLayer,
    LinkLayer,
    NetworkLayer,
    ApplicationLayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownStage {
    ApplicationLayer,
    NetworkLayer,
    LinkLayer,
    PhysicalLayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashStage {
    Crash,
}

/// A lifecycle operation at one of its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    Start(StartStage),
    Shutdown(ShutdownStage),
    Crash(CrashStage),
}

/// What the relay does in response to an operation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Crash,
    None,
}

impl LifecycleOperation {
    /// Maps a stage to the relay transition it triggers.
    pub const fn action(&self) -> LifecycleAction {
        match self {
            LifecycleOperation::Start(StartStage::LinkLayer) => LifecycleAction::Start,
            LifecycleOperation::Shutdown(ShutdownStage::LinkLayer) => LifecycleAction::Stop,
            LifecycleOperation::Crash(CrashStage::Crash) => LifecycleAction::Crash,
            _ => LifecycleAction::None,
        }
    }
}
