//! Common imports for typical client usage.
pub use crate::{
    ActionHandle, AssistantClient, BridgeConfig, BridgeError, NewThread, RunPoller, RunStatusEvent,
    RunStepResult, RunsApi, StreamSession, ToolOutput,
};
