//! Client sessions: connection registry and the event gateway

pub mod gateway;
pub mod registry;

pub use gateway::{Session, SessionGateway};
pub use registry::{SessionError, SessionPhase, SessionRegistry};
