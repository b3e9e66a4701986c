//! Tools callable by the agents.

pub mod registry;
pub mod tool;
pub mod user;

pub use registry::ToolRegistry;
pub use tool::{RequestContext, Tool, require_str};
pub use user::{
    GetUserInfoTool, MarkChallengeCompletedTool, RegisterUserTool, UpdateInterestsTool,
};
