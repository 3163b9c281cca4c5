pub mod bootstrap;
pub mod copilot;
pub mod doctor;
pub mod engine;
pub mod pipeline;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
