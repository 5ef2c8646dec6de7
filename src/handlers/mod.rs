pub mod chat;
pub mod insights;
pub mod upload;

pub use chat::*;
pub use insights::*;
pub use upload::*;
