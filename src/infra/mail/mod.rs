// Mail transport implementations.

pub mod memory;
pub mod smtp;

// Re-export for convenience
pub use memory::MemoryMailer;
pub use smtp::{DiscardMailer, SmtpMailer};
