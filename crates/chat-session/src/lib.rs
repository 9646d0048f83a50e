pub mod message;
pub mod session;

pub use message::*;
pub use session::*;
