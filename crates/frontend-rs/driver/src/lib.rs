//! File-level entry points for the Object Pascal front end
//!
//! [`Frontend`] reads a program or unit from disk and resolves the units it
//! uses against the referencing file's directory and a list of search
//! directories.

mod frontend;
mod resolver;

pub use frontend::{Frontend, FrontendError};
pub use resolver::SearchPathResolver;
