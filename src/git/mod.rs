pub mod cache;
pub mod diff;
pub mod history;
pub mod locator;
pub mod log;
pub mod memory;
pub mod repository;
pub mod revision;
pub mod store;
pub mod tree;

pub use history::{attribute, Ancestors, PathPattern};
pub use locator::{locate, Located, RepoLocator};
pub use memory::MemoryStore;
pub use repository::GitRepository;
pub use revision::resolve;
pub use store::ObjectStore;
