mod manager;
mod types;
mod worker;

pub use manager::{UploadManager, UploadManagerHandle};
pub use types::ManagerCommand;
