pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod mutations;
pub mod roster;
pub mod screen;
pub mod search;
pub mod store;
pub mod sync;
pub mod time;
pub mod util;

pub use error::{AppError, AppResult};
pub use logging::{init_logging, LOG_TARGET};
pub use screen::{ClientListScreen, MountReport};
pub use sync::{ClientView, Snapshot};
