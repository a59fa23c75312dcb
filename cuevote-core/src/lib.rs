mod config;
mod error;
mod events;
mod identity;
mod playback;
mod queuing;
mod room;
mod util;

pub use config::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use playback::*;
pub use queuing::*;
pub use room::*;
pub use util::*;
