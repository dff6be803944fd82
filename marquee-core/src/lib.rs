pub mod color;
pub mod config;
pub mod error;
pub mod progress;
pub mod snapshot;
pub mod store;
pub mod surface;
pub mod text;
pub mod timefmt;
pub mod transition;

#[cfg(test)]
pub(crate) mod testing;

pub use color::{ColorPair, Rgb, Tint};
pub use config::{
    DisplayConfig, LoggingConfig, MarqueeConfig, ProgressConfig, StreamConfig, CONFIG_TEMPLATE,
};
/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use error::{CoreError, Result};
pub use progress::{ProgressExtrapolator, ResyncRequest};
pub use snapshot::{EventKind, PlaybackSnapshot, RepeatMode, UpdateEvent, BLANK_IMAGE};
pub use store::{ChangeSet, StateChange, StateStore};
pub use surface::{AssetChannel, BadgeState, BadgeVisibility, DisplaySurface, TextRegion};
pub use text::TextPresenter;
pub use timefmt::DurationExt;
pub use transition::TransitionSequencer;
