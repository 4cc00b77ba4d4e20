//! TOML configuration with serde defaults for every field, so an empty file
//! (or no file at all) yields a runnable single-node setup.

pub mod loader;
pub mod schema;

pub use loader::load;
pub use schema::{
    AppConfig, ChannelsConfig, Config, QikchatChannelConfig, ReminderConfig, ServicesConfig,
    StoreConfig, WhatsappChannelConfig,
};
