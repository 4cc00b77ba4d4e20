//! Channel clients: the seam between envelopes and platform APIs.

pub mod base;
pub mod manager;
pub mod qikchat;
pub mod whatsapp;

pub use base::{ChannelClient, ChannelMessage, MediaDownload, SendReceipt};
pub use manager::ChannelManager;
pub use qikchat::QikchatClient;
pub use whatsapp::WhatsappClient;
