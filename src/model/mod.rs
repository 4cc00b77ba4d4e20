pub mod envelope;
pub mod user;
pub mod verification;

pub use envelope::{
    ChannelType, Envelope, MediaInfo, MessageCategory, MessagePayload, ReplyContext,
};
pub use user::{User, UserType};
pub use verification::{VerificationRecord, VerificationStatus};
