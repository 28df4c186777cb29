mod moderation_handler;

pub use moderation_handler::*;
