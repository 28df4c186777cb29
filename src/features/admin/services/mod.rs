mod moderation_service;

pub use moderation_service::ModerationService;
