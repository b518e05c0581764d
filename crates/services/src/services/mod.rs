pub mod affiliate;
pub mod claude_api;
pub mod config;
pub mod database_validator;
pub mod football_api;
pub mod live_score_sync;
pub mod matches;
pub mod news;
pub mod predictions;
pub mod profiles;
pub mod quiz;
