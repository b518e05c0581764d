pub mod affiliate;
pub mod affiliate_click;
pub mod affiliate_commission;
pub mod affiliate_link;
pub mod football_match;
pub mod news;
pub mod prediction;
pub mod profile;
pub mod quiz;
