pub mod article;
pub mod collections;
pub mod search;
pub mod subscriptions;
