pub mod accounts;
pub mod conversation;
pub mod discovery;
pub mod graph;
pub mod identity;
pub mod photos;
pub mod profile;
