//! Pure domain rules. Nothing in here touches storage or the network.

pub mod conversation;
pub mod discovery;
pub mod geo;
pub mod graph;
