//! Generated documents: the group page and the publications listing.

pub mod group;
pub mod listing;
