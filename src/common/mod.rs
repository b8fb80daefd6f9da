pub mod events;
pub mod payload;
