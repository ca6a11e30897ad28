pub mod collections;
pub mod limbs;
pub mod time;
