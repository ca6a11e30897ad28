pub mod artifacts;
pub mod cursor;
pub mod jobs;
pub mod params;
pub mod queue;
