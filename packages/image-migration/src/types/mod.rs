//! Data types used by the migration engine.

pub mod image;
pub mod plan;
pub mod progress;
pub mod record;
