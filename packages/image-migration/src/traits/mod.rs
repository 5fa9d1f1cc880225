//! Collaborator contracts the engine is written against.

pub mod store;
