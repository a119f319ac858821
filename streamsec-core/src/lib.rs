//! Streamsec Core
//!
//! Value model, schemas and planning shared by the Stream.Security provider
//! and its command line driver.

pub mod convert;
pub mod differ;
pub mod effect;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
