//! Track identity resolution - shared modules for all binaries.

pub mod cache;
pub mod comparison;
pub mod criteria;
pub mod error;
pub mod finders;
pub mod library;
pub mod manual_map;
pub mod models;
pub mod musicbrainz;
pub mod normalize;
pub mod policy;
pub mod progress;
pub mod refresh;
pub mod store;
pub mod sync;
pub mod track_match;
