//! Slide metadata model.
//!
//! One open slide is described by a single immutable [`SlideMetadata`]
//! fetched from the server at open time. The engine never proceeds to
//! rendering without it.

mod metadata;

pub use metadata::SlideMetadata;
