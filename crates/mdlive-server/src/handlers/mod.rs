//! HTTP request handlers.

pub(crate) mod documents;
