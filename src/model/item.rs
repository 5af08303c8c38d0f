use crate::model::Request;
use std::fmt;

/// A caller-defined payload extracted from a response
///
/// Items that report themselves as invalid are rejected by the item pipeline
/// before any processor sees them.
pub trait Item: fmt::Debug + Send + 'static {
    /// Returns true if the item may enter the processor chain
    fn is_valid(&self) -> bool {
        true
    }
}

/// A value produced by a parse function
#[derive(Debug)]
pub enum Parsed<I> {
    /// A newly discovered request; its depth is recomputed by the analyzer
    Request(Request),
    /// An extracted item bound for the item pipeline
    Item(I),
}

impl<I> Parsed<I> {
    /// Returns the request if this value is one
    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(request) => Some(request),
            Self::Item(_) => None,
        }
    }

    /// Returns the item if this value is one
    pub fn as_item(&self) -> Option<&I> {
        match self {
            Self::Request(_) => None,
            Self::Item(item) => Some(item),
        }
    }
}
