// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Aggregation of several concurrent stream errors into one.

use crate::{same_error, FlowError};

/// An ordered, insertion-unique aggregate of one or more errors.
///
/// A `CompositeError` never nests: constructing one from a collection that
/// already contains composites flattens their members into this one, in
/// order. Iteration preserves insertion order.
///
/// The causal chain walk in [`cause_chain`](CompositeError::cause_chain)
/// stops as soon as it revisits a member, so diagnostics stay finite even
/// when aggregates reference each other.
#[derive(Debug, Clone, Default)]
pub struct CompositeError {
    errors: Vec<FlowError>,
}

impl CompositeError {
    /// Create an empty composite. Members are added with
    /// [`suppress`](CompositeError::suppress).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a composite from a collection of errors, flattening nested
    /// composites and dropping duplicate members while keeping first-seen
    /// insertion order.
    #[must_use]
    pub fn from_errors(errors: Vec<FlowError>) -> Self {
        let mut composite = Self::new();
        for error in errors {
            match error {
                FlowError::Composite(inner) => {
                    for member in inner.errors {
                        composite.push_unique(member);
                    }
                }
                other => composite.push_unique(other),
            }
        }
        composite
    }

    fn push_unique(&mut self, error: FlowError) {
        if !self.errors.iter().any(|seen| same_error(seen, &error)) {
            self.errors.push(error);
        }
    }

    /// Append an error to this composite without de-duplication.
    pub fn suppress(&mut self, error: FlowError) {
        self.errors.push(error);
    }

    /// The aggregated members, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[FlowError] {
        &self.errors
    }

    /// Number of aggregated members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if nothing has been aggregated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse to the simplest representation: an empty composite has no
    /// error at all, a singleton yields its sole member, anything larger
    /// stays composite.
    #[must_use]
    pub fn simplify(mut self) -> Option<FlowError> {
        match self.errors.len() {
            0 => None,
            1 => Some(self.errors.remove(0)),
            _ => Some(FlowError::Composite(self)),
        }
    }

    /// The causal chain for diagnostics: members in insertion order,
    /// recursing into nested composites, cropped at the first revisit.
    #[must_use]
    pub fn cause_chain(&self) -> Vec<&FlowError> {
        let mut chain: Vec<&FlowError> = Vec::new();
        self.walk_chain(&mut chain);
        chain
    }

    fn walk_chain<'a>(&'a self, chain: &mut Vec<&'a FlowError>) {
        for error in &self.errors {
            if chain.iter().any(|seen| same_error(seen, error)) {
                // revisit: crop here to prevent a cycle
                return;
            }
            chain.push(error);
            if let FlowError::Composite(inner) = error {
                inner.walk_chain(chain);
            }
        }
    }
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} errors occurred:", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "  composed error {}: {error}", i + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeError {}

impl From<CompositeError> for FlowError {
    fn from(composite: CompositeError) -> Self {
        FlowError::Composite(composite)
    }
}

impl FromIterator<FlowError> for CompositeError {
    fn from_iter<I: IntoIterator<Item = FlowError>>(iter: I) -> Self {
        Self::from_errors(iter.into_iter().collect())
    }
}
