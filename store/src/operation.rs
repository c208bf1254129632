//! Standard status edits expressed as mutators.

use crate::mutation::{Mutator, StatusMutation};

/// A user-level status edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOperation {
    /// Replace all statuses.
    Set(Vec<String>),
    /// Append a status that is not yet present.
    Add(String),
    /// Drop every occurrence of a status.
    Remove(String),
    /// Remove the status when present, add it otherwise.
    Toggle(String),
    Clear,
}

impl StatusOperation {
    /// Compute the mutation this operation implies for `current`.
    ///
    /// With `allow_multiple` off a note holds at most one status: `Set` keeps
    /// only its first entry and `Add` replaces whatever is there.
    pub fn mutation(&self, current: &[String], allow_multiple: bool) -> StatusMutation {
        let next = match self {
            StatusOperation::Set(statuses) => {
                if allow_multiple {
                    statuses.clone()
                } else {
                    statuses.iter().take(1).cloned().collect()
                }
            }
            StatusOperation::Add(status) => add(current, status, allow_multiple),
            StatusOperation::Remove(status) => {
                current.iter().filter(|s| *s != status).cloned().collect()
            }
            StatusOperation::Toggle(status) => {
                if current.contains(status) {
                    current.iter().filter(|s| *s != status).cloned().collect()
                } else {
                    add(current, status, allow_multiple)
                }
            }
            StatusOperation::Clear => Vec::new(),
        };

        if next.as_slice() == current {
            StatusMutation::Unchanged
        } else {
            StatusMutation::Changed(next)
        }
    }

    /// Box this operation as a store mutator.
    pub fn into_mutator(self, allow_multiple: bool) -> Mutator<'static> {
        Box::new(move |current| self.mutation(&current, allow_multiple))
    }
}

fn add(current: &[String], status: &str, allow_multiple: bool) -> Vec<String> {
    if !allow_multiple {
        return vec![status.to_string()];
    }
    let mut next = current.to_vec();
    if !next.iter().any(|s| s == status) {
        next.push(status.to_string());
    }
    next
}
