//! Mutation results and options shared by every store.

/// Outcome of a mutator run against the current status list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMutation {
    /// The current state already satisfies the requested change.
    Unchanged,
    /// Replace the list with these statuses, in order.
    Changed(Vec<String>),
}

impl StatusMutation {
    pub fn changed<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StatusMutation::Changed(statuses.into_iter().map(Into::into).collect())
    }

    /// Next list to persist, or `None` when nothing would change.
    ///
    /// A `Changed` result equal to `current` is a no-op.
    pub(crate) fn into_next(self, current: &[String]) -> Option<Vec<String>> {
        match self {
            StatusMutation::Changed(next) if next.as_slice() != current => Some(next),
            _ => None,
        }
    }
}

/// Caller-supplied transformation of the current status list.
pub type Mutator<'a> = Box<dyn FnOnce(Vec<String>) -> StatusMutation + Send + 'a>;

/// Storage-format options for a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutateOptions {
    /// Keep list shape even for zero or one status. When false, frontmatter
    /// collapses to the first status as a scalar.
    pub store_as_array: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn changed_to_same_list_is_a_no_op() {
        let current = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            StatusMutation::changed(["a", "b"]).into_next(&current),
            None
        );
        assert_eq!(StatusMutation::Unchanged.into_next(&current), None);
        assert_eq!(
            StatusMutation::changed(["b", "a"]).into_next(&current),
            Some(vec!["b".to_string(), "a".to_string()])
        );
    }
}
