//! Patch operations over an ordered sequence.

use std::fmt;

use serde::Serialize;

use crate::error::MountError;

/// One mutation of an ordered sequence.
///
/// Indices are live: each one refers to the sequence as left by the patches
/// before it, not to the original sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch<T> {
    /// Insert one element before `index`.
    Insert { element: T, index: usize },

    /// Insert a run of consecutive elements, the first landing at `index`.
    InsertMany { elements: Vec<T>, index: usize },

    /// Remove `count` elements starting at `start`.
    Delete { start: usize, count: usize },

    /// Remove the element at `from`, then insert it at `to` in the shortened
    /// sequence.
    Move { from: usize, to: usize },
}

impl<T> Patch<T> {
    /// Apply this patch to `items`, rejecting out-of-range indices.
    pub fn apply_to(self, items: &mut Vec<T>) -> Result<(), MountError> {
        let len = items.len();
        if !self.fits(len) {
            return Err(MountError::InvalidPatch {
                patch: self.to_string(),
                len,
            });
        }

        match self {
            Patch::Insert { element, index } => items.insert(index, element),
            Patch::InsertMany { elements, index } => {
                items.splice(index..index, elements);
            }
            Patch::Delete { start, count } => {
                items.drain(start..start + count);
            }
            Patch::Move { from, to } => {
                let element = items.remove(from);
                items.insert(to, element);
            }
        }
        Ok(())
    }

    /// Whether the patch's indices are valid for a sequence of length `len`.
    pub fn fits(&self, len: usize) -> bool {
        match self {
            Patch::Insert { index, .. } | Patch::InsertMany { index, .. } => *index <= len,
            Patch::Delete { start, count } => start
                .checked_add(*count)
                .map_or(false, |end| end <= len),
            Patch::Move { from, to } => *from < len && *to < len,
        }
    }

    /// Transform the carried elements, keeping positions.
    pub fn map<U, F>(self, mut f: F) -> Patch<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Patch::Insert { element, index } => Patch::Insert {
                element: f(element),
                index,
            },
            Patch::InsertMany { elements, index } => Patch::InsertMany {
                elements: elements.into_iter().map(f).collect(),
                index,
            },
            Patch::Delete { start, count } => Patch::Delete { start, count },
            Patch::Move { from, to } => Patch::Move { from, to },
        }
    }

    /// Net change in sequence length.
    pub fn len_delta(&self) -> isize {
        match self {
            Patch::Insert { .. } => 1,
            Patch::InsertMany { elements, .. } => elements.len() as isize,
            Patch::Delete { count, .. } => -(*count as isize),
            Patch::Move { .. } => 0,
        }
    }
}

impl<T> fmt::Display for Patch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Insert { index, .. } => write!(f, "insert at {index}"),
            Patch::InsertMany { elements, index } => {
                write!(f, "insert {} at {index}", elements.len())
            }
            Patch::Delete { start, count } => write!(f, "delete {count} at {start}"),
            Patch::Move { from, to } => write!(f, "move {from} -> {to}"),
        }
    }
}

/// Apply `patches` in order.
pub fn apply_all<T>(items: &mut Vec<T>, patches: Vec<Patch<T>>) -> Result<(), MountError> {
    for patch in patches {
        patch.apply_to(items)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_removes_then_reinserts() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        Patch::Move { from: 0, to: 3 }.apply_to(&mut items).unwrap();
        assert_eq!(items, ['b', 'c', 'd', 'a']);

        Patch::Move { from: 3, to: 1 }.apply_to(&mut items).unwrap();
        assert_eq!(items, ['b', 'a', 'c', 'd']);
    }

    #[test]
    fn indices_are_live() {
        let mut items = vec![1, 2, 3, 4, 5];
        apply_all(
            &mut items,
            vec![
                Patch::Delete { start: 0, count: 2 },
                Patch::Insert {
                    element: 9,
                    index: 3,
                },
                Patch::InsertMany {
                    elements: vec![7, 8],
                    index: 0,
                },
            ],
        )
        .unwrap();
        assert_eq!(items, [7, 8, 3, 4, 5, 9]);
    }

    #[test]
    fn out_of_range_patch_is_rejected() {
        let mut items = vec![1, 2];
        let error = Patch::Delete { start: 1, count: 2 }
            .apply_to(&mut items)
            .unwrap_err();
        assert_eq!(
            error,
            MountError::InvalidPatch {
                patch: "delete 2 at 1".into(),
                len: 2
            }
        );
        assert_eq!(items, [1, 2]);

        assert!(!Patch::<u8>::Move { from: 0, to: 2 }.fits(2));
        assert!(Patch::Insert { element: 0, index: 2 }.fits(2));
    }

    #[test]
    fn serializes_with_op_tag() {
        let json = serde_json::to_value(Patch::InsertMany {
            elements: vec![4, 5],
            index: 7,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "op": "insert_many", "elements": [4, 5], "index": 7 })
        );
    }

    #[test]
    fn map_keeps_positions() {
        let patch = Patch::Insert {
            element: 3,
            index: 1,
        }
        .map(|n| n.to_string());
        assert_eq!(
            patch,
            Patch::Insert {
                element: "3".to_string(),
                index: 1
            }
        );
        assert_eq!(patch.len_delta(), 1);
    }
}
