//! List Diffing
//!
//! Turns two versions of an ordered list into a short sequence of
//! [`Patch`]es that a mount target can apply to its rendered children.
//!
//! # Algorithm
//!
//! 1. Map both lists to identity keys.
//! 2. Compute a shortest edit script over the keys ([`myers::edit_script`]).
//! 3. Pair each inserted key with the first unpaired deleted element with the
//!    same key. Such a pair is one moved element, not a removal plus a new
//!    element, so its rendered node survives.
//! 4. Emit the remaining deletions front to back, coalescing runs.
//! 5. Walk the new list right to left and place every moved element and
//!    every run of inserted elements directly before its successor.
//!
//! All indices are live, so patches must be applied in the order returned.
//! Debug builds replay every result against the old list and panic if it
//! does not reproduce the new one.

pub mod myers;
mod patch;

use serde::{Deserialize, Serialize};

pub use patch::{apply_all, Patch};

use myers::Edit;

/// Tuning for [`diff_with_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Express reordering as [`Patch::Move`]. When off, a reordered element
    /// is deleted and inserted again.
    pub detect_moves: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self { detect_moves: true }
    }
}

/// Diff two lists whose elements are identified by `identity`.
///
/// `identity` must be injective over each list: two elements of the same
/// list with equal keys make moved elements ambiguous, and which of them
/// keeps its rendered node is unspecified.
pub fn diff<T, K, F>(old: &[T], new: &[T], identity: F) -> Vec<Patch<T>>
where
    T: Clone,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    diff_with_config(old, new, identity, &DiffConfig::default())
}

/// Diff two lists using element equality as identity.
pub fn diff_by_value<T>(old: &[T], new: &[T]) -> Vec<Patch<T>>
where
    T: Clone + PartialEq,
{
    diff(old, new, T::clone)
}

pub fn diff_with_config<T, K, F>(
    old: &[T],
    new: &[T],
    identity: F,
    config: &DiffConfig,
) -> Vec<Patch<T>>
where
    T: Clone,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let old_keys: Vec<K> = old.iter().map(&identity).collect();
    let new_keys: Vec<K> = new.iter().map(&identity).collect();

    let patches = Planner::new(&old_keys, &new_keys, config).emit(new);

    if cfg!(debug_assertions) {
        verify(old, &new_keys, &patches, &identity);
    }
    patches
}

/// Where an element of the new list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Kept(usize),
    Moved(usize),
    Inserted,
}

/// An element of the sequence under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Old(usize),
    New(usize),
}

struct Planner {
    origin: Vec<Origin>,
    /// Old indices removed outright, ascending.
    removed: Vec<usize>,
    work: Vec<Slot>,
}

impl Planner {
    fn new<K: PartialEq>(old: &[K], new: &[K], config: &DiffConfig) -> Self {
        let mut origin = vec![Origin::Inserted; new.len()];
        let mut deleted = Vec::new();
        let mut inserted = Vec::new();

        for edit in myers::edit_script(old, new) {
            match edit {
                Edit::Keep { old, new } => origin[new] = Origin::Kept(old),
                Edit::Delete { old } => deleted.push(old),
                Edit::Insert { new } => inserted.push(new),
            }
        }

        let mut paired = vec![false; deleted.len()];
        if config.detect_moves {
            for j in inserted {
                let candidate = deleted
                    .iter()
                    .enumerate()
                    .position(|(n, &i)| !paired[n] && old[i] == new[j]);
                if let Some(n) = candidate {
                    paired[n] = true;
                    origin[j] = Origin::Moved(deleted[n]);
                }
            }
        }

        let removed = deleted
            .into_iter()
            .zip(paired)
            .filter_map(|(i, paired)| (!paired).then_some(i))
            .collect();

        Self {
            origin,
            removed,
            work: (0..old.len()).map(Slot::Old).collect(),
        }
    }

    fn emit<T: Clone>(mut self, new: &[T]) -> Vec<Patch<T>> {
        let mut patches = Vec::new();

        // Removals, front to back. `removed` is ascending, so each run's
        // live start is its old start minus everything removed before it.
        let mut gone = 0;
        let mut run = 0;
        while run < self.removed.len() {
            let first = self.removed[run];
            let mut count = 1;
            while run + count < self.removed.len() && self.removed[run + count] == first + count {
                count += 1;
            }
            let start = first - gone;
            self.work.drain(start..start + count);
            patches.push(Patch::Delete { start, count });
            gone += count;
            run += count;
        }

        // Placement, right to left, each element before its successor.
        let mut j = new.len();
        while j > 0 {
            j -= 1;
            match self.origin[j] {
                Origin::Kept(_) => {}
                Origin::Moved(i) => {
                    let from = self.position(Slot::Old(i));
                    let before = self.anchor(j);
                    let to = if before > from { before - 1 } else { before };
                    if from != to {
                        let slot = self.work.remove(from);
                        self.work.insert(to, slot);
                        patches.push(Patch::Move { from, to });
                    }
                }
                Origin::Inserted => {
                    let last = j;
                    while j > 0 && self.origin[j - 1] == Origin::Inserted {
                        j -= 1;
                    }
                    let index = self.anchor(last);
                    self.work.splice(index..index, (j..=last).map(Slot::New));
                    patches.push(if j == last {
                        Patch::Insert {
                            element: new[j].clone(),
                            index,
                        }
                    } else {
                        Patch::InsertMany {
                            elements: new[j..=last].to_vec(),
                            index,
                        }
                    });
                }
            }
        }

        patches
    }

    fn slot(&self, j: usize) -> Slot {
        match self.origin[j] {
            Origin::Kept(i) | Origin::Moved(i) => Slot::Old(i),
            Origin::Inserted => Slot::New(j),
        }
    }

    /// Live position the element at new index `j` must be placed before.
    fn anchor(&self, j: usize) -> usize {
        if j + 1 < self.origin.len() {
            self.position(self.slot(j + 1))
        } else {
            self.work.len()
        }
    }

    fn position(&self, slot: Slot) -> usize {
        // Every slot looked up here was placed earlier in the walk.
        self.work
            .iter()
            .position(|s| *s == slot)
            .unwrap_or(self.work.len())
    }
}

/// Panic unless `patches` turn `old` into a list with keys `new_keys`.
fn verify<T, K, F>(old: &[T], new_keys: &[K], patches: &[Patch<T>], identity: &F)
where
    T: Clone,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut replay = old.to_vec();
    if let Err(error) = apply_all(&mut replay, patches.to_vec()) {
        panic!("diff produced an inapplicable patch: {error}");
    }
    let reproduced = replay.len() == new_keys.len()
        && replay.iter().zip(new_keys).all(|(item, key)| identity(item) == *key);
    assert!(reproduced, "diff patches do not reproduce the new list");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<T: Clone + PartialEq + std::fmt::Debug>(old: &[T], new: &[T]) -> Vec<Patch<T>> {
        let patches = diff_by_value(old, new);
        let mut replay = old.to_vec();
        apply_all(&mut replay, patches.clone()).unwrap();
        assert_eq!(replay, new, "patches {patches:?}");
        patches
    }

    #[test]
    fn identical_lists_need_no_patches() {
        assert!(check(&[1, 2, 3], &[1, 2, 3]).is_empty());
        assert!(check::<u8>(&[], &[]).is_empty());
    }

    #[test]
    fn duplicated_run_becomes_one_insert_many() {
        let old: Vec<u32> = (0..=10).collect();
        let new = vec![0, 1, 2, 3, 4, 5, 6, 4, 5, 6, 7, 8, 9, 10];

        let patches = check(&old, &new);
        assert_eq!(
            patches,
            vec![Patch::InsertMany {
                elements: vec![4, 5, 6],
                index: 7
            }]
        );
    }

    #[test]
    fn reversal_is_expressed_with_moves_only() {
        let patches = check(&[1, 2, 3, 4, 5], &[5, 4, 3, 2, 1]);
        assert!(!patches.is_empty());
        assert!(patches.iter().all(|p| matches!(p, Patch::Move { .. })));
    }

    #[test]
    fn replacing_every_key_is_one_delete_and_one_insert_many() {
        let old: Vec<u32> = (0..5_000).collect();
        let new: Vec<u32> = (10_000..15_000).collect();

        let patches = check(&old, &new);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0], Patch::Delete { start: 0, count: 5_000 });
        assert!(matches!(
            &patches[1],
            Patch::InsertMany { elements, index: 0 } if elements == &new
        ));
    }

    #[test]
    fn adjacent_deletes_coalesce() {
        let patches = check(&[1, 2, 3, 4, 5, 6], &[1, 5, 6]);
        assert_eq!(patches, vec![Patch::Delete { start: 1, count: 3 }]);

        let patches = check(&[1, 2, 3, 4, 5, 6], &[1, 3, 6]);
        assert_eq!(
            patches,
            vec![
                Patch::Delete { start: 1, count: 1 },
                Patch::Delete { start: 2, count: 2 },
            ]
        );
    }

    #[test]
    fn deletes_come_before_inserts() {
        let patches = check(&['a', 'b', 'c'], &['x', 'b', 'y']);
        assert_eq!(
            patches,
            vec![
                Patch::Delete { start: 0, count: 1 },
                Patch::Delete { start: 1, count: 1 },
                Patch::Insert {
                    element: 'y',
                    index: 1
                },
                Patch::Insert {
                    element: 'x',
                    index: 0
                },
            ]
        );
    }

    #[test]
    fn single_move_to_front() {
        let patches = check(&['a', 'b', 'c', 'd'], &['d', 'a', 'b', 'c']);
        assert_eq!(patches, vec![Patch::Move { from: 3, to: 0 }]);
    }

    #[test]
    fn moves_can_be_disabled() {
        let patches = diff_with_config(
            &[1, 2, 3],
            &[3, 1, 2],
            |n: &i32| *n,
            &DiffConfig {
                detect_moves: false,
            },
        );
        assert!(!patches.iter().any(|p| matches!(p, Patch::Move { .. })));

        let mut replay = vec![1, 2, 3];
        apply_all(&mut replay, patches).unwrap();
        assert_eq!(replay, [3, 1, 2]);
    }

    #[test]
    fn identity_keys_carry_new_values() {
        #[derive(Debug, Clone, PartialEq)]
        struct Row {
            id: u32,
            label: &'static str,
        }
        let old = vec![Row { id: 1, label: "a" }, Row { id: 2, label: "b" }];
        let new = vec![
            Row { id: 2, label: "b" },
            Row { id: 3, label: "c" },
            Row { id: 1, label: "a" },
        ];

        let patches = diff(&old, &new, |r: &Row| r.id);
        let mut replay = old.clone();
        apply_all(&mut replay, patches.clone()).unwrap();
        assert_eq!(replay, new);
        assert!(patches
            .iter()
            .any(|p| matches!(p, Patch::Insert { element, .. } if element.id == 3)));
    }

    #[test]
    fn assorted_reorderings_reproduce_the_new_list() {
        let cases: &[(&str, &str)] = &[
            ("abcdef", "fedcba"),
            ("abcdef", "badcfe"),
            ("abcdef", "cdefab"),
            ("abcdef", "axbycz"),
            ("abcabba", "cbabac"),
            ("aaabbb", "bbbaaa"),
            ("abc", ""),
            ("", "abc"),
            ("abcdefgh", "hgxfedyba"),
            ("kitten", "sitting"),
        ];
        for (a, b) in cases {
            let old: Vec<char> = a.chars().collect();
            let new: Vec<char> = b.chars().collect();
            check(&old, &new);
        }
    }

    #[test]
    fn every_permutation_of_four_reproduces() {
        let base = [1, 2, 3, 4];
        let mut perms = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let idx = [a, b, c, d];
                        let mut seen = [false; 4];
                        if idx.iter().all(|&i| !std::mem::replace(&mut seen[i], true)) {
                            perms.push(idx.map(|i| base[i]).to_vec());
                        }
                    }
                }
            }
        }
        assert_eq!(perms.len(), 24);
        for perm in perms {
            let patches = check(&base, &perm);
            assert!(patches.iter().all(|p| matches!(p, Patch::Move { .. })));
        }
    }
}
