//! Myers shortest edit script.
//!
//! Finds a minimal sequence of keep / delete / insert steps turning `old`
//! into `new` in O((N + M) · D) time, D being the edit distance. The common
//! prefix and suffix are matched up front, which keeps the search
//! proportional to the changed region only.
//!
//! Ties are broken the same way every time: snakes are followed greedily
//! from the front, and when a deletion and an insertion reach equally far
//! the deletion wins. Earlier elements therefore stay in place.
//!
//! The greedy search keeps one frontier per edit step for its backtrack,
//! which costs O(D²) memory. Past [`TRACE_LIMIT`] steps it gives up and the
//! script is built by the linear-space divide and conquer form instead:
//! split both sequences at a point of a shortest path (the middle snake)
//! and solve each half. Both forms are minimal; within a run of changes the
//! divide and conquer result lists every deletion before any insertion.

/// Edit steps the greedy search may trace before switching to the
/// linear-space search.
pub const TRACE_LIMIT: usize = 1024;

/// One step of an edit script. Indices refer to the original sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Keep { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

impl Edit {
    fn shift(self, old_by: usize, new_by: usize) -> Self {
        match self {
            Edit::Keep { old, new } => Edit::Keep {
                old: old + old_by,
                new: new + new_by,
            },
            Edit::Delete { old } => Edit::Delete { old: old + old_by },
            Edit::Insert { new } => Edit::Insert { new: new + new_by },
        }
    }
}

/// Compute a shortest edit script from `old` to `new`.
pub fn edit_script<K: PartialEq>(old: &[K], new: &[K]) -> Vec<Edit> {
    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut edits: Vec<Edit> = (0..prefix)
        .map(|i| Edit::Keep { old: i, new: i })
        .collect();

    edits.extend(
        middle(old_mid, new_mid)
            .into_iter()
            .map(|edit| edit.shift(prefix, prefix)),
    );

    let old_tail = old.len() - suffix;
    let new_tail = new.len() - suffix;
    edits.extend((0..suffix).map(|i| Edit::Keep {
        old: old_tail + i,
        new: new_tail + i,
    }));

    edits
}

fn common_prefix<K: PartialEq>(old: &[K], new: &[K]) -> usize {
    old.iter().zip(new).take_while(|(a, b)| a == b).count()
}

fn common_suffix<K: PartialEq>(old: &[K], new: &[K]) -> usize {
    old.iter()
        .rev()
        .zip(new.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Every deletion, then every insertion.
fn replace_all(old: usize, new: usize) -> impl Iterator<Item = Edit> {
    (0..old)
        .map(|old| Edit::Delete { old })
        .chain((0..new).map(|new| Edit::Insert { new }))
}

fn middle<K: PartialEq>(old: &[K], new: &[K]) -> Vec<Edit> {
    // Nothing in common: no search needed.
    if !old.iter().any(|a| new.contains(a)) {
        return replace_all(old.len(), new.len()).collect();
    }

    greedy(old, new, TRACE_LIMIT).unwrap_or_else(|| {
        let mut edits = Vec::with_capacity(old.len() + new.len());
        bisect(old, new, &mut edits);
        deletions_first(edits)
    })
}

/// Forward greedy search followed by a backtrack through the saved
/// frontiers. `None` once more than `limit` steps would be needed.
fn greedy<K: PartialEq>(old: &[K], new: &[K], limit: usize) -> Option<Vec<Edit>> {
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max = (n + m) as usize;

    let offset = max as isize;
    let at = |k: isize| (k + offset) as usize;

    // v[k] is the furthest x reached on diagonal k = x - y. trace[d] holds
    // v[-d..=d] as it stood after step d.
    let mut v = vec![0isize; 2 * max + 2];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max as isize {
        if d as usize > limit {
            return None;
        }
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                trace.push(v[at(-d)..=at(d)].to_vec());
                break 'search;
            }
            k += 2;
        }
        trace.push(v[at(-d)..=at(d)].to_vec());
    }

    let mut edits = Vec::with_capacity(max);
    let (mut x, mut y) = (n, m);

    for d in (0..trace.len()).rev() {
        let (prev_x, prev_y) = if d == 0 {
            (0, 0)
        } else {
            let step = d as isize;
            let frontier = &trace[d - 1];
            let get = |k: isize| frontier[(k + step - 1) as usize];
            let k = x - y;
            let prev_k = if k == -step || (k != step && get(k - 1) < get(k + 1)) {
                k + 1
            } else {
                k - 1
            };
            let prev_x = get(prev_k);
            (prev_x, prev_x - prev_k)
        };

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Keep {
                old: x as usize,
                new: y as usize,
            });
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert {
                    new: (y - 1) as usize,
                });
            } else {
                edits.push(Edit::Delete {
                    old: (x - 1) as usize,
                });
            }
        }
        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    Some(edits)
}

/// Linear-space search: trim, split at the middle snake, recurse.
fn bisect<K: PartialEq>(old: &[K], new: &[K], edits: &mut Vec<Edit>) {
    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    edits.extend((0..prefix).map(|i| Edit::Keep { old: i, new: i }));

    let (n, m) = (old_mid.len(), new_mid.len());
    let split = if n == 0 || m == 0 {
        None
    } else {
        // A split at either corner would not shrink the problem.
        middle_snake(old_mid, new_mid).filter(|&split| split != (0, 0) && split != (n, m))
    };
    match split {
        Some((x, y)) => {
            let mut left = Vec::new();
            bisect(&old_mid[..x], &new_mid[..y], &mut left);
            edits.extend(left.into_iter().map(|e| e.shift(prefix, prefix)));

            let mut right = Vec::new();
            bisect(&old_mid[x..], &new_mid[y..], &mut right);
            edits.extend(right.into_iter().map(|e| e.shift(prefix + x, prefix + y)));
        }
        None => edits.extend(
            replace_all(old_mid.len(), new_mid.len()).map(|e| e.shift(prefix, prefix)),
        ),
    }

    let old_tail = old.len() - suffix;
    let new_tail = new.len() - suffix;
    edits.extend((0..suffix).map(|i| Edit::Keep {
        old: old_tail + i,
        new: new_tail + i,
    }));
}

/// A point `(x, y)` on a shortest path through two sequences with no common
/// prefix or suffix, found by running the search from both ends until the
/// frontiers overlap. `None` only if they never do.
fn middle_snake<K: PartialEq>(old: &[K], new: &[K]) -> Option<(usize, usize)> {
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let len = 2 * max_d + 2;

    // -1 marks a diagonal not reached yet.
    let mut forward = vec![-1isize; len as usize];
    let mut backward = vec![-1isize; len as usize];
    forward[(offset + 1) as usize] = 0;
    backward[(offset + 1) as usize] = 0;

    let delta = n - m;
    let odd = delta % 2 != 0;
    // Diagonals that ran off the grid are trimmed from either end.
    let (mut f_start, mut f_end, mut b_start, mut b_end) = (0, 0, 0, 0);

    // Furthest point reached on diagonal `k` of a frontier, if it is on
    // the grid. Backward points count from the end of both sequences.
    let reached = |frontier: &[isize], k: isize| -> Option<isize> {
        let i = offset + k;
        if i < 0 || i >= len {
            return None;
        }
        let x = frontier[i as usize];
        (x != -1 && x <= n && x - k <= m).then_some(x)
    };

    for d in 0..max_d {
        let mut k = -d + f_start;
        while k <= d - f_end {
            let i = (offset + k) as usize;
            let mut x = if k == -d || (k != d && forward[i - 1] < forward[i + 1]) {
                forward[i + 1]
            } else {
                forward[i - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            forward[i] = x;
            if x > n {
                f_end += 2;
            } else if y > m {
                f_start += 2;
            } else if odd {
                if let Some(back) = reached(backward.as_slice(), delta - k) {
                    if x >= n - back {
                        return Some((x as usize, y as usize));
                    }
                }
            }
            k += 2;
        }

        let mut k = -d + b_start;
        while k <= d - b_end {
            let i = (offset + k) as usize;
            let mut x = if k == -d || (k != d && backward[i - 1] < backward[i + 1]) {
                backward[i + 1]
            } else {
                backward[i - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[(n - x - 1) as usize] == new[(m - y - 1) as usize] {
                x += 1;
                y += 1;
            }
            backward[i] = x;
            if x > n {
                b_end += 2;
            } else if y > m {
                b_start += 2;
            } else if !odd {
                let front_k = delta - k;
                if let Some(front) = reached(forward.as_slice(), front_k) {
                    if front >= n - x {
                        return Some((front as usize, (front - front_k) as usize));
                    }
                }
            }
            k += 2;
        }
    }
    None
}

/// Reorder each run of changes so its deletions precede its insertions.
fn deletions_first(edits: Vec<Edit>) -> Vec<Edit> {
    let mut out = Vec::with_capacity(edits.len());
    let mut inserts = Vec::new();
    for edit in edits {
        match edit {
            Edit::Delete { .. } => out.push(edit),
            Edit::Insert { .. } => inserts.push(edit),
            Edit::Keep { .. } => {
                out.append(&mut inserts);
                out.push(edit);
            }
        }
    }
    out.append(&mut inserts);
    out
}
