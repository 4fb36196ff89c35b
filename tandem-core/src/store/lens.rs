//! Lenses
//!
//! A lens is a pure pair of functions that focuses on a part `D` of a whole
//! `P`: `get` reads the part, `set` returns a new whole with the part
//! replaced. Derived stores are built from lenses, so nothing is copied out
//! of the parent except the focused part.
//!
//! Lenses may be partial. A list lens, for instance, has no focus once its
//! element is gone; `get` and `set` then return a [`FocusError`].
//!
//! Wherever the focus resolves, every lens here obeys the lens laws:
//!
//! - `get(set(p, d)) == d`
//! - `set(p, get(p)) == p`

use std::fmt::Debug;
use std::ops::Add;
use std::sync::Arc;

use crate::error::FocusError;

type Getter<P, D> = dyn Fn(&P) -> Result<D, FocusError> + Send + Sync;
type Setter<P, D> = dyn Fn(&P, D) -> Result<P, FocusError> + Send + Sync;

/// Shared identity function for list elements.
pub type IdProvider<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// A bidirectional projection from `P` to `D`.
pub struct Lens<P, D> {
    id: Arc<str>,
    get: Arc<Getter<P, D>>,
    set: Arc<Setter<P, D>>,
}

impl<P, D> Lens<P, D>
where
    P: 'static,
    D: 'static,
{
    /// Create a total lens.
    pub fn new<G, S>(id: &str, get: G, set: S) -> Self
    where
        G: Fn(&P) -> D + Send + Sync + 'static,
        S: Fn(&P, D) -> P + Send + Sync + 'static,
    {
        Self::try_new(id, move |p| Ok(get(p)), move |p, d| Ok(set(p, d)))
    }

    /// Create a partial lens.
    pub fn try_new<G, S>(id: &str, get: G, set: S) -> Self
    where
        G: Fn(&P) -> Result<D, FocusError> + Send + Sync + 'static,
        S: Fn(&P, D) -> Result<P, FocusError> + Send + Sync + 'static,
    {
        Self {
            id: Arc::from(id),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Identifier appended to derived store paths.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, parent: &P) -> Result<D, FocusError> {
        (self.get)(parent)
    }

    pub fn set(&self, parent: &P, value: D) -> Result<P, FocusError> {
        (self.set)(parent, value)
    }

    /// Focus further through `inner`.
    pub fn then<X>(self, inner: Lens<D, X>) -> Lens<P, X>
    where
        X: 'static,
    {
        let id = match (self.id.is_empty(), inner.id.is_empty()) {
            (true, _) => inner.id.to_string(),
            (_, true) => self.id.to_string(),
            _ => format!("{}.{}", self.id, inner.id),
        };
        let outer_get = self.clone();
        let outer_set = self;
        let inner_get = inner.clone();

        Lens::try_new(
            &id,
            move |p| inner_get.get(&outer_get.get(p)?),
            move |p, x| {
                let part = outer_set.get(p)?;
                outer_set.set(p, inner.set(&part, x)?)
            },
        )
    }
}

impl<P, D> Clone for Lens<P, D> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<P, D> Debug for Lens<P, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lens").field("id", &self.id).finish()
    }
}

impl<P, D, X> Add<Lens<D, X>> for Lens<P, D>
where
    P: 'static,
    D: 'static,
    X: 'static,
{
    type Output = Lens<P, X>;

    fn add(self, inner: Lens<D, X>) -> Lens<P, X> {
        self.then(inner)
    }
}

/// Focus on the element at `index`.
///
/// The focus follows the position, not the element: after a reorder it
/// points at whatever now sits at `index`.
pub fn lens_at_index<T>(index: usize) -> Lens<Vec<T>, T>
where
    T: Clone + 'static,
{
    Lens::try_new(
        &index.to_string(),
        move |list: &Vec<T>| {
            list.get(index)
                .cloned()
                .ok_or(FocusError::IndexOutOfRange {
                    index,
                    len: list.len(),
                })
        },
        move |list: &Vec<T>, element| {
            if index >= list.len() {
                return Err(FocusError::IndexOutOfRange {
                    index,
                    len: list.len(),
                });
            }
            let mut next = list.clone();
            next[index] = element;
            Ok(next)
        },
    )
}

/// Focus on the element whose identity is `key`.
///
/// The element is looked up on every access, so the focus survives
/// reordering for as long as an element with `key` exists.
pub fn lens_for_key<T, K>(id_provider: IdProvider<T, K>, key: K) -> Lens<Vec<T>, T>
where
    T: Clone + 'static,
    K: PartialEq + Debug + Send + Sync + 'static,
{
    let key = Arc::new(key);
    let id = format!("{:?}", key);
    let get_ids = id_provider.clone();
    let get_key = key.clone();

    Lens::try_new(
        &id,
        move |list: &Vec<T>| {
            list.iter()
                .find(|element| get_ids(element) == *get_key)
                .cloned()
                .ok_or_else(|| FocusError::KeyNotFound {
                    key: format!("{:?}", get_key),
                })
        },
        move |list: &Vec<T>, element| {
            let position = list
                .iter()
                .position(|candidate| id_provider(candidate) == *key)
                .ok_or_else(|| FocusError::KeyNotFound {
                    key: format!("{:?}", key),
                })?;
            let mut next = list.clone();
            next[position] = element;
            Ok(next)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        name: String,
        address: Address,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Address {
        city: String,
        zip: u32,
    }

    fn address() -> Lens<Person, Address> {
        Lens::new(
            "address",
            |p: &Person| p.address.clone(),
            |p: &Person, address| Person {
                address,
                ..p.clone()
            },
        )
    }

    fn city() -> Lens<Address, String> {
        Lens::new(
            "city",
            |a: &Address| a.city.clone(),
            |a: &Address, city| Address { city, ..a.clone() },
        )
    }

    fn alice() -> Person {
        Person {
            name: "Alice".into(),
            address: Address {
                city: "Oslo".into(),
                zip: 150,
            },
        }
    }

    #[test]
    fn lens_laws_hold() {
        let lens = address();
        let person = alice();
        let moved = Address {
            city: "Bergen".into(),
            zip: 5003,
        };

        let updated = lens.set(&person, moved.clone()).unwrap();
        assert_eq!(lens.get(&updated).unwrap(), moved);

        let unchanged = lens.set(&person, lens.get(&person).unwrap()).unwrap();
        assert_eq!(unchanged, person);
    }

    #[test]
    fn composed_lenses_obey_the_laws() {
        let lens = address() + city();
        assert_eq!(lens.id(), "address.city");

        let person = alice();
        let updated = lens.set(&person, "Tromsø".into()).unwrap();
        assert_eq!(lens.get(&updated).unwrap(), "Tromsø");
        assert_eq!(updated.address.zip, 150);
        assert_eq!(updated.name, "Alice");

        let unchanged = lens.set(&person, lens.get(&person).unwrap()).unwrap();
        assert_eq!(unchanged, person);
    }

    #[test]
    fn index_lens_reports_out_of_range() {
        let lens = lens_at_index::<i32>(2);
        let list = vec![1, 2, 3];

        assert_eq!(lens.get(&list).unwrap(), 3);
        assert_eq!(lens.set(&list, 9).unwrap(), vec![1, 2, 9]);

        let short = vec![1];
        assert_eq!(
            lens.get(&short),
            Err(FocusError::IndexOutOfRange { index: 2, len: 1 })
        );
        assert!(lens.set(&short, 9).is_err());
    }

    #[test]
    fn key_lens_follows_element_across_reorder() {
        let ids: IdProvider<(u32, &'static str), u32> = Arc::new(|t| t.0);
        let lens = lens_for_key(ids, 2);

        let list = vec![(1, "a"), (2, "b"), (3, "c")];
        assert_eq!(lens.get(&list).unwrap(), (2, "b"));

        let reordered = vec![(3, "c"), (2, "b"), (1, "a")];
        let updated = lens.set(&reordered, (2, "B")).unwrap();
        assert_eq!(updated, vec![(3, "c"), (2, "B"), (1, "a")]);

        let gone = vec![(1, "a")];
        assert!(matches!(
            lens.get(&gone),
            Err(FocusError::KeyNotFound { .. })
        ));
    }
}
