//! Valuers: the computations behind stored values.
//!
//! A [`Valuer`] produces one payload type at a requested [`Location`]. The
//! owning store is threaded through [`Valuer::value`] so a valuer can
//! demand other registered values while computing its own; the store's
//! cycle guard catches self-referential chains.

use crate::qp::location::{KeyPolicy, Location, QpKey};
use crate::qp::store::QpStore;
use crate::qp::value::{Guarantee, ValueLike};
use crate::sweep_error::MeshSweepError;
use std::marker::PhantomData;

/// A computation producing values of one type at mesh locations.
pub trait Valuer<P: KeyPolicy = QpKey>: 'static {
    type Output: ValueLike;

    /// Compute the value at `loc`. Dependencies are fetched through
    /// `store`, which re-enters this registry.
    fn value(
        &mut self,
        store: &mut QpStore<P>,
        loc: &Location,
    ) -> Result<Self::Output, MeshSweepError>;

    /// Value reported by `get_old` before any history exists.
    fn initial_old(&self) -> Self::Output {
        Self::Output::default()
    }

    /// Value reported by `get_older` before any history exists.
    fn initial_older(&self) -> Self::Output {
        Self::Output::default()
    }

    /// Semantic properties callers may require at retrieval time.
    fn guarantees(&self) -> &[Guarantee] {
        &[]
    }

    /// Notification that the store rotated its history tiers.
    fn shifted(&mut self) {}
}

/// A fixed value at every location.
#[derive(Clone, Debug)]
pub struct ConstValuer<T>(pub T);

impl<P: KeyPolicy, T: ValueLike> Valuer<P> for ConstValuer<T> {
    type Output = T;

    fn value(&mut self, _: &mut QpStore<P>, _: &Location) -> Result<T, MeshSweepError> {
        Ok(self.0.clone())
    }

    fn guarantees(&self) -> &[Guarantee] {
        &[Guarantee::Constant]
    }
}

/// Closure-backed valuer.
///
/// ```
/// use mesh_sweep::qp::{FnValuer, Location, QpStore};
///
/// let mut store: QpStore = QpStore::new();
/// let id = store
///     .add(
///         "two-x",
///         FnValuer::new(|_store: &mut QpStore, loc: &Location| Ok(2.0 * loc.elem_id as f64)),
///     )
///     .unwrap();
/// assert_eq!(store.get::<f64>(id, &Location::elem(3, 1, 0)).unwrap(), 6.0);
/// ```
pub struct FnValuer<T, P: KeyPolicy = QpKey, F = fn(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError>>
{
    f: F,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<T, P: KeyPolicy, F> FnValuer<T, P, F>
where
    F: FnMut(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<T, P, F> Valuer<P> for FnValuer<T, P, F>
where
    T: ValueLike,
    P: KeyPolicy,
    F: FnMut(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError> + 'static,
{
    type Output = T;

    fn value(&mut self, store: &mut QpStore<P>, loc: &Location) -> Result<T, MeshSweepError> {
        (self.f)(store, loc)
    }
}

/// Closure-backed valuer that memoizes the most recent location until the
/// next shift.
///
/// Useful when one evaluation computes several coupled properties at once:
/// repeated demands at the same location within a step reuse the stored
/// result instead of re-running the closure.
pub struct MemoValuer<T, P: KeyPolicy = QpKey, F = fn(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError>>
{
    f: F,
    last: Option<(P::Key, T)>,
}

impl<T, P: KeyPolicy, F> MemoValuer<T, P, F>
where
    F: FnMut(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError>,
{
    pub fn new(f: F) -> Self {
        Self { f, last: None }
    }
}

impl<T, P, F> Valuer<P> for MemoValuer<T, P, F>
where
    T: ValueLike,
    P: KeyPolicy,
    F: FnMut(&mut QpStore<P>, &Location) -> Result<T, MeshSweepError> + 'static,
{
    type Output = T;

    fn value(&mut self, store: &mut QpStore<P>, loc: &Location) -> Result<T, MeshSweepError> {
        let key = P::key(loc);
        if let Some((last_key, v)) = &self.last {
            if *last_key == key {
                return Ok(v.clone());
            }
        }
        let v = (self.f)(store, loc)?;
        self.last = Some((key, v.clone()));
        Ok(v)
    }

    fn shifted(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qp::store::QpStore;

    #[test]
    fn const_valuer_declares_constant() {
        let v: ConstValuer<f64> = ConstValuer(4.0);
        let gs = <ConstValuer<f64> as Valuer<QpKey>>::guarantees(&v);
        assert_eq!(gs, &[Guarantee::Constant]);
    }

    #[test]
    fn memo_valuer_reuses_same_location_until_shift() {
        let mut store: QpStore = QpStore::new();
        let id = store
            .add("counting", {
                let mut calls = 0u64;
                MemoValuer::new(move |_: &mut QpStore, _: &Location| {
                    calls += 1;
                    Ok(calls as f64)
                })
            })
            .unwrap();

        let loc = Location::elem(1, 2, 0);
        assert_eq!(store.get::<f64>(id, &loc).unwrap(), 1.0);
        assert_eq!(store.get::<f64>(id, &loc).unwrap(), 1.0);
        // A different location recomputes.
        let other = Location::elem(2, 2, 0);
        assert_eq!(store.get::<f64>(id, &other).unwrap(), 2.0);
        // The shift broadcast clears the memo.
        store.shift().unwrap();
        assert_eq!(store.get::<f64>(id, &other).unwrap(), 3.0);
    }
}
