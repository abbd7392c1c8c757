//! `QpStore`: the name-indexed, location-keyed value cache.
//!
//! Values are registered once under a unique name and retrieved by dense
//! [`ValueId`]. Retrieval is lazy: `get` runs the registered [`Valuer`],
//! which may itself demand other values through the store. History is
//! opt-in: once a value's old or older version has ever been requested (or
//! armed explicitly), every current computation is staged so the next
//! [`shift`](QpStore::shift) can rotate it into the prior tiers.
//!
//! ## Error checking
//! Built with [`QpStore::with_error_checking`], the store maintains a stack
//! of in-flight id frames. Re-entering an id inside the active frame is a
//! cyclic value dependency and fails with the cycle members named. A
//! `get_old`/`get_older` opens a fresh frame: the old dependency chain is
//! severed in time, so an old self-reference is not a cycle. Independent of
//! that, re-entering the *same* valuer's evaluation is always refused,
//! error checking or not.
//!
//! ## Lifecycle
//! All registrations live for the duration of a run. `shift` rotates
//! `older ← old ← current` and broadcasts to every valuer;
//! [`project`](QpStore::project) relocates old entries across a mesh
//! adaptation, between the shift and the first `get_old` of the new step.

use crate::qp::location::{KeyPolicy, Location, QpKey};
use crate::qp::value::{Guarantee, Value, ValueId, ValueLike};
use crate::qp::valuer::Valuer;
use crate::sweep_error::MeshSweepError;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::rc::Rc;

/// Mapper chains longer than this report [`MeshSweepError::MapperLoop`].
const MAPPER_DEPTH_LIMIT: usize = 64;

type HistoryMap<P> = BTreeMap<<P as KeyPolicy>::Key, Box<dyn Value>>;
type MapperFn = Box<dyn Fn(&Location) -> Result<ValueId, MeshSweepError>>;
type ValuerHandle<P> = Rc<RefCell<dyn ErasedValuer<P>>>;

/// Object-safe bridge over [`Valuer`] implementations.
trait ErasedValuer<P: KeyPolicy> {
    fn compute(
        &mut self,
        store: &mut QpStore<P>,
        loc: &Location,
    ) -> Result<Box<dyn Value>, MeshSweepError>;
    fn initial_old(&self) -> Box<dyn Value>;
    fn initial_older(&self) -> Box<dyn Value>;
    fn guarantees(&self) -> Vec<Guarantee>;
    fn shifted(&mut self);
    fn output_type(&self) -> TypeId;
    fn output_type_name(&self) -> &'static str;
}

impl<P: KeyPolicy, V: Valuer<P>> ErasedValuer<P> for V {
    fn compute(
        &mut self,
        store: &mut QpStore<P>,
        loc: &Location,
    ) -> Result<Box<dyn Value>, MeshSweepError> {
        self.value(store, loc).map(|v| Box::new(v) as Box<dyn Value>)
    }

    fn initial_old(&self) -> Box<dyn Value> {
        Box::new(Valuer::initial_old(self))
    }

    fn initial_older(&self) -> Box<dyn Value> {
        Box::new(Valuer::initial_older(self))
    }

    fn guarantees(&self) -> Vec<Guarantee> {
        Valuer::guarantees(self).to_vec()
    }

    fn shifted(&mut self) {
        Valuer::shifted(self);
    }

    fn output_type(&self) -> TypeId {
        TypeId::of::<V::Output>()
    }

    fn output_type_name(&self) -> &'static str {
        std::any::type_name::<V::Output>()
    }
}

/// Per-id registration record.
struct Slot<P: KeyPolicy> {
    name: String,
    /// `None` for mapper slots.
    valuer: Option<ValuerHandle<P>>,
    mapper: Option<MapperFn>,
    /// Whether the store holds the only handle to the valuer.
    owned: bool,
    /// An old version of this value has ever been requested.
    want_old: bool,
    /// An older version of this value has ever been requested.
    want_older: bool,
    /// `get` has been called for this id from outside the store.
    external_curr: bool,
    /// Declared output type, recorded at registration.
    vtype: Option<TypeId>,
    vtype_name: &'static str,
    guarantees: Vec<Guarantee>,
    initial_old: Option<Box<dyn Value>>,
    initial_older: Option<Box<dyn Value>>,
}

#[derive(Copy, Clone)]
enum Tier {
    Old,
    Older,
}

/// Heterogeneous, lazily computed, location-keyed value store.
///
/// Generic over the [`KeyPolicy`] deciding which location fields identify a
/// stored entry; the default keys by element/face/qp/custom.
pub struct QpStore<P: KeyPolicy = QpKey> {
    slots: Vec<Slot<P>>,
    ids: HashMap<String, ValueId>,
    curr: Vec<HistoryMap<P>>,
    old: Vec<HistoryMap<P>>,
    older: Vec<HistoryMap<P>>,
    /// In-flight id frames; a new frame per severed (old) chain.
    cycle_stack: Vec<Vec<ValueId>>,
    errcheck: bool,
}

impl<P: KeyPolicy> Default for QpStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: KeyPolicy> QpStore<P> {
    /// A store without cyclic-dependency bookkeeping.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            ids: HashMap::new(),
            curr: Vec::new(),
            old: Vec::new(),
            older: Vec::new(),
            cycle_stack: vec![Vec::new()],
            errcheck: false,
        }
    }

    /// A store that tracks in-flight evaluations and reports cycles with
    /// their members.
    pub fn with_error_checking() -> Self {
        Self {
            errcheck: true,
            ..Self::new()
        }
    }

    /// Number of registered values (mappers included).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Register a valuer the store takes ownership of.
    ///
    /// # Errors
    /// [`MeshSweepError::NameConflict`] if `name` is taken.
    pub fn add<V: Valuer<P>>(&mut self, name: &str, valuer: V) -> Result<ValueId, MeshSweepError> {
        self.register(name, Rc::new(RefCell::new(valuer)), true)
    }

    /// Register a valuer the caller keeps a handle to, e.g. to adjust its
    /// parameters between steps.
    pub fn add_shared<V: Valuer<P>>(
        &mut self,
        name: &str,
        valuer: Rc<RefCell<V>>,
    ) -> Result<ValueId, MeshSweepError> {
        self.register(name, valuer, false)
    }

    fn register(
        &mut self,
        name: &str,
        valuer: ValuerHandle<P>,
        owned: bool,
    ) -> Result<ValueId, MeshSweepError> {
        if self.ids.contains_key(name) {
            return Err(MeshSweepError::NameConflict(name.to_string()));
        }
        let (guarantees, initial_old, initial_older, vtype, vtype_name) = {
            let v = valuer.try_borrow().map_err(|_| {
                MeshSweepError::InvariantViolation(format!(
                    "valuer for `{name}` is mid-evaluation during registration"
                ))
            })?;
            (
                v.guarantees(),
                v.initial_old(),
                v.initial_older(),
                v.output_type(),
                v.output_type_name(),
            )
        };
        let id = ValueId::new(self.slots.len());
        self.slots.push(Slot {
            name: name.to_string(),
            valuer: Some(valuer),
            mapper: None,
            owned,
            want_old: false,
            want_older: false,
            external_curr: false,
            vtype: Some(vtype),
            vtype_name,
            guarantees,
            initial_old: Some(initial_old),
            initial_older: Some(initial_older),
        });
        self.push_tier_maps();
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a name whose resolution is delegated: requests against the
    /// returned id call `mapper` with the location and forward to the id it
    /// yields. Mappers may chain up to a fixed depth.
    pub fn add_mapper(
        &mut self,
        name: &str,
        mapper: impl Fn(&Location) -> Result<ValueId, MeshSweepError> + 'static,
    ) -> Result<ValueId, MeshSweepError> {
        if self.ids.contains_key(name) {
            return Err(MeshSweepError::NameConflict(name.to_string()));
        }
        let id = ValueId::new(self.slots.len());
        self.slots.push(Slot {
            name: name.to_string(),
            valuer: None,
            mapper: Some(Box::new(mapper)),
            owned: true,
            want_old: false,
            want_older: false,
            external_curr: false,
            vtype: None,
            vtype_name: "<mapped>",
            guarantees: Vec::new(),
            initial_old: None,
            initial_older: None,
        });
        self.push_tier_maps();
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn push_tier_maps(&mut self) {
        self.curr.push(BTreeMap::new());
        self.old.push(BTreeMap::new());
        self.older.push(BTreeMap::new());
    }

    /// Id registered under `name`.
    ///
    /// # Errors
    /// [`MeshSweepError::UnknownName`] when absent.
    pub fn id(&self, name: &str) -> Result<ValueId, MeshSweepError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| MeshSweepError::UnknownName(name.to_string()))
    }

    /// Name registered under `id`.
    pub fn name(&self, id: ValueId) -> Result<&str, MeshSweepError> {
        self.slots
            .get(id.index())
            .map(|s| s.name.as_str())
            .ok_or(MeshSweepError::UnknownId(id.get()))
    }

    /// Arm old-value tracking for a concrete (non-mapper) value.
    pub fn want_old(&mut self, name: &str) -> Result<(), MeshSweepError> {
        let id = self.id(name)?;
        self.slots[id.index()].want_old = true;
        Ok(())
    }

    /// Arm older-value tracking; implies old-value tracking, since the
    /// older tier is fed from the old tier on rotation.
    pub fn want_older(&mut self, name: &str) -> Result<(), MeshSweepError> {
        let id = self.id(name)?;
        let slot = &mut self.slots[id.index()];
        slot.want_older = true;
        slot.want_old = true;
        Ok(())
    }

    /// Has `get` ever been called for this id from outside the store?
    ///
    /// A value that is only ever demanded as history reports `false` here,
    /// which embedding runtimes can use to force an evaluation per step so
    /// the history keeps flowing.
    pub fn externally_requested(&self, id: ValueId) -> Result<bool, MeshSweepError> {
        self.slots
            .get(id.index())
            .map(|s| s.external_curr)
            .ok_or(MeshSweepError::UnknownId(id.get()))
    }

    /// Does the store hold the only handle to this value's valuer?
    pub fn owns(&self, id: ValueId) -> Result<bool, MeshSweepError> {
        self.slots
            .get(id.index())
            .map(|s| s.owned)
            .ok_or(MeshSweepError::UnknownId(id.get()))
    }

    /// Compute and return the current value of `id` at `loc`.
    ///
    /// Marks the id externally requested and, when history is armed, stages
    /// the result so the next shift rotates it into the old tier.
    ///
    /// # Errors
    /// `UnknownId`, `TypeMismatch`, `CyclicValueDependency`, `MapperLoop`,
    /// or whatever the valuer itself reports.
    pub fn get<T: ValueLike>(&mut self, id: ValueId, loc: &Location) -> Result<T, MeshSweepError> {
        self.eval(id, loc, true)
    }

    /// [`get`](Self::get) by registered name.
    pub fn get_named<T: ValueLike>(
        &mut self,
        name: &str,
        loc: &Location,
    ) -> Result<T, MeshSweepError> {
        let id = self.id(name)?;
        self.eval(id, loc, true)
    }

    /// [`get`](Self::get) that additionally requires declared guarantees.
    ///
    /// # Errors
    /// [`MeshSweepError::MissingGuarantee`] naming the first guarantee the
    /// valuer does not declare.
    pub fn get_guaranteed<T: ValueLike>(
        &mut self,
        id: ValueId,
        loc: &Location,
        required: &[Guarantee],
    ) -> Result<T, MeshSweepError> {
        let id = self.resolve(id, loc)?;
        let slot = &self.slots[id.index()];
        for g in required {
            if !slot.guarantees.contains(g) {
                return Err(MeshSweepError::MissingGuarantee {
                    value: slot.name.clone(),
                    guarantee: g.as_str(),
                });
            }
        }
        self.eval(id, loc, true)
    }

    /// Prior-step value of `id` at `loc`.
    ///
    /// Arms old tracking, and triggers a current computation (not marked
    /// external) when none has been requested yet, so a value demanded only
    /// as history still gets evaluated every step. Returns the valuer's
    /// declared initial-old before any history exists.
    pub fn get_old<T: ValueLike>(
        &mut self,
        id: ValueId,
        loc: &Location,
    ) -> Result<T, MeshSweepError> {
        self.history(id, loc, Tier::Old)
    }

    /// [`get_old`](Self::get_old) by registered name.
    pub fn get_old_named<T: ValueLike>(
        &mut self,
        name: &str,
        loc: &Location,
    ) -> Result<T, MeshSweepError> {
        let id = self.id(name)?;
        self.history(id, loc, Tier::Old)
    }

    /// Prior-prior-step value of `id` at `loc`.
    pub fn get_older<T: ValueLike>(
        &mut self,
        id: ValueId,
        loc: &Location,
    ) -> Result<T, MeshSweepError> {
        self.history(id, loc, Tier::Older)
    }

    /// [`get_older`](Self::get_older) by registered name.
    pub fn get_older_named<T: ValueLike>(
        &mut self,
        name: &str,
        loc: &Location,
    ) -> Result<T, MeshSweepError> {
        let id = self.id(name)?;
        self.history(id, loc, Tier::Older)
    }

    /// Rotate the history tiers: `older ← old`, `old ← current`,
    /// `current ← {}`; broadcast the shift to every valuer.
    ///
    /// A strict barrier: no in-flight evaluation may observe a partial
    /// rotation.
    ///
    /// # Errors
    /// [`MeshSweepError::ShiftMidEvaluation`] when called from inside a
    /// valuer's evaluation.
    pub fn shift(&mut self) -> Result<(), MeshSweepError> {
        for slot in &self.slots {
            if let Some(h) = &slot.valuer {
                if h.try_borrow_mut().is_err() {
                    return Err(MeshSweepError::ShiftMidEvaluation {
                        value: slot.name.clone(),
                    });
                }
            }
        }
        let fresh: Vec<HistoryMap<P>> = (0..self.slots.len()).map(|_| BTreeMap::new()).collect();
        self.older = std::mem::replace(&mut self.old, std::mem::replace(&mut self.curr, fresh));
        for slot in &self.slots {
            if let Some(h) = &slot.valuer {
                if let Ok(mut v) = h.try_borrow_mut() {
                    v.shifted();
                }
            }
        }
        Ok(())
    }

    /// Relocate old-tier entries from `srcs` to `dsts`, one-to-one by
    /// index, releasing anything already stored at a destination and
    /// vacating each source. Call after [`shift`](Self::shift) and before
    /// any `get_old` when the mesh has been adapted.
    ///
    /// # Errors
    /// [`MeshSweepError::ProjectionMismatch`] when the lists differ in
    /// length.
    pub fn project(&mut self, srcs: &[Location], dsts: &[Location]) -> Result<(), MeshSweepError> {
        if srcs.len() != dsts.len() {
            return Err(MeshSweepError::ProjectionMismatch {
                srcs: srcs.len(),
                dsts: dsts.len(),
            });
        }
        for map in self.old.iter_mut() {
            for (src, dst) in srcs.iter().zip(dsts) {
                if let Some(v) = map.remove(&P::key(src)) {
                    map.insert(P::key(dst), v);
                }
            }
        }
        Ok(())
    }

    /// Write the old tier of `id` to `out` (entry count, then key/value
    /// pairs in key order). The byte shape is caller-defined beyond the
    /// promise that [`load_history`](Self::load_history) consumes writes in
    /// the same order.
    pub fn store_history(&self, id: ValueId, out: &mut dyn Write) -> Result<(), MeshSweepError> {
        let idx = self.checked_index(id)?;
        let map = &self.old[idx];
        bincode::serialize_into(&mut *out, &(map.len() as u64))
            .map_err(|e| MeshSweepError::ValueCodec(e.to_string()))?;
        for (k, v) in map {
            bincode::serialize_into(&mut *out, k)
                .map_err(|e| MeshSweepError::ValueCodec(e.to_string()))?;
            v.store(out)?;
        }
        Ok(())
    }

    /// Replace the old tier of `id` with entries read from `input`; arms
    /// old tracking.
    pub fn load_history(&mut self, id: ValueId, input: &mut dyn Read) -> Result<(), MeshSweepError> {
        let idx = self.checked_index(id)?;
        let proto = self.slots[idx]
            .initial_old
            .as_ref()
            .ok_or(MeshSweepError::UnknownId(id.get()))?;
        let len: u64 = bincode::deserialize_from(&mut *input)
            .map_err(|e| MeshSweepError::ValueCodec(e.to_string()))?;
        let mut map: HistoryMap<P> = BTreeMap::new();
        for _ in 0..len {
            let k: P::Key = bincode::deserialize_from(&mut *input)
                .map_err(|e| MeshSweepError::ValueCodec(e.to_string()))?;
            let mut v = proto.clone_value();
            v.load(input)?;
            map.insert(k, v);
        }
        self.old[idx] = map;
        self.slots[idx].want_old = true;
        Ok(())
    }

    // ---- internals ------------------------------------------------------

    fn checked_index(&self, id: ValueId) -> Result<usize, MeshSweepError> {
        if id.index() < self.slots.len() {
            Ok(id.index())
        } else {
            Err(MeshSweepError::UnknownId(id.get()))
        }
    }

    /// Follow mapper slots until a concrete value id comes out.
    fn resolve(&self, id: ValueId, loc: &Location) -> Result<ValueId, MeshSweepError> {
        let mut id = id;
        self.checked_index(id)?;
        let entry = self.slots[id.index()].name.clone();
        let mut depth = 0usize;
        loop {
            let slot = self
                .slots
                .get(id.index())
                .ok_or(MeshSweepError::UnknownId(id.get()))?;
            match &slot.mapper {
                None => return Ok(id),
                Some(m) => {
                    if depth >= MAPPER_DEPTH_LIMIT {
                        return Err(MeshSweepError::MapperLoop {
                            value: entry,
                            depth,
                        });
                    }
                    id = m(loc)?;
                    depth += 1;
                }
            }
        }
    }

    fn check_type<T: ValueLike>(&self, id: ValueId) -> Result<(), MeshSweepError> {
        let slot = &self.slots[id.index()];
        match slot.vtype {
            Some(t) if t == TypeId::of::<T>() => Ok(()),
            _ => Err(self.mismatch::<T>(id)),
        }
    }

    fn mismatch<T>(&self, id: ValueId) -> MeshSweepError {
        let slot = &self.slots[id.index()];
        MeshSweepError::TypeMismatch {
            value: slot.name.clone(),
            stored: slot.vtype_name,
            requested: std::any::type_name::<T>(),
        }
    }

    /// Push `id` onto the active frame, failing if it is already there.
    fn enter(&mut self, id: ValueId) -> Result<(), MeshSweepError> {
        if let Some(frame) = self.cycle_stack.last() {
            if let Some(pos) = frame.iter().position(|&x| x == id) {
                let mut cycle: Vec<String> = frame[pos..]
                    .iter()
                    .map(|&x| self.slots[x.index()].name.clone())
                    .collect();
                cycle.push(self.slots[id.index()].name.clone());
                return Err(MeshSweepError::CyclicValueDependency { cycle });
            }
        }
        if let Some(frame) = self.cycle_stack.last_mut() {
            frame.push(id);
        }
        Ok(())
    }

    fn leave(&mut self, id: ValueId) {
        if let Some(frame) = self.cycle_stack.last_mut() {
            if let Some(pos) = frame.iter().rposition(|&x| x == id) {
                frame.remove(pos);
            }
        }
    }

    fn eval<T: ValueLike>(
        &mut self,
        id: ValueId,
        loc: &Location,
        external: bool,
    ) -> Result<T, MeshSweepError> {
        let id = self.resolve(id, loc)?;
        self.check_type::<T>(id)?;
        if self.errcheck {
            self.enter(id)?;
        }
        let out = self.run_valuer(id, loc, external);
        if self.errcheck {
            self.leave(id);
        }
        let boxed = out?;
        boxed
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| self.mismatch::<T>(id))
    }

    fn run_valuer(
        &mut self,
        id: ValueId,
        loc: &Location,
        external: bool,
    ) -> Result<Box<dyn Value>, MeshSweepError> {
        let idx = id.index();
        if external {
            // Per-id: the flag survives across locations and shifts.
            self.slots[idx].external_curr = true;
        }
        let handle = match &self.slots[idx].valuer {
            Some(h) => Rc::clone(h),
            None => return Err(MeshSweepError::UnknownId(id.get())),
        };
        let mut valuer = handle.try_borrow_mut().map_err(|_| {
            let name = self.slots[idx].name.clone();
            MeshSweepError::CyclicValueDependency {
                cycle: vec![name.clone(), name],
            }
        })?;
        let val = valuer.compute(self, loc)?;
        drop(valuer);
        if self.slots[idx].want_old {
            self.curr[idx].insert(P::key(loc), val.clone_value());
        }
        Ok(val)
    }

    fn history<T: ValueLike>(
        &mut self,
        id: ValueId,
        loc: &Location,
        tier: Tier,
    ) -> Result<T, MeshSweepError> {
        let id = self.resolve(id, loc)?;
        self.check_type::<T>(id)?;
        let idx = id.index();
        self.slots[idx].want_old = true;
        if matches!(tier, Tier::Older) {
            self.slots[idx].want_older = true;
        }
        let key = P::key(loc);
        // Without an external current computation there is nothing staged to
        // become the next old value; evaluate once on our own. The old
        // dependency chain is severed in time, so this runs in a fresh
        // cycle frame.
        if !self.slots[idx].external_curr && !self.curr[idx].contains_key(&key) {
            if self.errcheck {
                self.cycle_stack.push(Vec::new());
            }
            let primed = self.eval::<T>(id, loc, false).map(|_| ());
            if self.errcheck {
                self.cycle_stack.pop();
            }
            primed?;
        }
        let map = match tier {
            Tier::Old => &self.old[idx],
            Tier::Older => &self.older[idx],
        };
        if let Some(v) = map.get(&key) {
            return v
                .as_any()
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| self.mismatch::<T>(id));
        }
        // No history yet: the valuer's declared initial value.
        let init = match tier {
            Tier::Old => &self.slots[idx].initial_old,
            Tier::Older => &self.slots[idx].initial_older,
        };
        init.as_ref()
            .and_then(|v| v.as_any().downcast_ref::<T>().cloned())
            .ok_or_else(|| self.mismatch::<T>(id))
    }
}
