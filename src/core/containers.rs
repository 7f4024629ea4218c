/*!

The clause containers a saturation loop moves clauses through, with the event contract
the indices rely on: exactly one `added` fire per insertion, and exactly one of `removed`
(the clause is discarded) or `selected` (the clause is promoted to the next stage) per
departure. The `removed` event fires while the container still references the clause, so
subscribed indices can retract their entries before the saturation loop drops its last
`Rc`.

 - [`UnprocessedClauseContainer`]: a LIFO stack of clauses awaiting processing.
 - [`PassiveClauseContainer`]: the priority-ordered candidate store, abstract over the
   selection heuristic via [`ClauseSelectionStrategy`]; [`AgeWeightQueue`] is the stock
   strategy, alternating between oldest-first and lightest-first picks at a configurable
   ratio. `update_limits` drives size-based eviction when the reachable-clause estimate
   shrinks.
 - [`ActiveClauseContainer`]: the set of active clauses with O(1) size and removal,
   evicting on an externally tightened age/weight [`Limits`].

*/

use std::collections::BTreeSet;

use crate::{
  abstractions::HashMap,
  api::clause::{ClauseStore, RcClause},
  core::event::ClauseEvent,
  debug,
};

// region Unprocessed

/// LIFO stack of clauses awaiting processing.
#[derive(Default)]
pub struct UnprocessedClauseContainer {
  data: Vec<RcClause>,

  pub added_event   : ClauseEvent,
  pub removed_event : ClauseEvent,
  pub selected_event: ClauseEvent,
}

impl UnprocessedClauseContainer {
  pub fn new() -> UnprocessedClauseContainer {
    UnprocessedClauseContainer::default()
  }

  pub fn add(&mut self, clause: RcClause) {
    clause.set_store(ClauseStore::Unprocessed);
    self.data.push(clause.clone());
    self.added_event.fire(&clause);
  }

  pub fn add_clauses(&mut self, clauses: impl IntoIterator<Item = RcClause>) {
    for clause in clauses {
      self.add(clause);
    }
  }

  /// Pops the most recently added clause, firing `selected`.
  pub fn pop(&mut self) -> Option<RcClause> {
    let clause = self.data.pop()?;
    self.selected_event.fire(&clause);
    clause.set_store(ClauseStore::None);
    Some(clause)
  }

  #[inline(always)]
  pub fn size(&self) -> usize {
    self.data.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

// endregion

// region Passive

/// The clause-selection heuristic a passive container is parameterized by.
pub trait ClauseSelectionStrategy {
  fn add(&mut self, clause: RcClause);

  /// Returns whether the clause was present.
  fn remove(&mut self, clause: &RcClause) -> bool;

  /// The best clause per the heuristic.
  fn pop_best(&mut self) -> Option<RcClause>;

  /// Evicts the worst clauses until at most `keep` remain, returning the evicted.
  fn drop_worst_beyond(&mut self, keep: usize) -> Vec<RcClause>;

  fn size(&self) -> usize;
}

/// Two priority queues, oldest-first and lightest-first, with an alternation balance:
/// out of every `age_ratio + weight_ratio` picks, `age_ratio` come from the age queue.
/// Ties break on clause number, so selection is deterministic.
pub struct AgeWeightQueue {
  age_ratio   : u32,
  weight_ratio: u32,
  balance     : i64,
  by_age      : BTreeSet<(u32, u32)>,
  by_weight   : BTreeSet<(u32, u32)>,
  clauses     : HashMap<u32, RcClause>,
}

impl AgeWeightQueue {
  pub fn new(age_ratio: u32, weight_ratio: u32) -> AgeWeightQueue {
    assert!(age_ratio + weight_ratio > 0, "age/weight ratio cannot be 0:0");
    AgeWeightQueue {
      age_ratio,
      weight_ratio,
      balance  : 0,
      by_age   : BTreeSet::new(),
      by_weight: BTreeSet::new(),
      clauses  : HashMap::new(),
    }
  }

  fn unlink(&mut self, clause: &RcClause) {
    self.by_age.remove(&(clause.age(), clause.number()));
    self.by_weight.remove(&(clause.weight(), clause.number()));
    self.clauses.remove(&clause.number());
  }
}

impl Default for AgeWeightQueue {
  fn default() -> AgeWeightQueue {
    AgeWeightQueue::new(1, 1)
  }
}

impl ClauseSelectionStrategy for AgeWeightQueue {
  fn add(&mut self, clause: RcClause) {
    self.by_age.insert((clause.age(), clause.number()));
    self.by_weight.insert((clause.weight(), clause.number()));
    self.clauses.insert(clause.number(), clause);
  }

  fn remove(&mut self, clause: &RcClause) -> bool {
    if !self.clauses.contains_key(&clause.number()) {
      return false;
    }
    self.unlink(clause);
    true
  }

  fn pop_best(&mut self) -> Option<RcClause> {
    if self.clauses.is_empty() {
      return None;
    }

    let by_weight = if self.age_ratio == 0 {
      true
    } else if self.weight_ratio == 0 {
      false
    } else if self.balance > 0 {
      true
    } else if self.balance < 0 {
      false
    } else {
      self.age_ratio <= self.weight_ratio
    };

    let number = if by_weight {
      self.balance -= self.age_ratio as i64;
      self.by_weight.first().unwrap().1
    } else {
      self.balance += self.weight_ratio as i64;
      self.by_age.first().unwrap().1
    };

    let clause = self.clauses.get(&number).unwrap().clone();
    self.unlink(&clause);
    Some(clause)
  }

  fn drop_worst_beyond(&mut self, keep: usize) -> Vec<RcClause> {
    let mut evicted = Vec::new();
    while self.clauses.len() > keep {
      let &(_, number) = self.by_weight.last().unwrap();
      let clause = self.clauses.get(&number).unwrap().clone();
      self.unlink(&clause);
      evicted.push(clause);
    }
    evicted
  }

  fn size(&self) -> usize {
    self.clauses.len()
  }
}

/// Priority-ordered store of candidate clauses.
pub struct PassiveClauseContainer {
  strategy: Box<dyn ClauseSelectionStrategy>,

  pub added_event   : ClauseEvent,
  pub removed_event : ClauseEvent,
  pub selected_event: ClauseEvent,
}

impl PassiveClauseContainer {
  pub fn new(strategy: Box<dyn ClauseSelectionStrategy>) -> PassiveClauseContainer {
    PassiveClauseContainer {
      strategy,
      added_event   : ClauseEvent::new(),
      removed_event : ClauseEvent::new(),
      selected_event: ClauseEvent::new(),
    }
  }

  pub fn add(&mut self, clause: RcClause) {
    clause.set_store(ClauseStore::Passive);
    self.strategy.add(clause.clone());
    self.added_event.fire(&clause);
  }

  pub fn add_clauses(&mut self, clauses: impl IntoIterator<Item = RcClause>) {
    for clause in clauses {
      self.add(clause);
    }
  }

  /// Discards a clause (backward simplification and friends), firing `removed`.
  pub fn remove(&mut self, clause: &RcClause) {
    if self.strategy.remove(clause) {
      self.removed_event.fire(clause);
      clause.set_store(ClauseStore::None);
    }
  }

  /// The currently best clause per the selection heuristic, firing `selected`.
  pub fn pop_selected(&mut self) -> Option<RcClause> {
    let clause = self.strategy.pop_best()?;
    self.selected_event.fire(&clause);
    clause.set_store(ClauseStore::None);
    Some(clause)
  }

  /// Size-based eviction: keeps at most `estimated_reachable` clauses, discarding the
  /// heuristically worst and firing `removed` for each.
  pub fn update_limits(&mut self, estimated_reachable: usize) {
    let evicted = self.strategy.drop_worst_beyond(estimated_reachable);
    if !evicted.is_empty() {
      debug!(2, "passive container evicted {} clause(s) over the reachability estimate", evicted.len());
    }
    for clause in evicted {
      self.removed_event.fire(&clause);
      clause.set_store(ClauseStore::None);
    }
  }

  #[inline(always)]
  pub fn size(&self) -> usize {
    self.strategy.size()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.strategy.size() == 0
  }
}

impl Default for PassiveClauseContainer {
  fn default() -> PassiveClauseContainer {
    PassiveClauseContainer::new(Box::new(AgeWeightQueue::default()))
  }
}

// endregion

// region Active

/// Externally imposed age/weight bounds on the active set. `None` means unbounded.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Limits {
  pub age_limit   : Option<u32>,
  pub weight_limit: Option<u32>,
}

impl Limits {
  pub fn permits(&self, clause: &RcClause) -> bool {
    self.age_limit.map_or(true, |limit| clause.age() <= limit)
        && self.weight_limit.map_or(true, |limit| clause.weight() <= limit)
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LimitsChange {
  NoChange,
  Tightened,
  Loosened,
}

/// The set of currently active clauses.
#[derive(Default)]
pub struct ActiveClauseContainer {
  clauses: HashMap<u32, RcClause>,

  pub added_event   : ClauseEvent,
  pub removed_event : ClauseEvent,
  pub selected_event: ClauseEvent,
}

impl ActiveClauseContainer {
  pub fn new() -> ActiveClauseContainer {
    ActiveClauseContainer::default()
  }

  pub fn add(&mut self, clause: RcClause) {
    clause.set_store(ClauseStore::Active);
    self.clauses.insert(clause.number(), clause.clone());
    self.added_event.fire(&clause);
  }

  pub fn remove(&mut self, clause: &RcClause) {
    if self.clauses.remove(&clause.number()).is_some() {
      self.removed_event.fire(clause);
      clause.set_store(ClauseStore::None);
    }
  }

  #[inline(always)]
  pub fn size(&self) -> usize {
    self.clauses.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }

  #[inline(always)]
  pub fn contains(&self, clause: &RcClause) -> bool {
    self.clauses.contains_key(&clause.number())
  }

  /// Evicts every clause the tightened limits no longer permit.
  pub fn on_limits_updated(&mut self, change: LimitsChange, limits: &Limits) {
    if change != LimitsChange::Tightened {
      return;
    }

    let violators: Vec<RcClause> = self
        .clauses
        .values()
        .filter(|clause| !limits.permits(clause))
        .cloned()
        .collect();
    if !violators.is_empty() {
      debug!(2, "active container evicting {} clause(s) on tightened limits", violators.len());
    }
    for clause in violators {
      self.remove(&clause);
    }
  }
}

// endregion

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::{
    api::clause::{Clause, Inference, InputType},
    core::{signature::Signature, term_bank::TermBank},
  };
  use super::*;

  fn bank() -> TermBank {
    TermBank::new(Signature::new())
  }

  fn unit_clause(bank: &TermBank) -> RcClause {
    Clause::new(bank, vec![], InputType::Axiom, Inference::input())
  }

  fn derived_clause(bank: &TermBank, parents: Vec<RcClause>) -> RcClause {
    Clause::new(
      bank,
      vec![],
      InputType::Derived,
      Inference { rule: crate::api::clause::InferenceRule::Resolution, parents },
    )
  }

  #[test]
  fn unprocessed_is_lifo_and_fires_events() {
    let bank = bank();
    let first = unit_clause(&bank);
    let second = unit_clause(&bank);

    let mut container = UnprocessedClauseContainer::new();
    let added: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let selected: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let _on_add = {
      let added = added.clone();
      container.added_event.subscribe(Box::new(move |_| *added.borrow_mut() += 1))
    };
    let _on_select = {
      let selected = selected.clone();
      container.selected_event.subscribe(Box::new(move |_| *selected.borrow_mut() += 1))
    };

    container.add(first.clone());
    container.add(second.clone());
    assert_eq!(*added.borrow(), 2);
    assert_eq!(first.store(), ClauseStore::Unprocessed);

    let popped = container.pop().unwrap();
    assert_eq!(popped.number(), second.number());
    assert_eq!(*selected.borrow(), 1);
    assert_eq!(popped.store(), ClauseStore::None);
    assert!(!container.is_empty());
    container.pop().unwrap();
    assert!(container.pop().is_none());
  }

  #[test]
  fn event_fan_out_fires_each_subscriber_exactly_once_in_order() {
    let bank = bank();
    let clause = unit_clause(&bank);

    let mut container = ActiveClauseContainer::new();
    let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
    let _first = {
      let order = order.clone();
      container.added_event.subscribe(Box::new(move |_| order.borrow_mut().push(1)))
    };
    let _second = {
      let order = order.clone();
      container.added_event.subscribe(Box::new(move |_| order.borrow_mut().push(2)))
    };
    let removed: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let _on_removed = {
      let removed = removed.clone();
      container.removed_event.subscribe(Box::new(move |_| *removed.borrow_mut() += 1))
    };
    let selected: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let _on_selected = {
      let selected = selected.clone();
      container.selected_event.subscribe(Box::new(move |_| *selected.borrow_mut() += 1))
    };

    container.add(clause.clone());
    assert_eq!(*order.borrow(), vec![1, 2]);

    container.remove(&clause);
    assert_eq!(*removed.borrow(), 1);
    // `selected` never fires on removal.
    assert_eq!(*selected.borrow(), 0);
    // Removing an absent clause fires nothing.
    container.remove(&clause);
    assert_eq!(*removed.borrow(), 1);
  }

  #[test]
  fn age_weight_queue_alternates_and_passive_container_tracks_stores() {
    let signature = Signature::new();
    let (p, a, f) = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      let p = sig.declare_predicate("p".into(), vec![iota], Default::default()).unwrap();
      let a = sig.declare_function("a".into(), vec![], iota, Default::default()).unwrap();
      let f = sig.declare_function("f".into(), vec![iota], iota, Default::default()).unwrap();
      (p, a, f)
    };
    let mut bank = TermBank::new(signature);

    // An old, heavy clause and a young, light one.
    let heavy_lit = {
      let ca = bank.constant(a);
      let fa = bank.application(f, vec![ca]);
      let ffa = bank.application(f, vec![fa]);
      bank.literal(p, true, vec![ffa])
    };
    let light_lit = {
      let ca = bank.constant(a);
      bank.literal(p, true, vec![ca])
    };
    let old_heavy = Clause::new(&bank, vec![heavy_lit], InputType::Axiom, Inference::input());
    let intermediate = Clause::new(&bank, vec![light_lit], InputType::Axiom, Inference::input());
    let young_light = derived_clause(&bank, vec![intermediate.clone()]);

    let mut container = PassiveClauseContainer::default();
    container.add(old_heavy.clone());
    container.add(young_light.clone());
    assert_eq!(old_heavy.store(), ClauseStore::Passive);
    assert_eq!(container.size(), 2);

    // Ratio 1:1 starts on the weight queue, then alternates to age.
    let by_weight = container.pop_selected().unwrap();
    assert_eq!(by_weight.number(), young_light.number());
    let by_age = container.pop_selected().unwrap();
    assert_eq!(by_age.number(), old_heavy.number());
    assert!(container.pop_selected().is_none());
    assert_eq!(by_weight.store(), ClauseStore::None);
  }

  #[test]
  fn passive_limit_eviction_fires_removed_once_per_clause() {
    let bank = bank();
    let clauses: Vec<RcClause> = (0..5).map(|_| unit_clause(&bank)).collect();

    let mut container = PassiveClauseContainer::default();
    let removed: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
    let _on_removed = {
      let removed = removed.clone();
      container.removed_event.subscribe(Box::new(move |c| removed.borrow_mut().push(c.number())))
    };

    container.add_clauses(clauses.iter().cloned());
    container.update_limits(2);

    assert_eq!(container.size(), 2);
    assert_eq!(removed.borrow().len(), 3);
    // Exactly once per evicted clause.
    let mut unique = removed.borrow().clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
  }

  #[test]
  fn active_container_evicts_on_tightened_limits() {
    let bank = bank();
    let parent = unit_clause(&bank);
    let child = derived_clause(&bank, vec![parent.clone()]);
    let grandchild = derived_clause(&bank, vec![child.clone()]);

    let mut container = ActiveClauseContainer::new();
    container.add(parent.clone());
    container.add(child.clone());
    container.add(grandchild.clone());
    assert_eq!(container.size(), 3);

    let limits = Limits { age_limit: Some(1), weight_limit: None };
    container.on_limits_updated(LimitsChange::Loosened, &limits);
    assert_eq!(container.size(), 3);

    container.on_limits_updated(LimitsChange::Tightened, &limits);
    assert_eq!(container.size(), 2);
    assert!(!container.contains(&grandchild));
    assert_eq!(grandchild.store(), ClauseStore::None);
  }
}
