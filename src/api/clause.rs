/*!

A `Clause` is an ordered multiset of literals together with an input-type tag, a
provenance record, and the *store* state the containers move it through:

```text
  (no store) → unprocessed → passive → active → (no store)
                         ↘         ↘            ↗
                          └── discarded ───────┘
```

A clause's number is stable for its lifetime and is its identity; the literal list and
the selection mask are immutable once constructed. The store state is the only mutable
field, and only the clause containers drive it.

Clauses are shared via `Rc`: containers own them while they are stored, and indices hold
clones that are retracted through `removed` events before the saturation loop drops its
last reference.

*/

use std::{
  cell::Cell,
  rc::Rc,
  sync::atomic::{AtomicU32, Ordering},
};

use crate::{
  abstractions::NatSet,
  api::literal::Literal,
  core::term_bank::TermBank,
};

pub type RcClause = Rc<Clause>;

/// Which container currently holds the clause.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ClauseStore {
  Unprocessed,
  Passive,
  Active,
  #[default]
  None,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InputType {
  Axiom,
  Conjecture,
  Derived,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InferenceRule {
  Input,
  Resolution,
  Factoring,
  Superposition,
  Instantiation,
}

/// Provenance: which rule produced the clause from which parents.
#[derive(Clone)]
pub struct Inference {
  pub rule   : InferenceRule,
  pub parents: Vec<RcClause>,
}

impl Inference {
  pub fn input() -> Inference {
    Inference { rule: InferenceRule::Input, parents: Vec::new() }
  }
}

/// Source of process-unique clause numbers.
static NEXT_CLAUSE_NUMBER: AtomicU32 = AtomicU32::new(0);

pub struct Clause {
  number    : u32,
  literals  : Vec<Literal>,
  selected  : NatSet,
  input_type: InputType,
  inference : Inference,
  age       : u32,
  weight    : u32,
  store     : Cell<ClauseStore>,
}

impl Clause {
  /// Creates a clause with every literal selected. The age is one more than the oldest
  /// parent's; input clauses have age 0.
  pub fn new(bank: &TermBank, literals: Vec<Literal>, input_type: InputType, inference: Inference) -> RcClause {
    let mut selected = NatSet::new();
    for index in 0..literals.len() {
      selected.insert(index);
    }
    Self::with_selection(bank, literals, selected, input_type, inference)
  }

  /// Creates a clause with the given selection mask. The mask is immutable afterwards.
  pub fn with_selection(
    bank      : &TermBank,
    literals  : Vec<Literal>,
    selected  : NatSet,
    input_type: InputType,
    inference : Inference,
  ) -> RcClause
  {
    let weight = literals.iter().map(|&l| bank.literal_weight(l)).sum();
    let age = inference
        .parents
        .iter()
        .map(|p| p.age() + 1)
        .max()
        .unwrap_or(0);

    Rc::new(Clause {
      number: NEXT_CLAUSE_NUMBER.fetch_add(1, Ordering::Relaxed),
      literals,
      selected,
      input_type,
      inference,
      age,
      weight,
      store: Cell::new(ClauseStore::None),
    })
  }

  #[inline(always)]
  pub fn number(&self) -> u32 {
    self.number
  }

  #[inline(always)]
  pub fn literals(&self) -> &[Literal] {
    &self.literals
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.literals.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.literals.is_empty()
  }

  /// The literals picked out by the selection mask, in clause order.
  pub fn selected_literals(&self) -> impl Iterator<Item = Literal> + '_ {
    self.selected.iter().map(|index| self.literals[index])
  }

  #[inline(always)]
  pub fn is_selected(&self, index: usize) -> bool {
    self.selected.contains(index)
  }

  #[inline(always)]
  pub fn input_type(&self) -> InputType {
    self.input_type
  }

  #[inline(always)]
  pub fn inference(&self) -> &Inference {
    &self.inference
  }

  #[inline(always)]
  pub fn age(&self) -> u32 {
    self.age
  }

  #[inline(always)]
  pub fn weight(&self) -> u32 {
    self.weight
  }

  #[inline(always)]
  pub fn store(&self) -> ClauseStore {
    self.store.get()
  }

  /// Containers are the only legal callers.
  pub(crate) fn set_store(&self, store: ClauseStore) {
    self.store.set(store);
  }

  /// Renders the clause against its bank, for diagnostics.
  pub fn to_string_with(&self, bank: &TermBank) -> String {
    if self.literals.is_empty() {
      return "⊥".to_string();
    }
    let rendered: Vec<String> = self.literals.iter().map(|&l| bank.literal_to_string(l)).collect();
    rendered.join(" | ")
  }
}
