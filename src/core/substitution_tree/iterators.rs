/*!

The retrieval iterators. One DFS skeleton serves all three retrieval relations; a mode
type supplies the two pure ingredients that differ:

 - `associate`: which substitution primitive reconciles the pending special variable
   with a node label (unification, or matching in one of the two directions), and
 - `children`: which children of a node are worth descending into, given what the
   pending special variable dereferences to.

The skeleton keeps a stack of child cursors, a parallel stack of per-node undo frames,
and the queue of pending special variables, popped highest first to mirror the split
discipline of insertion. Entering a node opens a backtrack scope on the substitution;
leaving it (on failure, exhaustion, or when the caller advances past a leaf) closes the
scope, restores the popped variable, and evicts the variables the label introduced. Each
emitted result carries an owned substitution snapshot, denormalized so its domain is the
caller's own query (and result) variables; dropping the iterator mid-run abandons the
search with nothing left to unwind.

*/

use std::{collections::BTreeSet, marker::PhantomData};

use crate::core::{
  renaming::Renaming,
  substitution::{Substitution, TermSpec, VarBank, VarSpec},
  term_bank::RcTermBank,
};
use crate::api::term::{Term, TermData, TermTop};

use super::node::{ChildMap, LeafData, Node};

/// What the pending special variable dereferences to on the query side.
pub(crate) enum QuerySide {
  Variable,
  Top(TermTop),
}

pub(crate) trait RetrievalMode {
  fn associate(subst: &mut Substitution, bank: &RcTermBank, special: u32, label: Term) -> bool;

  fn children<'t>(children: &'t ChildMap, query: &QuerySide) -> Vec<&'t Node>;
}

fn matching_then_variable_headed<'t>(children: &'t ChildMap, top: &TermTop) -> Vec<&'t Node> {
  let mut selected: Vec<&'t Node> = children.get(top).into_iter().collect();
  selected.extend(children.variable_headed());
  selected
}

pub(crate) struct UnificationsMode;

impl RetrievalMode for UnificationsMode {
  fn associate(subst: &mut Substitution, bank: &RcTermBank, special: u32, label: Term) -> bool {
    let query = bank.borrow_mut().special_variable(special);
    let borrowed = bank.borrow();
    subst.unify(
      &borrowed,
      TermSpec::new(VarBank::NormQuery, query),
      TermSpec::new(VarBank::NormResult, label),
    )
  }

  fn children<'t>(children: &'t ChildMap, query: &QuerySide) -> Vec<&'t Node> {
    match query {
      QuerySide::Variable  => children.all(),
      QuerySide::Top(top)  => matching_then_variable_headed(children, top),
    }
  }
}

pub(crate) struct GeneralizationsMode;

impl RetrievalMode for GeneralizationsMode {
  fn associate(subst: &mut Substitution, bank: &RcTermBank, special: u32, label: Term) -> bool {
    let query = bank.borrow_mut().special_variable(special);
    let borrowed = bank.borrow();
    // The node label is the pattern; the query side is rigid.
    subst.match_terms(
      &borrowed,
      TermSpec::new(VarBank::NormResult, label),
      TermSpec::new(VarBank::NormQuery, query),
    )
  }

  fn children<'t>(children: &'t ChildMap, query: &QuerySide) -> Vec<&'t Node> {
    match query {
      QuerySide::Variable  => children.variable_headed(),
      QuerySide::Top(top)  => matching_then_variable_headed(children, top),
    }
  }
}

pub(crate) struct InstancesMode;

impl RetrievalMode for InstancesMode {
  fn associate(subst: &mut Substitution, bank: &RcTermBank, special: u32, label: Term) -> bool {
    let query = bank.borrow_mut().special_variable(special);
    let borrowed = bank.borrow();
    // The query side is the pattern; indexed variables are rigid.
    subst.match_terms(
      &borrowed,
      TermSpec::new(VarBank::NormQuery, query),
      TermSpec::new(VarBank::NormResult, label),
    )
  }

  fn children<'t>(children: &'t ChildMap, query: &QuerySide) -> Vec<&'t Node> {
    match query {
      // An unbound query variable is a pattern variable here: it can bind to any label.
      QuerySide::Variable => children.all(),
      // A variable-headed label is rigid and can never match an application pattern.
      QuerySide::Top(top) => children.get(top).into_iter().collect(),
    }
  }
}

/// Undoes everything entering one node did.
#[derive(Default)]
struct EnterUndo {
  popped_special: Option<u32>,
  pushed_specials: Vec<u32>,
  pushed_cursor : bool,
  entered_leaf  : bool,
}

struct NodeCursor<'t> {
  nodes: Vec<&'t Node>,
  next : usize,
}

impl<'t> NodeCursor<'t> {
  fn exhausted(&self) -> bool {
    self.next >= self.nodes.len()
  }
}

struct LeafCursor<'t> {
  entries: &'t [LeafData],
  next   : usize,
}

pub(crate) struct RetrievalIter<'t, M: RetrievalMode> {
  bank           : RcTermBank,
  subst          : Substitution,
  query_renaming : Renaming,
  pending        : BTreeSet<u32>,
  cursors        : Vec<NodeCursor<'t>>,
  undo_stack     : Vec<EnterUndo>,
  leaf           : Option<LeafCursor<'t>>,
  _mode          : PhantomData<M>,
}

impl<'t, M: RetrievalMode> RetrievalIter<'t, M> {
  /// `args` are the normalized top-level arguments of the query; `query_renaming` maps
  /// the caller's variables to the normalized ones and is replayed into each emitted
  /// substitution.
  pub fn new(
    bank          : RcTermBank,
    roots         : Vec<&'t Node>,
    args          : &[Term],
    query_renaming: Renaming,
  ) -> RetrievalIter<'t, M> {
    let mut subst = Substitution::new();
    let mut pending = BTreeSet::new();
    for (position, &arg) in args.iter().enumerate() {
      let bound = subst.bind(
        VarSpec::special(position as u32),
        TermSpec::new(VarBank::NormQuery, arg),
      );
      debug_assert!(bound);
      pending.insert(position as u32);
    }

    RetrievalIter {
      bank,
      subst,
      query_renaming,
      pending,
      cursors   : vec![NodeCursor { nodes: roots, next: 0 }],
      undo_stack: Vec::new(),
      leaf      : None,
      _mode     : PhantomData,
    }
  }

  fn undo(&mut self, undo: EnterUndo) {
    self.subst.bd_backtrack();
    if undo.pushed_cursor {
      self.cursors.pop();
    }
    if undo.entered_leaf {
      self.leaf = None;
    }
    for special in undo.pushed_specials {
      self.pending.remove(&special);
    }
    if let Some(special) = undo.popped_special {
      self.pending.insert(special);
    }
  }

  /// Tries to establish `node` on the current path. On success the undo frame is
  /// pushed; on failure every effect is already rolled back.
  fn enter(&mut self, node: &'t Node) -> bool {
    let mut undo = EnterUndo::default();
    self.subst.bd_record();

    if let Some(label) = node.label() {
      let special = self
          .pending
          .pop_last()
          .expect("descent reached a labeled node with no pending special variable");
      undo.popped_special = Some(special);

      if !M::associate(&mut self.subst, &self.bank, special, label) {
        self.undo(undo);
        return false;
      }

      let introduced = self.bank.borrow().special_variables_of(label);
      for variable in introduced {
        if self.pending.insert(variable) {
          undo.pushed_specials.push(variable);
        }
      }
    }

    match node {
      Node::Leaf { entries, .. } => {
        self.leaf = Some(LeafCursor { entries: entries.as_slice(), next: 0 });
        undo.entered_leaf = true;
      }
      Node::Inner { children, .. } => {
        let next_special = *self
            .pending
            .last()
            .expect("inner node reached with no pending special variable");

        let query_side = {
          let borrowed = self.bank.borrow();
          match self.subst.deref_var(&borrowed, VarSpec::special(next_special)) {
            None => QuerySide::Variable,
            Some(spec) => match borrowed.data(spec.term) {
              TermData::Variable(_)                => QuerySide::Variable,
              TermData::Application { symbol, .. } => QuerySide::Top(TermTop::Functor(*symbol)),
            },
          }
        };

        self.cursors.push(NodeCursor { nodes: M::children(children, &query_side), next: 0 });
        undo.pushed_cursor = true;
      }
    }

    self.undo_stack.push(undo);
    true
  }

  /// Advances the DFS to the next leaf whose path satisfies `associate` throughout.
  fn find_next_leaf(&mut self) -> bool {
    debug_assert!(self.leaf.is_none());

    loop {
      while self.cursors.last().map_or(true, NodeCursor::exhausted) {
        if self.undo_stack.is_empty() {
          return false;
        }
        let undo = self.undo_stack.pop().unwrap();
        self.undo(undo);
      }

      let node = {
        let cursor = self.cursors.last_mut().unwrap();
        let node = cursor.nodes[cursor.next];
        cursor.next += 1;
        node
      };

      if self.enter(node) && self.leaf.is_some() {
        return true;
      }
    }
  }

  /// Packages one leaf entry: the live substitution is cloned and both normalizers are
  /// replayed into the caller-facing banks.
  fn emit(&mut self, entry: &'t LeafData) -> (&'t LeafData, Substitution) {
    let mut substitution = self.subst.clone();
    let mut result_renaming = Renaming::new();
    {
      let mut bank = self.bank.borrow_mut();
      if let Some(term) = entry.term {
        let _ = result_renaming.normalize_term(&mut bank, term);
      } else if let Some(literal) = entry.literal {
        let _ = result_renaming.normalize_literal(&mut bank, literal);
      }
      substitution.denormalize(&mut bank, &result_renaming, VarBank::NormResult, VarBank::Result);
      substitution.denormalize(&mut bank, &self.query_renaming, VarBank::NormQuery, VarBank::Query);
    }
    (entry, substitution)
  }
}

impl<'t, M: RetrievalMode> Iterator for RetrievalIter<'t, M> {
  type Item = (&'t LeafData, Substitution);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(cursor) = self.leaf.as_mut() {
        if cursor.next < cursor.entries.len() {
          let entries: &'t [LeafData] = cursor.entries;
          let entry = &entries[cursor.next];
          cursor.next += 1;
          return Some(self.emit(entry));
        }
        // Leave the exhausted leaf.
        let undo = self.undo_stack.pop().expect("leaf frame missing from the undo stack");
        self.undo(undo);
      }

      if !self.find_next_leaf() {
        return None;
      }
    }
  }
}
