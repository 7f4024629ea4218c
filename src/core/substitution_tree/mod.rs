/*!

Substitution-tree indexing.

A substitution tree discriminates on a serialized traversal of term structure. Keys are
normalized (variables renumbered by first occurrence) and decomposed into a queue of
bindings *special variable ↦ subterm*; descent consumes the queue highest-numbered
variable first. Where two keys disagree below a shared prefix, the disagreeing position
is replaced by a fresh special variable and the old content is pushed down one level (a
*split*), so along any root-to-leaf path the labels, read under the path's
special-variable bindings, reconstruct exactly the inserted keys.

The split discipline and the descent order have to agree. Each later split stacks its
replacement node above the earlier one, which puts the value of the newest special
variable highest on the path; popping the highest-numbered pending variable first is what
keeps every child of a node associated with the same variable. Both the insertion queue
and the retrieval iterator's pending-variable queue honor this.

[`LiteralSubstitutionTree`] and [`TermSubstitutionTree`] wrap the shared core with the
root-table keying each flavor needs: literal roots are (predicate, polarity) pairs
(complemented on demand for resolvent-style queries) and term roots are top functors.

*/

mod iterators;
mod node;

use std::collections::BTreeMap;

use crate::{
  abstractions::HashMap,
  api::{
    clause::RcClause,
    index::{LiteralIndex, LiteralQueryResult, TermIndex, TermQueryResult},
    literal::Literal,
    symbol::SymbolId,
    term::{Term, TermData, VarKind, Variable},
  },
  core::{
    renaming::Renaming,
    term_bank::RcTermBank,
  },
  debug,
};

use iterators::{GeneralizationsMode, InstancesMode, RetrievalIter, UnificationsMode};
use node::{LeafData, Node};

/// Bindings pending along a descent, popped highest variable first.
type BindingQueue = BTreeMap<u32, Term>;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum RootKey {
  Predicate { symbol: SymbolId, positive: bool },
  Functor(SymbolId),
}

pub(crate) struct SubstitutionTree {
  bank        : RcTermBank,
  roots       : HashMap<RootKey, Node>,
  /// Fresh special-variable allocator; monotonic for the tree's lifetime.
  next_special: u32,
}

impl SubstitutionTree {
  pub fn new(bank: RcTermBank) -> SubstitutionTree {
    SubstitutionTree {
      bank,
      roots       : HashMap::new(),
      next_special: 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.roots.is_empty()
  }

  fn root(&self, key: &RootKey) -> Option<&Node> {
    self.roots.get(key)
  }

  fn all_roots(&self) -> Vec<&Node> {
    self.roots.values().collect()
  }

  fn binding_queue(args: &[Term]) -> BindingQueue {
    args.iter().enumerate().map(|(i, &a)| (i as u32, a)).collect()
  }

  // region Insertion

  /// `args` are the normalized top-level arguments of the key.
  pub(crate) fn insert_entry(&mut self, key: RootKey, args: &[Term], entry: LeafData) {
    // Argument positions and split variables share the special-variable namespace.
    if self.next_special < args.len() as u32 {
      self.next_special = args.len() as u32;
    }

    let queue = Self::binding_queue(args);
    let root = self.roots.entry(key).or_insert_with(|| {
      if args.is_empty() { Node::empty_leaf() } else { Node::empty_inner() }
    });
    Self::insert_at(&self.bank, &mut self.next_special, root, queue, entry);
  }

  fn insert_at(
    bank        : &RcTermBank,
    next_special: &mut u32,
    mut node    : &mut Node,
    mut queue   : BindingQueue,
    entry       : LeafData,
  ) {
    if queue.is_empty() {
      node.insert_entry(entry);
      return;
    }

    loop {
      let (_, term) = queue.pop_last().expect("binding queue exhausted at an inner node");
      let top = bank.borrow().top(term);

      if node.children().get(&top).is_none() {
        // Nothing shares this top: grow a fresh chain down to a leaf.
        let chain = Self::build_chain(bank, term, queue, entry);
        node.children_mut().insert(top, chain);
        return;
      }

      let label = node
          .children()
          .get(&top)
          .unwrap()
          .label()
          .expect("non-root node without a label");

      if label == term {
        if queue.is_empty() {
          node.children_mut().get_mut(&top).unwrap().insert_entry(entry);
          return;
        }
        node = node.children_mut().get_mut(&top).unwrap();
        continue;
      }

      // The child's label and the inserted term share a top but differ below it.
      let (new_label, demotions, new_bindings) =
          Self::disagreement(bank, next_special, label, term);
      for (variable, subterm) in new_bindings {
        let previous = queue.insert(variable, subterm);
        debug_assert!(previous.is_none(), "special variable bound twice along one insertion");
      }

      if !demotions.is_empty() {
        debug!(3, "substitution tree split introducing {} disagreement point(s)", demotions.len());
        let children = node.children_mut();
        let mut stacked = children.remove(&top);
        stacked.set_label(Some(demotions[0]));
        for &demoted in demotions[1..].iter() {
          let child_top = bank.borrow().top(stacked.label().unwrap());
          stacked = Node::inner_with_child(Some(demoted), child_top, stacked);
        }
        let child_top = bank.borrow().top(stacked.label().unwrap());
        children.insert(top, Node::inner_with_child(Some(new_label), child_top, stacked));
      }

      node = node.children_mut().get_mut(&top).unwrap();
    }
  }

  /// Consumes the remaining queue into a fresh path terminated by a leaf holding
  /// `entry`.
  fn build_chain(bank: &RcTermBank, first: Term, mut queue: BindingQueue, entry: LeafData) -> Node {
    let mut labels = vec![first];
    while let Some((_, term)) = queue.pop_last() {
      labels.push(term);
    }

    let leaf_label = labels.pop().unwrap();
    let mut chain = Node::leaf_with(Some(leaf_label), entry);
    for &label in labels.iter().rev() {
      let child_top = bank.borrow().top(chain.label().unwrap());
      chain = Node::inner_with_child(Some(label), child_top, chain);
    }
    chain
  }

  /// Computes the replacement label for a child whose label `s` disagrees with the
  /// inserted term `t` below a shared top. Positions where `s` already holds a special
  /// variable only queue a binding; positions with genuinely different tops allocate a
  /// fresh special variable, queue the binding for `t`'s side, and record `s`'s old
  /// subterm for demotion (in discovery order, which is also allocation order).
  fn disagreement(
    bank        : &RcTermBank,
    next_special: &mut u32,
    s           : Term,
    t           : Term,
  ) -> (Term, Vec<Term>, Vec<(u32, Term)>) {
    let mut demotions = Vec::new();
    let mut bindings  = Vec::new();
    let new_label = Self::disagreement_walk(bank, next_special, s, t, &mut demotions, &mut bindings);
    (new_label, demotions, bindings)
  }

  fn disagreement_walk(
    bank        : &RcTermBank,
    next_special: &mut u32,
    s           : Term,
    t           : Term,
    demotions   : &mut Vec<Term>,
    bindings    : &mut Vec<(u32, Term)>,
  ) -> Term {
    if s == t {
      return s;
    }

    let s_data = bank.borrow().data(s).clone();

    // An existing disagreement point absorbs the new subterm.
    if let TermData::Variable(Variable { kind: VarKind::Special, index }) = s_data {
      bindings.push((index, t));
      return s;
    }

    let same_top = {
      let borrowed = bank.borrow();
      match (&s_data, borrowed.data(t)) {
        (
          TermData::Application { symbol: f, .. },
          TermData::Application { symbol: g, .. },
        ) => f == g,
        _ => false,
      }
    };

    if same_top {
      let (symbol, s_args) = match s_data {
        TermData::Application { symbol, args } => (symbol, args),
        _ => unreachable!(),
      };
      let t_args = match bank.borrow().data(t) {
        TermData::Application { args, .. } => args.clone(),
        _ => unreachable!(),
      };

      let merged: Vec<Term> = s_args
          .iter()
          .zip(t_args.iter())
          .map(|(&x, &y)| Self::disagreement_walk(bank, next_special, x, y, demotions, bindings))
          .collect();
      bank.borrow_mut().application(symbol, merged)
    } else {
      let fresh = *next_special;
      *next_special += 1;
      demotions.push(s);
      bindings.push((fresh, t));
      bank.borrow_mut().special_variable(fresh)
    }
  }

  // endregion

  // region Removal

  /// Same descent as insertion without restructuring. Removing a key that was never
  /// inserted is a programmer error and panics.
  pub(crate) fn remove_entry(&mut self, key: RootKey, args: &[Term], entry: &LeafData) {
    let root = self
        .roots
        .get_mut(&key)
        .expect("removal from a root that was never populated");

    let queue = Self::binding_queue(args);
    if Self::remove_at(&self.bank, root, queue, entry) {
      debug!(3, "substitution tree root emptied by removal");
      self.roots.remove(&key);
    }
  }

  /// Returns whether `node` became empty and should be unlinked by its parent.
  fn remove_at(bank: &RcTermBank, node: &mut Node, mut queue: BindingQueue, entry: &LeafData) -> bool {
    match node {
      Node::Leaf { entries, .. } => {
        assert!(queue.is_empty(), "binding queue not exhausted at a leaf");
        let position = entries
            .iter()
            .position(|existing| existing == entry)
            .expect("removal of an entry that was never inserted");
        entries.remove(position);
        entries.is_empty()
      }

      Node::Inner { children, .. } => {
        let (_, term) = queue.pop_last().expect("binding queue exhausted at an inner node");
        // The child's key is computed from the descent term before any unlinking.
        let top = bank.borrow().top(term);
        let child = children
            .get_mut(&top)
            .expect("removal descent found no child for the key");

        let label = child.label().expect("non-root node without a label");
        if label != term {
          Self::collect_bindings(bank, label, term, &mut queue);
        }

        if Self::remove_at(bank, child, queue, entry) {
          let _ = children.remove(&top);
        }
        children.is_empty()
      }
    }
  }

  /// Maps the special variables of `label` to the corresponding subterms of `term`.
  /// Any other disagreement means the key was never inserted here.
  fn collect_bindings(bank: &RcTermBank, label: Term, term: Term, queue: &mut BindingQueue) {
    if label == term {
      return;
    }

    let label_data = bank.borrow().data(label).clone();
    match label_data {
      TermData::Variable(variable) => {
        assert!(
          variable.kind == VarKind::Special,
          "removal descent disagrees with the tree at an ordinary variable"
        );
        queue.insert(variable.index, term);
      }

      TermData::Application { symbol, args } => {
        let term_args = match bank.borrow().data(term) {
          TermData::Application { symbol: term_symbol, args } => {
            assert!(
              *term_symbol == symbol,
              "removal descent disagrees with the tree at a functor"
            );
            args.clone()
          }
          TermData::Variable(_) => {
            panic!("removal descent found a variable where the tree holds an application")
          }
        };

        for (&l, &t) in args.iter().zip(term_args.iter()) {
          Self::collect_bindings(bank, l, t, queue);
        }
      }
    }
  }

  // endregion
}

// region Literal index

/// A substitution tree over literals, rooted per (predicate, polarity).
pub struct LiteralSubstitutionTree {
  tree: SubstitutionTree,
}

impl LiteralSubstitutionTree {
  pub fn new(bank: RcTermBank) -> LiteralSubstitutionTree {
    LiteralSubstitutionTree { tree: SubstitutionTree::new(bank) }
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  fn key_and_args(&self, literal: Literal, complement: bool) -> (RootKey, Vec<Term>, Renaming) {
    let mut bank = self.tree.bank.borrow_mut();
    let data = bank.literal_data(literal).clone();

    let mut renaming = Renaming::new();
    let args: Vec<Term> = data
        .args
        .iter()
        .map(|&arg| renaming.normalize_term(&mut bank, arg))
        .collect();

    let key = RootKey::Predicate {
      symbol  : data.predicate,
      positive: data.polarity != complement,
    };
    (key, args, renaming)
  }

  fn retrieve<'a, M: iterators::RetrievalMode + 'a>(
    &'a self,
    query        : Literal,
    complementary: bool,
  ) -> Box<dyn Iterator<Item = LiteralQueryResult> + 'a> {
    let (key, args, renaming) = self.key_and_args(query, complementary);
    let roots: Vec<&Node> = self.tree.root(&key).into_iter().collect();

    Box::new(
      RetrievalIter::<M>::new(self.tree.bank.clone(), roots, &args, renaming).map(
        |(entry, substitution)| LiteralQueryResult {
          literal: entry.literal.expect("literal index leaf without a literal payload"),
          clause : entry.clause.clone(),
          substitution,
        },
      ),
    )
  }
}

impl LiteralIndex for LiteralSubstitutionTree {
  fn insert(&mut self, literal: Literal, clause: &RcClause) {
    let (key, args, _) = self.key_and_args(literal, false);
    self.tree.insert_entry(
      key,
      &args,
      LeafData { clause: clause.clone(), literal: Some(literal), term: None },
    );
  }

  fn remove(&mut self, literal: Literal, clause: &RcClause) {
    let (key, args, _) = self.key_and_args(literal, false);
    self.tree.remove_entry(
      key,
      &args,
      &LeafData { clause: clause.clone(), literal: Some(literal), term: None },
    );
  }

  fn get_unifications(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>
  {
    self.retrieve::<UnificationsMode>(query, complementary)
  }

  fn get_generalizations(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>
  {
    self.retrieve::<GeneralizationsMode>(query, complementary)
  }

  fn get_instances(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>
  {
    self.retrieve::<InstancesMode>(query, complementary)
  }
}

// endregion

// region Term index

/// A substitution tree over terms, rooted per top functor. The whole (normalized) term
/// is the single initial binding; discrimination below the root comes from splits.
pub struct TermSubstitutionTree {
  tree: SubstitutionTree,
}

impl TermSubstitutionTree {
  pub fn new(bank: RcTermBank) -> TermSubstitutionTree {
    TermSubstitutionTree { tree: SubstitutionTree::new(bank) }
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  /// Inserts a term recording the literal it occurs in, which term retrieval reports
  /// back. Variable keys are not indexable: the root table discriminates on a functor.
  pub fn insert_for_literal(&mut self, term: Term, literal: Option<Literal>, clause: &RcClause) {
    let (key, args, _) = self.key_and_args(term);
    let key = key.expect("a variable cannot be inserted into a term index");
    self.tree.insert_entry(
      key,
      &args,
      LeafData { clause: clause.clone(), literal, term: Some(term) },
    );
  }

  pub fn remove_for_literal(&mut self, term: Term, literal: Option<Literal>, clause: &RcClause) {
    let (key, args, _) = self.key_and_args(term);
    let key = key.expect("a variable cannot be removed from a term index");
    self.tree.remove_entry(
      key,
      &args,
      &LeafData { clause: clause.clone(), literal, term: Some(term) },
    );
  }

  fn key_and_args(&self, term: Term) -> (Option<RootKey>, Vec<Term>, Renaming) {
    let mut bank = self.tree.bank.borrow_mut();
    let mut renaming = Renaming::new();
    let normalized = renaming.normalize_term(&mut bank, term);

    let key = match bank.data(term) {
      TermData::Application { symbol, .. } => Some(RootKey::Functor(*symbol)),
      TermData::Variable(_)                => None,
    };
    (key, vec![normalized], renaming)
  }

  fn retrieve<'a, M: iterators::RetrievalMode + 'a>(
    &'a self,
    query        : Term,
    var_query_roots: bool,
  ) -> Box<dyn Iterator<Item = TermQueryResult> + 'a> {
    let (key, args, renaming) = self.key_and_args(query);
    let roots: Vec<&Node> = match key {
      Some(key) => self.tree.root(&key).into_iter().collect(),
      // A variable query reaches every root in unification/instance mode and none in
      // generalization mode (no variable is ever a key).
      None if var_query_roots => self.tree.all_roots(),
      None                    => Vec::new(),
    };

    Box::new(
      RetrievalIter::<M>::new(self.tree.bank.clone(), roots, &args, renaming).map(
        |(entry, substitution)| TermQueryResult {
          term   : entry.term.expect("term index leaf without a term payload"),
          literal: entry.literal,
          clause : entry.clause.clone(),
          substitution,
        },
      ),
    )
  }
}

impl TermIndex for TermSubstitutionTree {
  fn insert(&mut self, term: Term, clause: &RcClause) {
    self.insert_for_literal(term, None, clause);
  }

  fn remove(&mut self, term: Term, clause: &RcClause) {
    self.remove_for_literal(term, None, clause);
  }

  fn get_unifications(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_> {
    self.retrieve::<UnificationsMode>(query, true)
  }

  fn get_generalizations(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_> {
    self.retrieve::<GeneralizationsMode>(query, false)
  }

  fn get_instances(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_> {
    self.retrieve::<InstancesMode>(query, true)
  }
}

// endregion
