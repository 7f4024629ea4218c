/*!

The acyclicity index detects term-algebra cycles: chains of active equalities like
`x = cons(a, y), y = cons(b, x)` that, composed through unifiers, make a term a strict
subterm of itself. That is impossible in a term algebra that forbids cyclic terms, so
such a chain is a refutation the saturation loop wants to find quickly.

A literal participates iff `matches_pattern` accepts it: a positive ground equality over
a non-cyclic term-algebra sort with exactly one constructor-headed side `f(s₁,…,sₖ)`,
whose other side `t` is not above the constructor side in the simplification ordering.
The index stores, per sort, an [`IndexEntry`] mapping the literal to its *consumer*
subterm `t` and *producer* subterms `s₁,…,sₖ` (the constructor side's same-sort
subterms), and keys a backing term substitution tree on the consumers.

Cycle search from a query literal is a depth-first search alternating two node kinds:
a *unification node* records a hit of some producer subterm against an indexed consumer,
and an *entry node* fans a matched literal back out through its own producers. Reaching
the query literal again closes a cycle; the result is rebuilt by walking the parent
chain. Reusing any literal along the current path is forbidden, which bounds the search
by the number of indexed literals and guarantees termination.

*/

use crate::{
  abstractions::HashMap,
  api::{
    clause::RcClause,
    index::TermIndex,
    literal::Literal,
    ordering::{OrderingResult, TermOrdering},
    sort::SortId,
    term::{Term, TermData},
  },
  core::{
    signature::RcSignature,
    substitution::Substitution,
    substitution_tree::TermSubstitutionTree,
    term_bank::RcTermBank,
  },
  debug,
};

/// One cycle found by [`AcyclicityIndex::query_cycles`]: the literals along the cycle,
/// their clauses, and the clauses under the cycle's composed substitution. The indexed
/// literals are ground, so the composed unifier only renames and the instantiated
/// clauses coincide with the premises.
pub struct CycleQueryResult {
  pub literals    : Vec<Literal>,
  pub premises    : Vec<RcClause>,
  pub instantiated: Vec<RcClause>,
}

impl CycleQueryResult {
  /// Total literal count across the premises.
  pub fn total_length_clauses(&self) -> usize {
    self.premises.iter().map(|clause| clause.len()).sum()
  }
}

struct IndexEntry {
  literal  : Literal,
  clause   : RcClause,
  /// The non-constructor side `t`.
  consumer : Term,
  /// The same-sort subterms reachable through constructors on the constructor side.
  producers: Vec<Term>,
}

pub struct AcyclicityIndex {
  bank        : RcTermBank,
  signature   : RcSignature,
  ordering    : Box<dyn TermOrdering>,
  sort_indexes: HashMap<SortId, HashMap<Literal, IndexEntry>>,
  tis         : TermSubstitutionTree,
}

impl AcyclicityIndex {
  pub fn new(bank: RcTermBank, ordering: Box<dyn TermOrdering>) -> AcyclicityIndex {
    let signature = bank.borrow().signature().clone();
    let tis = TermSubstitutionTree::new(bank.clone());
    AcyclicityIndex {
      bank,
      signature,
      ordering,
      sort_indexes: HashMap::new(),
      tis,
    }
  }

  /// Maintains the index from the clause container events, over the clause's selected
  /// literals.
  pub fn handle_clause(&mut self, clause: &RcClause, adding: bool) {
    for literal in clause.selected_literals() {
      if adding {
        self.insert(literal, clause);
      } else {
        self.remove(literal, clause);
      }
    }
  }

  /// A no-op for literals that do not match the pattern; idempotent per literal.
  pub fn insert(&mut self, literal: Literal, clause: &RcClause) {
    let Some((constructor_side, consumer, sort)) = self.matches_pattern(literal) else {
      return;
    };

    let already_indexed = self
        .sort_indexes
        .get(&sort)
        .map_or(false, |entries| entries.contains_key(&literal));
    if already_indexed {
      return;
    }

    debug!(3, "acyclicity index accepted a constructor equality");
    let producers = self.producer_subterms(constructor_side, sort);
    self.sort_indexes.entry(sort).or_default().insert(
      literal,
      IndexEntry { literal, clause: clause.clone(), consumer, producers },
    );
    self.tis.insert_for_literal(consumer, Some(literal), clause);
  }

  pub fn remove(&mut self, literal: Literal, clause: &RcClause) {
    let Some((_, consumer, sort)) = self.matches_pattern(literal) else {
      return;
    };

    let removed = match self.sort_indexes.get_mut(&sort) {
      Some(index) => index.remove(&literal).is_some(),
      None        => false,
    };
    if removed {
      // The backing term index is kept exact so no stale consumer can resurface in a
      // later cycle query.
      self.tis.remove_for_literal(consumer, Some(literal), clause);
    }
  }

  /// Accepts `literal` iff it is a positive ground equality over a non-cyclic
  /// term-algebra sort with exactly one constructor-headed side that is not below the
  /// other side in the ordering. Returns (constructor side, consumer side, sort).
  fn matches_pattern(&self, literal: Literal) -> Option<(Term, Term, SortId)> {
    let bank = self.bank.borrow();
    let signature = self.signature.borrow();

    let data = bank.literal_data(literal);
    if !signature.symbol(data.predicate).is_equality()
        || !data.polarity
        || !bank.literal_ground(literal)
    {
      return None;
    }

    let left = data.args[0];
    let right = data.args[1];

    let sort = signature.sort_of_term(&bank, left)?;
    if !signature.is_term_algebra_sort(sort) || signature.allows_cyclic_terms(sort) {
      return None;
    }

    let constructor_headed = |term: Term| match bank.data(term) {
      TermData::Application { symbol, .. } => signature.is_constructor(*symbol),
      TermData::Variable(_)                => false,
    };

    let (constructor_side, consumer) = match (constructor_headed(left), constructor_headed(right)) {
      (true, false) => (left, right),
      (false, true) => (right, left),
      _             => return None,
    };

    match self.ordering.compare(&bank, consumer, constructor_side) {
      OrderingResult::Greater | OrderingResult::Equal => None,
      OrderingResult::Less | OrderingResult::Incomparable => {
        Some((constructor_side, consumer, sort))
      }
    }
  }

  /// The subterms of the constructor side with the equality's sort, walking through
  /// nested constructor applications.
  fn producer_subterms(&self, constructor_side: Term, sort: SortId) -> Vec<Term> {
    let bank = self.bank.borrow();
    let signature = self.signature.borrow();

    let mut producers = Vec::new();
    let mut to_visit = vec![constructor_side];
    while let Some(term) = to_visit.pop() {
      let TermData::Application { symbol, args } = bank.data(term) else {
        continue;
      };
      // Below the top, only constructor applications are traversed.
      if term != constructor_side && !signature.is_constructor(*symbol) {
        continue;
      }
      let arg_sorts = &signature.symbol(*symbol).arg_sorts;
      for (&arg, &arg_sort) in args.iter().zip(arg_sorts.iter()) {
        if arg_sort == sort {
          producers.push(arg);
          to_visit.push(arg);
        }
      }
    }
    producers
  }

  /// All cycles through the indexed literals that start and end at `literal`.
  pub fn query_cycles(&self, literal: Literal, _clause: &RcClause) -> CycleSearchIterator<'_> {
    CycleSearchIterator::new(self, literal)
  }
}

/// A node of the cycle-search tree. A *unification* node carries the substitution of one
/// term-index hit and awaits expansion through the matched literal's entry; an *entry*
/// node carries one producer subterm of a matched literal.
struct SearchNode {
  literal: Literal,
  clause : Option<RcClause>,
  term   : Option<Term>,
  subst  : Option<Substitution>,
  parent : Option<usize>,
}

impl SearchNode {
  fn is_unification_node(&self) -> bool {
    self.clause.is_none()
  }
}

pub struct CycleSearchIterator<'a> {
  index      : &'a AcyclicityIndex,
  query      : Literal,
  sort       : Option<SortId>,
  /// Parent chains stay alive for result reconstruction, so nodes live in an arena and
  /// the DFS stack holds indices into it.
  nodes      : Vec<SearchNode>,
  stack      : Vec<usize>,
}

impl<'a> CycleSearchIterator<'a> {
  fn new(index: &'a AcyclicityIndex, query: Literal) -> CycleSearchIterator<'a> {
    let mut iterator = CycleSearchIterator {
      index,
      query,
      sort : None,
      nodes: Vec::new(),
      stack: Vec::new(),
    };

    let Some((_, _, sort)) = index.matches_pattern(query) else {
      return iterator;
    };
    iterator.sort = Some(sort);

    let producers = match index.sort_indexes.get(&sort).and_then(|entries| entries.get(&query)) {
      Some(entry) => entry.producers.clone(),
      None        => return iterator,
    };
    for producer in producers {
      iterator.push_unifications(producer, None);
    }
    iterator
  }

  fn entries(&self) -> Option<&HashMap<Literal, IndexEntry>> {
    self.index.sort_indexes.get(&self.sort?)
  }

  /// Is `literal` absent from the parent chain starting at `parent`?
  fn not_in_ancestors(&self, parent: Option<usize>, literal: Literal) -> bool {
    let mut current = parent;
    while let Some(node_index) = current {
      let node = &self.nodes[node_index];
      if node.literal == literal {
        return false;
      }
      current = node.parent;
    }
    true
  }

  /// Pushes one unification node per term-index hit of `term`, skipping literals
  /// already on the path.
  fn push_unifications(&mut self, term: Term, parent: Option<usize>) {
    let hits: Vec<(Literal, Substitution)> = self
        .index
        .tis
        .get_unifications(term)
        .filter_map(|result| result.literal.map(|l| (l, result.substitution)))
        .collect();

    for (literal, substitution) in hits {
      if self.not_in_ancestors(parent, literal) {
        self.nodes.push(SearchNode {
          literal,
          clause: None,
          term  : None,
          subst : Some(substitution),
          parent,
        });
        self.stack.push(self.nodes.len() - 1);
      }
    }
  }

  /// Rebuilds the cycle by walking the parent chain from a closing entry node,
  /// alternating entry and unification nodes.
  fn result_from_node(&self, node_index: usize) -> CycleQueryResult {
    let mut literals = Vec::new();
    let mut premises = Vec::new();
    let mut instantiated = Vec::new();

    let mut current = Some(node_index);
    while let Some(entry_index) = current {
      let entry_node = &self.nodes[entry_index];
      debug_assert!(!entry_node.is_unification_node());

      let clause = entry_node.clause.clone().expect("entry node without a clause");
      literals.push(entry_node.literal);
      premises.push(clause.clone());
      // Ground pattern literals make the composed unifier a renaming; the instantiated
      // clause is the premise itself.
      instantiated.push(clause);

      let unification_index = entry_node.parent.expect("entry node without a unification parent");
      current = self.nodes[unification_index].parent;
    }

    debug!(3, "acyclicity cycle of length {} found", literals.len());
    CycleQueryResult { literals, premises, instantiated }
  }
}

impl<'a> Iterator for CycleSearchIterator<'a> {
  type Item = CycleQueryResult;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(node_index) = self.stack.pop() {
      let node = &self.nodes[node_index];

      if node.is_unification_node() {
        // Fan the matched literal out through its own producers.
        let Some(entry) = self.entries().and_then(|entries| entries.get(&node.literal)) else {
          continue;
        };
        let (literal, clause) = (entry.literal, entry.clause.clone());
        let producers = entry.producers.clone();
        for producer in producers {
          self.nodes.push(SearchNode {
            literal,
            clause: Some(clause.clone()),
            term  : Some(producer),
            subst : None,
            parent: Some(node_index),
          });
          self.stack.push(self.nodes.len() - 1);
        }
      } else if node.literal == self.query {
        return Some(self.result_from_node(node_index));
      } else {
        let parent_index = node.parent.expect("entry node without a unification parent");
        let producer = node.term.expect("entry node without a producer term");

        // Continue from the producer as instantiated by the unifier that got us here.
        let instantiated = {
          let mut parent_subst = self.nodes[parent_index]
              .subst
              .clone()
              .expect("unification node without a substitution");
          let mut bank = self.index.bank.borrow_mut();
          parent_subst.apply_to_result(&mut bank, producer)
        };
        self.push_unifications(instantiated, Some(node_index));
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::{
    abstractions::rc_cell,
    api::{
      clause::{Clause, Inference, InputType},
      ordering::OrderingResult,
      symbol::{SymbolAttribute, SymbolId},
    },
    core::{
      containers::ActiveClauseContainer,
      signature::Signature,
      term_bank::TermBank,
    },
  };
  use super::*;

  /// Deterministic stand-in for the prover's simplification ordering: compares cached
  /// weights, leaving distinct same-weight terms incomparable.
  struct WeightStubOrdering;

  impl TermOrdering for WeightStubOrdering {
    fn compare(&self, bank: &TermBank, left: Term, right: Term) -> OrderingResult {
      if left == right {
        return OrderingResult::Equal;
      }
      match bank.weight(left).cmp(&bank.weight(right)) {
        std::cmp::Ordering::Less    => OrderingResult::Less,
        std::cmp::Ordering::Greater => OrderingResult::Greater,
        std::cmp::Ordering::Equal   => OrderingResult::Incomparable,
      }
    }
  }

  struct Fix {
    bank: RcTermBank,
    cons: SymbolId,
    nil : SymbolId,
    tail: SymbolId,
    a   : SymbolId,
    b   : SymbolId,
    lc  : SymbolId, // Skolem constant L of sort List
    xc  : SymbolId, // Skolem constant x of sort List
    yc  : SymbolId, // Skolem constant y of sort List
  }

  fn fix(allows_cyclic: bool) -> Fix {
    let signature = Signature::new();
    let (cons, nil, tail, a, b, lc, xc, yc) = {
      let mut sig = signature.borrow_mut();
      let elem = sig.declare_sort("Elem".into());
      let list = sig.declare_sort("List".into());
      let cons = sig
          .declare_function("cons".into(), vec![elem, list], list, SymbolAttribute::Constructor.into())
          .unwrap();
      let nil = sig
          .declare_function("nil".into(), vec![], list, SymbolAttribute::Constructor.into())
          .unwrap();
      let tail = sig.declare_function("tail".into(), vec![list], list, Default::default()).unwrap();
      let a = sig.declare_function("a".into(), vec![], elem, Default::default()).unwrap();
      let b = sig.declare_function("b".into(), vec![], elem, Default::default()).unwrap();
      let lc = sig.declare_function("L".into(), vec![], list, SymbolAttribute::Skolem.into()).unwrap();
      let xc = sig.declare_function("x".into(), vec![], list, SymbolAttribute::Skolem.into()).unwrap();
      let yc = sig.declare_function("y".into(), vec![], list, SymbolAttribute::Skolem.into()).unwrap();
      sig.declare_term_algebra(list, vec![cons, nil], allows_cyclic).unwrap();
      (cons, nil, tail, a, b, lc, xc, yc)
    };
    Fix { bank: rc_cell(TermBank::new(signature)), cons, nil, tail, a, b, lc, xc, yc }
  }

  fn index(fix: &Fix) -> AcyclicityIndex {
    AcyclicityIndex::new(fix.bank.clone(), Box::new(WeightStubOrdering))
  }

  fn unit_clause(fix: &Fix, literal: Literal) -> RcClause {
    Clause::new(&fix.bank.borrow(), vec![literal], InputType::Axiom, Inference::input())
  }

  #[test]
  fn single_literal_cycle() {
    let fix = fix(false);
    // L = cons(a, L), as the ground pattern literal.
    let literal = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cl = bank.constant(fix.lc);
      let cons_al = bank.application(fix.cons, vec![ca, cl]);
      bank.equality(true, cl, cons_al)
    };
    let clause = unit_clause(&fix, literal);

    let mut index = index(&fix);
    index.handle_clause(&clause, true);
    // Idempotent per literal.
    index.insert(literal, &clause);

    let cycles: Vec<CycleQueryResult> = index.query_cycles(literal, &clause).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].literals, vec![literal]);
    assert_eq!(cycles[0].premises.len(), 1);
    assert_eq!(cycles[0].premises[0].number(), clause.number());
    assert_eq!(cycles[0].instantiated.len(), 1);
    assert_eq!(cycles[0].total_length_clauses(), 1);
  }

  #[test]
  fn two_literal_cycle() {
    let fix = fix(false);
    let (lit_1, lit_2) = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cb = bank.constant(fix.b);
      let cx = bank.constant(fix.xc);
      let cy = bank.constant(fix.yc);
      // L₁: cons(a, x) = y    L₂: cons(b, y) = x
      let cons_ax = bank.application(fix.cons, vec![ca, cx]);
      let cons_by = bank.application(fix.cons, vec![cb, cy]);
      (bank.equality(true, cons_ax, cy), bank.equality(true, cons_by, cx))
    };
    let clause_1 = unit_clause(&fix, lit_1);
    let clause_2 = unit_clause(&fix, lit_2);

    let mut index = index(&fix);
    index.handle_clause(&clause_1, true);
    index.handle_clause(&clause_2, true);

    let cycles: Vec<CycleQueryResult> = index.query_cycles(lit_1, &clause_1).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].literals, vec![lit_1, lit_2]);
    assert_eq!(
      cycles[0].premises.iter().map(|c| c.number()).collect::<Vec<_>>(),
      vec![clause_1.number(), clause_2.number()]
    );
    assert_eq!(cycles[0].total_length_clauses(), 2);
  }

  #[test]
  fn removal_leaves_no_ghost_cycles() {
    let fix = fix(false);
    let (lit_1, lit_2) = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cb = bank.constant(fix.b);
      let cx = bank.constant(fix.xc);
      let cy = bank.constant(fix.yc);
      let cons_ax = bank.application(fix.cons, vec![ca, cx]);
      let cons_by = bank.application(fix.cons, vec![cb, cy]);
      (bank.equality(true, cons_ax, cy), bank.equality(true, cons_by, cx))
    };
    let clause_1 = unit_clause(&fix, lit_1);
    let clause_2 = unit_clause(&fix, lit_2);

    let mut index = index(&fix);
    index.handle_clause(&clause_1, true);
    index.handle_clause(&clause_2, true);
    index.handle_clause(&clause_2, false);

    assert!(index.query_cycles(lit_1, &clause_1).next().is_none());
    // The backing term index holds exactly the one surviving consumer.
    assert!(!index.tis.is_empty());
    index.handle_clause(&clause_1, false);
    assert!(index.tis.is_empty());
  }

  #[test]
  fn pattern_rejection_is_silent() {
    let fix = fix(false);
    let mut acyclicity = index(&fix);

    let (negative, non_ground, both_cons, heavy_consumer) = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cl = bank.constant(fix.lc);
      let cons_al = bank.application(fix.cons, vec![ca, cl]);

      let negative = bank.equality(false, cl, cons_al);

      let v = bank.variable(0);
      let cons_av = bank.application(fix.cons, vec![ca, v]);
      let non_ground = bank.equality(true, cl, cons_av);

      let cnil = bank.constant(fix.nil);
      let cons_anil = bank.application(fix.cons, vec![ca, cnil]);
      let both_cons = bank.equality(true, cnil, cons_anil);

      // tail(tail(tail(L))) outweighs cons(a, L): the ordering rejects it.
      let t1 = bank.application(fix.tail, vec![cl]);
      let t2 = bank.application(fix.tail, vec![t1]);
      let t3 = bank.application(fix.tail, vec![t2]);
      let heavy_consumer = bank.equality(true, t3, cons_al);

      (negative, non_ground, both_cons, heavy_consumer)
    };

    for literal in [negative, non_ground, both_cons, heavy_consumer] {
      let clause = unit_clause(&fix, literal);
      acyclicity.insert(literal, &clause);
      assert!(acyclicity.tis.is_empty(), "pattern should have been rejected");
      // Removal of a rejected literal is equally silent.
      acyclicity.remove(literal, &clause);
    }
  }

  #[test]
  fn cyclic_sorts_are_ignored() {
    let fix = fix(true);
    let literal = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cl = bank.constant(fix.lc);
      let cons_al = bank.application(fix.cons, vec![ca, cl]);
      bank.equality(true, cl, cons_al)
    };
    let clause = unit_clause(&fix, literal);

    let mut index = index(&fix);
    index.insert(literal, &clause);
    assert!(index.query_cycles(literal, &clause).next().is_none());
  }

  #[test]
  fn container_events_drive_the_index() {
    let fix = fix(false);
    let literal = {
      let mut bank = fix.bank.borrow_mut();
      let ca = bank.constant(fix.a);
      let cl = bank.constant(fix.lc);
      let cons_al = bank.application(fix.cons, vec![ca, cl]);
      bank.equality(true, cl, cons_al)
    };
    let clause = unit_clause(&fix, literal);

    let acyclicity = Rc::new(RefCell::new(index(&fix)));
    let mut active = ActiveClauseContainer::new();

    let _on_added = {
      let acyclicity = acyclicity.clone();
      active.added_event.subscribe(Box::new(move |c| acyclicity.borrow_mut().handle_clause(c, true)))
    };
    let _on_removed = {
      let acyclicity = acyclicity.clone();
      active.removed_event.subscribe(Box::new(move |c| acyclicity.borrow_mut().handle_clause(c, false)))
    };

    active.add(clause.clone());
    assert_eq!(acyclicity.borrow().query_cycles(literal, &clause).count(), 1);

    active.remove(&clause);
    assert!(acyclicity.borrow().query_cycles(literal, &clause).next().is_none());
  }
}
