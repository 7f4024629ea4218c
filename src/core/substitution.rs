/*!

A bank-aware, backtrackable binding environment.

During retrieval the same variable index means different things on different sides of the
query: the caller's query variables, the indexed result's variables, and the normalized
forms of each live in separate *banks*, and special variables (disagreement markers
introduced by the substitution tree) have a bank of their own. A binding maps a
[`VarSpec`], a (bank, index) pair, to a [`TermSpec`], a term id together with the bank in
which that term's ordinary variables are to be interpreted. Keeping the banks apart is
what prevents accidental capture between a query and a result that happen to use the same
variable numbers.

Mutation is journaled: `bd_record` opens a backtrack scope, `bd_backtrack` closes it and
undoes every binding made since, and `bd_done` closes it keeping the bindings (they then
belong to the enclosing scope). Scopes are strict LIFO; the journal is a vector of bound
variable specs with a scope-marker stack, so after a backtrack the substitution is
exactly what it was at the matching `bd_record`.

*/

use crate::{
  abstractions::HashMap,
  api::{
    literal::Literal,
    term::{Term, TermData, VarKind, Variable},
  },
  core::{
    renaming::Renaming,
    term_bank::TermBank,
  },
};

/// Which side of a retrieval a variable belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VarBank {
  /// The caller's query, in its original variables.
  Query,
  /// The indexed result, in its original variables.
  Result,
  /// The query after variable normalization.
  NormQuery,
  /// The indexed result after variable normalization (the form stored in the tree).
  NormResult,
  /// Special variables; namespace-disjoint from every ordinary bank.
  Special,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct VarSpec {
  pub bank : VarBank,
  pub index: u32,
}

impl VarSpec {
  /// The spec of `variable` as it occurs inside a term of bank `bank`. Special
  /// variables always resolve to the `Special` bank regardless of the enclosing term.
  #[inline(always)]
  pub fn of(variable: Variable, bank: VarBank) -> VarSpec {
    match variable.kind {
      VarKind::Special  => VarSpec { bank: VarBank::Special, index: variable.index },
      VarKind::Ordinary => VarSpec { bank, index: variable.index },
    }
  }

  #[inline(always)]
  pub fn special(index: u32) -> VarSpec {
    VarSpec { bank: VarBank::Special, index }
  }
}

/// A term id paired with the bank its ordinary variables are interpreted in.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TermSpec {
  pub bank: VarBank,
  pub term: Term,
}

impl TermSpec {
  #[inline(always)]
  pub fn new(bank: VarBank, term: Term) -> TermSpec {
    TermSpec { bank, term }
  }
}

#[derive(Clone, Default)]
pub struct Substitution {
  bindings: HashMap<VarSpec, TermSpec>,
  /// Variables bound since the oldest open scope, newest last.
  journal : Vec<VarSpec>,
  /// Journal lengths at each open `bd_record`.
  scopes  : Vec<usize>,
  /// Output renaming for rendering unbound variables in `apply`, memoized so repeated
  /// applications of one substitution agree.
  output     : HashMap<VarSpec, u32>,
  next_output: u32,
}

impl Substitution {
  pub fn new() -> Substitution {
    Substitution::default()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.bindings.is_empty()
  }

  // region Backtracking

  /// Opens a backtrack scope.
  pub fn bd_record(&mut self) {
    self.scopes.push(self.journal.len());
  }

  /// Closes the innermost scope, keeping its bindings: they now belong to the enclosing
  /// scope (or become permanent if none is open).
  pub fn bd_done(&mut self) {
    self.scopes.pop().expect("bd_done with no open backtrack scope");
  }

  /// Closes the innermost scope and undoes every binding recorded in it.
  pub fn bd_backtrack(&mut self) {
    let mark = self.scopes.pop().expect("backtrack with no open backtrack scope");
    while self.journal.len() > mark {
      let undone = self.journal.pop().unwrap();
      self.bindings.remove(&undone);
    }
  }

  // endregion

  // region Binding and dereference

  /// Records `variable ↦ value`. Re-binding to an equal value succeeds and records
  /// nothing; re-binding to a different value fails.
  pub fn bind(&mut self, variable: VarSpec, value: TermSpec) -> bool {
    match self.bindings.get(&variable) {
      Some(existing) => *existing == value,
      None => {
        self.bindings.insert(variable, value);
        self.journal.push(variable);
        true
      }
    }
  }

  #[inline(always)]
  pub fn lookup(&self, variable: VarSpec) -> Option<TermSpec> {
    self.bindings.get(&variable).copied()
  }

  /// Follows binding chains until the spec is an application or an unbound variable.
  pub fn deref(&self, bank: &TermBank, mut spec: TermSpec) -> TermSpec {
    loop {
      let variable = match bank.data(spec.term) {
        TermData::Variable(v) => VarSpec::of(*v, spec.bank),
        _ => return spec,
      };
      match self.bindings.get(&variable) {
        Some(&next) => spec = next,
        None        => return spec,
      }
    }
  }

  /// Dereferences a variable spec directly; `None` when unbound.
  pub fn deref_var(&self, bank: &TermBank, variable: VarSpec) -> Option<TermSpec> {
    self.bindings.get(&variable).map(|&spec| self.deref(bank, spec))
  }

  // endregion

  // region Unification and matching

  /// Robinson unification with bank-aware variables and occurs check. New bindings are
  /// recorded in the current backtrack scope; on failure the caller backtracks the
  /// scope to discard partial progress.
  pub fn unify(&mut self, bank: &TermBank, t1: TermSpec, t2: TermSpec) -> bool {
    let mut pairs = vec![(t1, t2)];

    while let Some((a, b)) = pairs.pop() {
      let a = self.deref(bank, a);
      let b = self.deref(bank, b);
      if a == b {
        continue;
      }

      match (bank.data(a.term), bank.data(b.term)) {
        (TermData::Variable(v), TermData::Variable(w)) => {
          let vs = VarSpec::of(*v, a.bank);
          let ws = VarSpec::of(*w, b.bank);
          if vs == ws {
            continue;
          }
          if !self.bind(vs, b) {
            return false;
          }
        }

        (TermData::Variable(v), _) => {
          let vs = VarSpec::of(*v, a.bank);
          if self.occurs(bank, vs, b) || !self.bind(vs, b) {
            return false;
          }
        }

        (_, TermData::Variable(w)) => {
          let ws = VarSpec::of(*w, b.bank);
          if self.occurs(bank, ws, a) || !self.bind(ws, a) {
            return false;
          }
        }

        (
          TermData::Application { symbol: f, args: xs },
          TermData::Application { symbol: g, args: ys },
        ) => {
          if f != g {
            return false;
          }
          debug_assert_eq!(xs.len(), ys.len());
          pairs.extend(
            xs.iter()
              .zip(ys.iter())
              .map(|(&x, &y)| (TermSpec::new(a.bank, x), TermSpec::new(b.bank, y))),
          );
        }
      }
    }
    true
  }

  /// Does `variable` occur in the dereferenced `spec`?
  fn occurs(&self, bank: &TermBank, variable: VarSpec, spec: TermSpec) -> bool {
    let mut to_visit = vec![spec];
    while let Some(current) = to_visit.pop() {
      let current = self.deref(bank, current);
      match bank.data(current.term) {
        TermData::Variable(v) => {
          if VarSpec::of(*v, current.bank) == variable {
            return true;
          }
        }
        TermData::Application { args, .. } => {
          to_visit.extend(args.iter().map(|&arg| TermSpec::new(current.bank, arg)));
        }
      }
    }
    false
  }

  /// One-sided matching: variables of `pattern`'s bank (and special variables) may
  /// bind; every other variable is rigid. No occurs check is needed, since bindable
  /// variables never receive terms that can reach back into their own bank.
  pub fn match_terms(&mut self, bank: &TermBank, pattern: TermSpec, subject: TermSpec) -> bool {
    let pattern_bank = pattern.bank;
    let mut pairs = vec![(pattern, subject)];

    while let Some((p, s)) = pairs.pop() {
      let p = self.deref(bank, p);
      let s = self.deref(bank, s);
      if p == s {
        continue;
      }

      match (bank.data(p.term), bank.data(s.term)) {
        (TermData::Variable(v), _) => {
          let vs = VarSpec::of(*v, p.bank);
          if self.bindable(vs, pattern_bank) {
            if !self.bind(vs, s) {
              return false;
            }
          } else if let TermData::Variable(w) = bank.data(s.term) {
            // A rigid pattern-side variable only matches itself, unless the subject
            // side is a bindable (special) variable that can absorb it.
            let ws = VarSpec::of(*w, s.bank);
            if !(self.bindable(ws, pattern_bank) && self.bind(ws, p)) {
              return false;
            }
          } else {
            return false;
          }
        }

        (_, TermData::Variable(w)) => {
          let ws = VarSpec::of(*w, s.bank);
          if !(self.bindable(ws, pattern_bank) && self.bind(ws, p)) {
            return false;
          }
        }

        (
          TermData::Application { symbol: f, args: xs },
          TermData::Application { symbol: g, args: ys },
        ) => {
          if f != g {
            return false;
          }
          debug_assert_eq!(xs.len(), ys.len());
          pairs.extend(
            xs.iter()
              .zip(ys.iter())
              .map(|(&x, &y)| (TermSpec::new(p.bank, x), TermSpec::new(s.bank, y))),
          );
        }
      }
    }
    true
  }

  #[inline(always)]
  fn bindable(&self, variable: VarSpec, pattern_bank: VarBank) -> bool {
    variable.bank == pattern_bank || variable.bank == VarBank::Special
  }

  // endregion

  // region Application and denormalization

  /// Instantiates `spec` through the substitution, building the result in `bank`.
  /// Unbound variables are rendered as ordinary variables under a fresh output
  /// numbering memoized in the substitution, so every `apply` against this
  /// substitution names them consistently.
  pub fn apply(&mut self, bank: &mut TermBank, spec: TermSpec) -> Term {
    let spec = self.deref(bank, spec);
    match bank.data(spec.term).clone() {
      TermData::Variable(v) => {
        let vs = VarSpec::of(v, spec.bank);
        let index = self.output_variable(vs);
        bank.variable(index)
      }
      TermData::Application { symbol, args } => {
        let instantiated: Vec<Term> = args
            .into_iter()
            .map(|arg| self.apply(bank, TermSpec::new(spec.bank, arg)))
            .collect();
        bank.application(symbol, instantiated)
      }
    }
  }

  fn output_variable(&mut self, variable: VarSpec) -> u32 {
    if let Some(&index) = self.output.get(&variable) {
      return index;
    }
    let index = self.next_output;
    self.next_output += 1;
    self.output.insert(variable, index);
    index
  }

  /// Instantiates a term of the caller's query bank.
  #[inline(always)]
  pub fn apply_to_query(&mut self, bank: &mut TermBank, term: Term) -> Term {
    self.apply(bank, TermSpec::new(VarBank::Query, term))
  }

  /// Instantiates a term of the indexed result bank.
  #[inline(always)]
  pub fn apply_to_result(&mut self, bank: &mut TermBank, term: Term) -> Term {
    self.apply(bank, TermSpec::new(VarBank::Result, term))
  }

  /// Instantiates every argument of `literal` interpreted in `var_bank`.
  pub fn apply_to_literal(&mut self, bank: &mut TermBank, literal: Literal, var_bank: VarBank) -> Literal {
    let data = bank.literal_data(literal).clone();
    let instantiated: Vec<Term> = data
        .args
        .into_iter()
        .map(|arg| self.apply(bank, TermSpec::new(var_bank, arg)))
        .collect();
    bank.literal(data.predicate, data.polarity, instantiated)
  }

  /// For each `(original, normalized)` pair of `renaming`, binds the original variable
  /// in bank `to` to the normalized variable *as a variable term* of bank `from`.
  /// Lookups against `to` then resolve transitively through the normalized bank, which
  /// is how a retrieval iterator presents its internal bindings in the caller's
  /// variable space.
  pub fn denormalize(&mut self, bank: &mut TermBank, renaming: &Renaming, from: VarBank, to: VarBank) {
    for (original, normalized) in renaming.iter() {
      let normalized_term = bank.variable(normalized);
      let bound = self.bind(
        VarSpec { bank: to, index: original },
        TermSpec::new(from, normalized_term),
      );
      debug_assert!(bound, "denormalized variable already bound");
    }
  }

  // endregion
}

#[cfg(test)]
mod tests {
  use crate::core::signature::Signature;
  use super::*;

  struct Fixture {
    bank: TermBank,
    f   : crate::api::symbol::SymbolId,
    g   : crate::api::symbol::SymbolId,
    a   : crate::api::symbol::SymbolId,
    b   : crate::api::symbol::SymbolId,
  }

  fn fixture() -> Fixture {
    let signature = Signature::new();
    let (f, g, a, b) = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      let f = sig.declare_function("f".into(), vec![iota, iota], iota, Default::default()).unwrap();
      let g = sig.declare_function("g".into(), vec![iota], iota, Default::default()).unwrap();
      let a = sig.declare_function("a".into(), vec![], iota, Default::default()).unwrap();
      let b = sig.declare_function("b".into(), vec![], iota, Default::default()).unwrap();
      (f, g, a, b)
    };
    Fixture { bank: TermBank::new(signature), f, g, a, b }
  }

  #[test]
  fn unify_binds_across_banks() {
    let Fixture { mut bank, f, a, .. } = fixture();

    // f(X0, X0) @ Query  ≟  f(a, X0) @ Result
    let x0 = bank.variable(0);
    let ca = bank.constant(a);
    let q = bank.application(f, vec![x0, x0]);
    let r = bank.application(f, vec![ca, x0]);

    let mut subst = Substitution::new();
    assert!(subst.unify(&bank, TermSpec::new(VarBank::Query, q), TermSpec::new(VarBank::Result, r)));

    let qx = subst.apply_to_query(&mut bank, x0);
    let rx = subst.apply(&mut bank, TermSpec::new(VarBank::Result, x0));
    assert_eq!(qx, ca);
    assert_eq!(rx, ca);
  }

  #[test]
  fn unify_performs_occurs_check() {
    let Fixture { mut bank, g, .. } = fixture();

    let x0 = bank.variable(0);
    let gx = bank.application(g, vec![x0]);

    let mut subst = Substitution::new();
    // X0 ≟ g(X0) within one bank must fail.
    assert!(!subst.unify(&bank, TermSpec::new(VarBank::Query, x0), TermSpec::new(VarBank::Query, gx)));
  }

  #[test]
  fn unify_failure_cases() {
    let Fixture { mut bank, f, g, a, b } = fixture();

    let ca = bank.constant(a);
    let cb = bank.constant(b);
    let fa = bank.application(f, vec![ca, ca]);
    let ga = bank.application(g, vec![ca]);

    let mut subst = Substitution::new();
    assert!(!subst.unify(&bank, TermSpec::new(VarBank::Query, ca), TermSpec::new(VarBank::Result, cb)));
    assert!(!subst.unify(&bank, TermSpec::new(VarBank::Query, fa), TermSpec::new(VarBank::Result, ga)));
  }

  #[test]
  fn match_is_one_sided() {
    let Fixture { mut bank, f, a, b, .. } = fixture();

    let x0 = bank.variable(0);
    let ca = bank.constant(a);
    let cb = bank.constant(b);

    // Pattern f(X0, X0) matches subject f(a, a) …
    let pattern = bank.application(f, vec![x0, x0]);
    let subject = bank.application(f, vec![ca, ca]);
    let mut subst = Substitution::new();
    assert!(subst.match_terms(
      &bank,
      TermSpec::new(VarBank::NormResult, pattern),
      TermSpec::new(VarBank::NormQuery, subject)
    ));

    // … but not f(a, b), and a subject variable never binds.
    let subject2 = bank.application(f, vec![ca, cb]);
    let mut subst2 = Substitution::new();
    assert!(!subst2.match_terms(
      &bank,
      TermSpec::new(VarBank::NormResult, pattern),
      TermSpec::new(VarBank::NormQuery, subject2)
    ));

    let mut subst3 = Substitution::new();
    assert!(!subst3.match_terms(
      &bank,
      TermSpec::new(VarBank::NormResult, ca),
      TermSpec::new(VarBank::NormQuery, x0)
    ));
  }

  #[test]
  fn backtracking_restores_the_substitution_exactly() {
    let Fixture { mut bank, a, b, .. } = fixture();

    let ca = bank.constant(a);
    let cb = bank.constant(b);

    let mut subst = Substitution::new();
    assert!(subst.bind(VarSpec { bank: VarBank::Query, index: 0 }, TermSpec::new(VarBank::Result, ca)));

    subst.bd_record();
    assert!(subst.bind(VarSpec { bank: VarBank::Query, index: 1 }, TermSpec::new(VarBank::Result, cb)));
    assert!(subst.bind(VarSpec::special(4), TermSpec::new(VarBank::NormQuery, ca)));
    subst.bd_backtrack();

    assert_eq!(
      subst.lookup(VarSpec { bank: VarBank::Query, index: 0 }),
      Some(TermSpec::new(VarBank::Result, ca))
    );
    assert_eq!(subst.lookup(VarSpec { bank: VarBank::Query, index: 1 }), None);
    assert_eq!(subst.lookup(VarSpec::special(4)), None);
  }

  #[test]
  fn bd_done_merges_into_enclosing_scope() {
    let Fixture { mut bank, a, .. } = fixture();
    let ca = bank.constant(a);

    let mut subst = Substitution::new();
    subst.bd_record();
    subst.bd_record();
    assert!(subst.bind(VarSpec::special(0), TermSpec::new(VarBank::NormQuery, ca)));
    subst.bd_done();
    // The binding survives the inner scope …
    assert!(subst.lookup(VarSpec::special(0)).is_some());
    // … and dies with the outer one.
    subst.bd_backtrack();
    assert_eq!(subst.lookup(VarSpec::special(0)), None);
  }

  #[test]
  fn rebinding_is_idempotent_on_equal_values() {
    let Fixture { mut bank, a, b, .. } = fixture();
    let ca = bank.constant(a);
    let cb = bank.constant(b);

    let mut subst = Substitution::new();
    let v = VarSpec { bank: VarBank::Query, index: 0 };
    assert!(subst.bind(v, TermSpec::new(VarBank::Result, ca)));
    assert!(subst.bind(v, TermSpec::new(VarBank::Result, ca)));
    assert!(!subst.bind(v, TermSpec::new(VarBank::Result, cb)));
  }
}
