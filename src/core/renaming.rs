/*!

Variable normalization. Before a literal or term is inserted into (or queried against) a
substitution tree, its ordinary variables are renumbered 0, 1, 2, … in left-to-right
first-occurrence order. The `Renaming` records the original-to-normalized mapping so a
retrieval iterator can later rewrite ("denormalize") substitution entries back into the
caller's variable space.

Normalization is idempotent: normalizing an already-normalized key builds the identity
renaming.

*/

use crate::{
  abstractions::HashMap,
  api::{
    literal::Literal,
    term::{Term, TermData, VarKind, Variable},
  },
  core::term_bank::TermBank,
};

#[derive(Clone, Default)]
pub struct Renaming {
  /// `(original, normalized)` in first-occurrence order.
  pairs: Vec<(u32, u32)>,
  index: HashMap<u32, u32>,
}

impl Renaming {
  pub fn new() -> Renaming {
    Renaming::default()
  }

  /// The normalized image of `original`, assigned on first sight.
  pub fn normalize_variable(&mut self, original: u32) -> u32 {
    if let Some(&normalized) = self.index.get(&original) {
      return normalized;
    }
    let normalized = self.pairs.len() as u32;
    self.pairs.push((original, normalized));
    self.index.insert(original, normalized);
    normalized
  }

  #[inline(always)]
  pub fn get(&self, original: u32) -> Option<u32> {
    self.index.get(&original).copied()
  }

  /// `(original, normalized)` pairs in first-occurrence order.
  #[inline(always)]
  pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
    self.pairs.iter().copied()
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.pairs.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  /// Rewrites `term` with its ordinary variables normalized through `self`.
  /// Special variables never appear in keys handed to the index; finding one here is a
  /// programmer error.
  pub fn normalize_term(&mut self, bank: &mut TermBank, term: Term) -> Term {
    match bank.data(term).clone() {
      TermData::Variable(Variable { kind: VarKind::Ordinary, index }) => {
        let normalized = self.normalize_variable(index);
        bank.variable(normalized)
      }

      TermData::Variable(Variable { kind: VarKind::Special, .. }) => {
        panic!("special variable in a term submitted for normalization");
      }

      TermData::Application { symbol, args } => {
        let normalized_args: Vec<Term> = args.into_iter().map(|a| self.normalize_term(bank, a)).collect();
        bank.application(symbol, normalized_args)
      }
    }
  }

  /// Rewrites the arguments of `literal` through [`Renaming::normalize_term`].
  pub fn normalize_literal(&mut self, bank: &mut TermBank, literal: Literal) -> Literal {
    let data = bank.literal_data(literal).clone();
    let normalized_args: Vec<Term> = data.args.into_iter().map(|a| self.normalize_term(bank, a)).collect();
    bank.literal(data.predicate, data.polarity, normalized_args)
  }
}

#[cfg(test)]
mod tests {
  use crate::core::signature::Signature;
  use super::*;

  fn fixture() -> (TermBank, crate::api::symbol::SymbolId) {
    let signature = Signature::new();
    let f = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      sig.declare_function("f".into(), vec![iota, iota, iota], iota, Default::default()).unwrap()
    };
    (TermBank::new(signature), f)
  }

  #[test]
  fn variables_are_numbered_by_first_occurrence() {
    let (mut bank, f) = fixture();

    // f(X7, X3, X7)  ⇝  f(X0, X1, X0)
    let x7 = bank.variable(7);
    let x3 = bank.variable(3);
    let term = bank.application(f, vec![x7, x3, x7]);

    let mut renaming = Renaming::new();
    let normalized = renaming.normalize_term(&mut bank, term);

    let x0 = bank.variable(0);
    let x1 = bank.variable(1);
    let expected = bank.application(f, vec![x0, x1, x0]);
    assert_eq!(normalized, expected);
    assert_eq!(renaming.iter().collect::<Vec<_>>(), vec![(7, 0), (3, 1)]);
  }

  #[test]
  fn normalization_is_idempotent() {
    let (mut bank, f) = fixture();

    let x5 = bank.variable(5);
    let x2 = bank.variable(2);
    let x9 = bank.variable(9);
    let term = bank.application(f, vec![x5, x2, x9]);

    let once  = Renaming::new().normalize_term(&mut bank, term);
    let twice = Renaming::new().normalize_term(&mut bank, once);
    assert_eq!(once, twice);
  }
}
