/*!

A `Sort` is a named type. The indexing core needs very little sort structure: the
acyclicity index only asks which sorts are term-algebra sorts, which function symbols are
their constructors, and whether a term-algebra sort was declared to allow cyclic terms.

*/

use std::fmt::Display;

use crate::{
  abstractions::IString,
  api::symbol::SymbolId,
};

/// Index of a sort within its `Signature`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct SortId(pub(crate) u32);

/// The term-algebra declaration of a sort: the sort's carrier is freely generated by the
/// listed constructors.
#[derive(Clone)]
pub struct TermAlgebra {
  pub constructors      : Vec<SymbolId>,
  pub allows_cyclic_terms: bool,
}

#[derive(Clone)]
pub struct Sort {
  pub name        : IString,
  pub term_algebra: Option<TermAlgebra>,
}

impl Sort {
  pub fn new(name: IString) -> Sort {
    Sort {
      name,
      term_algebra: None,
    }
  }

  #[inline(always)]
  pub fn is_term_algebra(&self) -> bool {
    self.term_algebra.is_some()
  }
}

impl Display for Sort {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name)
  }
}
