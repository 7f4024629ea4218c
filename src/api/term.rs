/*!

A `Term` is a handle to an immutable, hash-consed term stored in a
[`TermBank`](crate::TermBank). Two terms are structurally equal iff their handles are
equal, so comparison and hashing are trivial and sharing is maximal. The index never
mutates a term in place; restructuring operations build replacement terms through the
bank instead.

Variables come in two kinds. *Ordinary* variables appear in user input and are
renumbered 0, 1, 2, … when a key is normalized for indexing. *Special* variables are
introduced by a substitution tree at disagreement points; they have their own numeric
namespace and never appear in user input.

*/

use crate::api::symbol::SymbolId;

/// Index of a term within its `TermBank`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Term(pub(crate) u32);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VarKind {
  Ordinary,
  Special,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Variable {
  pub kind : VarKind,
  pub index: u32,
}

impl Variable {
  #[inline(always)]
  pub fn ordinary(index: u32) -> Variable {
    Variable { kind: VarKind::Ordinary, index }
  }

  #[inline(always)]
  pub fn special(index: u32) -> Variable {
    Variable { kind: VarKind::Special, index }
  }

  #[inline(always)]
  pub fn is_special(&self) -> bool {
    self.kind == VarKind::Special
  }
}

/// The stored shape of a term.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum TermData {
  Variable(Variable),
  Application { symbol: SymbolId, args: Vec<Term> },
}

/// The top of a term, which is what a substitution tree discriminates on. Child nodes
/// are keyed by the top of their label; special variables are never child keys.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TermTop {
  Functor(SymbolId),
  Variable(Variable),
}

impl TermTop {
  #[inline(always)]
  pub fn is_variable(&self) -> bool {
    matches!(self, TermTop::Variable(_))
  }
}
