/*!

A `Literal` is a predicate application together with a polarity bit. Like terms, literals
are hash-consed in the [`TermBank`](crate::TermBank) and handled by id, so two
occurrences of the same ground literal in different clauses share one id. The acyclicity
index relies on this: it keys its per-sort entries by literal id, which plays the role
the literal pointer plays in a perfectly-shared term representation.

*/

use crate::api::{symbol::SymbolId, term::Term};

/// Index of a literal within its `TermBank`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Literal(pub(crate) u32);

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct LiteralData {
  pub predicate: SymbolId,
  pub polarity : bool,
  pub args     : Vec<Term>,
}
