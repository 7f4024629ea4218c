/*!

The simplification ordering is consumed read-only by the indexing core; which ordering
the prover runs (KBO, LPO, …) is none of this crate's business. The acyclicity index
receives a `TermOrdering` as an injected capability, and tests supply deterministic
stubs.

*/

use crate::{
  api::term::Term,
  core::term_bank::TermBank,
};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OrderingResult {
  Less,
  Equal,
  Greater,
  Incomparable,
}

pub trait TermOrdering {
  fn compare(&self, bank: &TermBank, left: Term, right: Term) -> OrderingResult;
}
