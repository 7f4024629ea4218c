/*!

The index interface the inference engine retrieves through. Both index flavors share the
same shape: `insert`/`remove` keyed by a literal or term together with its owning clause
(idempotent on duplicate insertion), and the three retrieval modes, each yielding the
indexed payload, its clause, and a substitution:

 - `get_unifications(q)`: indexed `s` with `qσ = sσ`,
 - `get_generalizations(q)`: indexed `s` with `sσ = q`,
 - `get_instances(q)`: indexed `s` with `qσ = s`.

Each result carries an owned [`Substitution`] whose domain is the original query's
variables (`VarBank::Query`) and the result payload's variables (`VarBank::Result`);
dropping a retrieval iterator abandons the search.

*/

use crate::{
  api::{
    clause::RcClause,
    literal::Literal,
    term::Term,
  },
  core::substitution::Substitution,
};

pub struct LiteralQueryResult {
  pub literal     : Literal,
  pub clause      : RcClause,
  pub substitution: Substitution,
}

pub struct TermQueryResult {
  pub term        : Term,
  /// The literal the indexed term occurs in, when the inserter recorded one.
  pub literal     : Option<Literal>,
  pub clause      : RcClause,
  pub substitution: Substitution,
}

pub trait LiteralIndex {
  fn insert(&mut self, literal: Literal, clause: &RcClause);

  /// Removing a pair that was never inserted is a programmer error and panics.
  fn remove(&mut self, literal: Literal, clause: &RcClause);

  /// With `complementary` set, the query is answered against literals of the opposite
  /// polarity, which is what resolvent-style queries want.
  fn get_unifications(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>;

  fn get_generalizations(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>;

  fn get_instances(&self, query: Literal, complementary: bool)
      -> Box<dyn Iterator<Item = LiteralQueryResult> + '_>;
}

pub trait TermIndex {
  fn insert(&mut self, term: Term, clause: &RcClause);

  /// Removing a pair that was never inserted is a programmer error and panics.
  fn remove(&mut self, term: Term, clause: &RcClause);

  fn get_unifications(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_>;

  fn get_generalizations(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_>;

  fn get_instances(&self, query: Term) -> Box<dyn Iterator<Item = TermQueryResult> + '_>;
}
