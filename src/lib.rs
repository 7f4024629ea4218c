#![allow(dead_code)]
/*!

The term indexing and retrieval core of a saturation-based first-order theorem prover. The
saturation loop lives elsewhere; what lives here is everything it leans on for speed and
soundness:

 - a [`TermBank`] arena in which all terms and literals are hash-consed and handled by
   copyable ids,
 - a bank-aware, backtrackable [`Substitution`](crate::Substitution),
 - the [`LiteralSubstitutionTree`]/[`TermSubstitutionTree`] discrimination indices with
   unification, generalization, and instance retrieval,
 - the [`AcyclicityIndex`] for term-algebra cycle detection, and
 - the clause containers ([`UnprocessedClauseContainer`], [`PassiveClauseContainer`],
   [`ActiveClauseContainer`]) whose events drive index maintenance.

*/

pub mod abstractions;
pub mod api;
mod core;

// We re-export abstractions that are meant to be used publicly.
pub use abstractions::{
  log,
  IString
};

pub use crate::core::{
  acyclicity::{AcyclicityIndex, CycleQueryResult, CycleSearchIterator},
  containers::{
    ActiveClauseContainer,
    AgeWeightQueue,
    ClauseSelectionStrategy,
    Limits,
    LimitsChange,
    PassiveClauseContainer,
    UnprocessedClauseContainer,
  },
  event::{ClauseEvent, SubscriptionData},
  renaming::Renaming,
  signature::{RcSignature, Signature, SignatureError},
  substitution::{Substitution, TermSpec, VarBank, VarSpec},
  substitution_tree::{LiteralSubstitutionTree, TermSubstitutionTree},
  term_bank::{RcTermBank, TermBank},
};
