/*!

The public API of the library: the term model (sorts, symbols, terms, literals, clauses),
the ordering capability consumed by the indices, and the index traits implemented by the
substitution trees.

*/

pub mod clause;
pub mod index;
pub mod literal;
pub mod ordering;
pub mod sort;
pub mod symbol;
pub mod term;

pub use clause::{Clause, ClauseStore, Inference, InferenceRule, InputType, RcClause};
pub use index::{LiteralIndex, LiteralQueryResult, TermIndex, TermQueryResult};
pub use literal::{Literal, LiteralData};
pub use ordering::{OrderingResult, TermOrdering};
pub use sort::{Sort, SortId, TermAlgebra};
pub use symbol::{Symbol, SymbolAttribute, SymbolAttributes, SymbolId, SymbolType};
pub use term::{Term, TermData, TermTop, VarKind, Variable};
