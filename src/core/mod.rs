/*!

The machinery of the indexing core. Everything in here operates on the id-based term
model: terms and literals are hash-consed in the [`term_bank`], so structural equality is
id equality and the substitution/indexing algorithms shuffle copyable ids instead of
walking pointer graphs.

*/

pub(crate) mod acyclicity;
pub(crate) mod containers;
pub(crate) mod event;
pub(crate) mod renaming;
pub(crate) mod signature;
pub(crate) mod substitution;
pub(crate) mod substitution_tree;
pub(crate) mod term_bank;
