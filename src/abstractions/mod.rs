/*!

Types/type aliases that abstract over the implementing backing type.

The `IString` type, an interned string type, is an alias for whichever external crate we
choose to provide it. Likewise `NatSet` is whatever bit-set implementation we currently
use, and the `log` module hides its backing logging framework behind a handful of macros.
If a backing crate is swapped out, only this module changes.

*/

use std::{
  cell::RefCell,
  collections::{HashMap as StdHashMap, HashSet as StdHashSet},
  rc::Rc,
};

// Logging
pub mod log;

// Interned string. Use `DefaultAtom` for a global cache that can be used across threads.
pub use string_cache::DefaultAtom as IString;

// region Items meant to be used only internally

// A set of (small) natural numbers
pub(crate) type NatSet = bit_set::BitSet;

/// Shared mutable cell. Single-threaded code only.
pub type RcCell<T> = Rc<RefCell<T>>;

/// Convenience constructor for an `RcCell<T>`.
pub fn rc_cell<T>(value: T) -> RcCell<T> {
  Rc::new(RefCell::new(value))
}

pub(crate) type HashMap<K, V> = StdHashMap<K, V>;
pub(crate) type HashSet<T>    = StdHashSet<T>;

// endregion
