/*!

Nodes of a substitution tree. An intermediate node holds a term label and children keyed
by the top of each child's label; a leaf holds a label and the set of `LeafData` entries
inserted along its path. Root nodes are the one exception: they carry no label, because
the root table already discriminated on the key's top symbol.

Child storage starts as an ordered vector scanned linearly and upgrades to a hash map
once the child count crosses a threshold. Nothing downstream relies on child iteration
order.

*/

use crate::{
  abstractions::HashMap,
  api::{
    clause::RcClause,
    literal::Literal,
    term::{Term, TermTop},
  },
};

/// Child count past which a node's child storage switches to a hash map.
const CHILD_MAP_UPGRADE_THRESHOLD: usize = 16;

/// What a leaf stores per insertion: the owning clause and the original
/// (non-normalized) payload: the indexed literal, or the indexed term along with the
/// literal it occurs in.
#[derive(Clone)]
pub(crate) struct LeafData {
  pub clause : RcClause,
  pub literal: Option<Literal>,
  pub term   : Option<Term>,
}

impl PartialEq for LeafData {
  fn eq(&self, other: &Self) -> bool {
    self.clause.number() == other.clause.number()
        && self.literal == other.literal
        && self.term == other.term
  }
}

impl Eq for LeafData {}

#[derive(PartialEq)]
pub(crate) enum Node {
  Leaf  { label: Option<Term>, entries: Vec<LeafData> },
  Inner { label: Option<Term>, children: ChildMap },
}

impl Node {
  pub fn empty_leaf() -> Node {
    Node::Leaf { label: None, entries: Vec::new() }
  }

  pub fn empty_inner() -> Node {
    Node::Inner { label: None, children: ChildMap::new() }
  }

  pub fn leaf_with(label: Option<Term>, entry: LeafData) -> Node {
    Node::Leaf { label, entries: vec![entry] }
  }

  /// An intermediate node over a single existing child, keyed by `child_top`.
  pub fn inner_with_child(label: Option<Term>, child_top: TermTop, child: Node) -> Node {
    let mut children = ChildMap::new();
    children.insert(child_top, child);
    Node::Inner { label, children }
  }

  #[inline(always)]
  pub fn label(&self) -> Option<Term> {
    match self {
      Node::Leaf { label, .. } | Node::Inner { label, .. } => *label,
    }
  }

  pub fn set_label(&mut self, new_label: Option<Term>) {
    match self {
      Node::Leaf { label, .. } | Node::Inner { label, .. } => *label = new_label,
    }
  }

  #[inline(always)]
  pub fn is_leaf(&self) -> bool {
    matches!(self, Node::Leaf { .. })
  }

  pub fn entries(&self) -> &[LeafData] {
    match self {
      Node::Leaf { entries, .. } => entries,
      Node::Inner { .. }         => panic!("leaf entries requested from an intermediate node"),
    }
  }

  /// Inserts an entry, skipping duplicates. Returns whether the entry was new.
  pub fn insert_entry(&mut self, entry: LeafData) -> bool {
    match self {
      Node::Leaf { entries, .. } => {
        if entries.contains(&entry) {
          return false;
        }
        entries.push(entry);
        true
      }
      Node::Inner { .. } => panic!("leaf insertion into an intermediate node"),
    }
  }

  /// Removing an entry that was never inserted is a programmer error.
  pub fn remove_entry(&mut self, entry: &LeafData) {
    match self {
      Node::Leaf { entries, .. } => {
        let position = entries
            .iter()
            .position(|existing| existing == entry)
            .expect("removal of a leaf entry that was never inserted");
        entries.remove(position);
      }
      Node::Inner { .. } => panic!("leaf removal from an intermediate node"),
    }
  }

  pub fn children(&self) -> &ChildMap {
    match self {
      Node::Inner { children, .. } => children,
      Node::Leaf { .. }            => panic!("children requested from a leaf"),
    }
  }

  pub fn children_mut(&mut self) -> &mut ChildMap {
    match self {
      Node::Inner { children, .. } => children,
      Node::Leaf { .. }            => panic!("children requested from a leaf"),
    }
  }

  /// A node with no entries/children left is unlinked by removal.
  pub fn is_empty_node(&self) -> bool {
    match self {
      Node::Leaf { entries, .. }   => entries.is_empty(),
      Node::Inner { children, .. } => children.is_empty(),
    }
  }
}

#[derive(PartialEq)]
pub(crate) enum ChildMap {
  Small(Vec<(TermTop, Node)>),
  Large(HashMap<TermTop, Node>),
}

impl ChildMap {
  pub fn new() -> ChildMap {
    ChildMap::Small(Vec::new())
  }

  pub fn len(&self) -> usize {
    match self {
      ChildMap::Small(pairs) => pairs.len(),
      ChildMap::Large(map)   => map.len(),
    }
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, top: &TermTop) -> Option<&Node> {
    match self {
      ChildMap::Small(pairs) => pairs.iter().find(|(t, _)| t == top).map(|(_, n)| n),
      ChildMap::Large(map)   => map.get(top),
    }
  }

  pub fn get_mut(&mut self, top: &TermTop) -> Option<&mut Node> {
    match self {
      ChildMap::Small(pairs) => pairs.iter_mut().find(|(t, _)| t == top).map(|(_, n)| n),
      ChildMap::Large(map)   => map.get_mut(top),
    }
  }

  pub fn insert(&mut self, top: TermTop, node: Node) {
    debug_assert!(self.get(&top).is_none(), "duplicate child key in substitution tree node");
    match self {
      ChildMap::Small(pairs) => pairs.push((top, node)),
      ChildMap::Large(map)   => { map.insert(top, node); }
    }
    self.ensure_efficiency();
  }

  /// Unlinks and returns the child keyed by `top`.
  pub fn remove(&mut self, top: &TermTop) -> Node {
    match self {
      ChildMap::Small(pairs) => {
        let position = pairs
            .iter()
            .position(|(t, _)| t == top)
            .expect("removal of a child that is not present");
        pairs.remove(position).1
      }
      ChildMap::Large(map) => map.remove(top).expect("removal of a child that is not present"),
    }
  }

  /// Upgrades the backing storage when the child count crosses the threshold. Iteration
  /// order may change; retrieval does not rely on it.
  fn ensure_efficiency(&mut self) {
    if let ChildMap::Small(pairs) = self {
      if pairs.len() > CHILD_MAP_UPGRADE_THRESHOLD {
        let map: HashMap<TermTop, Node> = pairs.drain(..).collect();
        *self = ChildMap::Large(map);
      }
    }
  }

  pub fn all(&self) -> Vec<&Node> {
    match self {
      ChildMap::Small(pairs) => pairs.iter().map(|(_, n)| n).collect(),
      ChildMap::Large(map)   => map.values().collect(),
    }
  }

  /// The children whose labels are variable-headed. Special variables are never child
  /// keys, so these are exactly the ordinary-variable labels.
  pub fn variable_headed(&self) -> Vec<&Node> {
    match self {
      ChildMap::Small(pairs) => {
        pairs.iter().filter(|(t, _)| t.is_variable()).map(|(_, n)| n).collect()
      }
      ChildMap::Large(map) => {
        map.iter().filter(|(t, _)| t.is_variable()).map(|(_, n)| n).collect()
      }
    }
  }
}
