/*!

The `TermBank` is the arena in which every term and literal lives, hash-consed so that
structurally equal terms always receive the same id. All other components traffic in the
copyable [`Term`]/[`Literal`] ids; only the bank can resolve an id to its stored shape.

Interning also computes, once per distinct term, the three facts the rest of the core
asks for constantly: groundness, weight (node count), and whether the term contains any
special variables. The bank is append-only: ids are never invalidated or recycled, so a
term id held by an index stays valid for the bank's lifetime even after the index entry
that produced it is long gone.

The bank is shared behind `Rc<RefCell<…>>` between the saturation loop, the indices, and
the retrieval iterators. All borrows are transient; nothing holds a borrow across a yield
to the caller.

*/

use crate::{
  abstractions::{HashMap, RcCell},
  api::{
    literal::{Literal, LiteralData},
    symbol::SymbolId,
    term::{Term, TermData, TermTop, VarKind, Variable},
  },
  core::signature::RcSignature,
};

pub type RcTermBank = RcCell<TermBank>;

struct TermEntry {
  data       : TermData,
  ground     : bool,
  weight     : u32,
  has_special: bool,
}

struct LiteralEntry {
  data  : LiteralData,
  ground: bool,
  weight: u32,
}

pub struct TermBank {
  signature   : RcSignature,
  terms       : Vec<TermEntry>,
  term_ids    : HashMap<TermData, Term>,
  literals    : Vec<LiteralEntry>,
  literal_ids : HashMap<LiteralData, Literal>,
}

impl TermBank {
  pub fn new(signature: RcSignature) -> TermBank {
    TermBank {
      signature,
      terms      : Vec::new(),
      term_ids   : HashMap::new(),
      literals   : Vec::new(),
      literal_ids: HashMap::new(),
    }
  }

  #[inline(always)]
  pub fn signature(&self) -> &RcSignature {
    &self.signature
  }

  // region Terms

  fn intern(&mut self, data: TermData) -> Term {
    if let Some(&term) = self.term_ids.get(&data) {
      return term;
    }

    let (ground, weight, has_special) = match &data {
      TermData::Variable(variable) => (false, 1, variable.is_special()),

      TermData::Application { args, .. } => {
        let mut ground      = true;
        let mut weight      = 1u32;
        let mut has_special = false;
        for &arg in args.iter() {
          let entry = &self.terms[arg.0 as usize];
          ground      &= entry.ground;
          weight      += entry.weight;
          has_special |= entry.has_special;
        }
        (ground, weight, has_special)
      }
    };

    let term = Term(self.terms.len() as u32);
    self.terms.push(TermEntry { data: data.clone(), ground, weight, has_special });
    self.term_ids.insert(data, term);
    term
  }

  /// An ordinary variable term.
  pub fn variable(&mut self, index: u32) -> Term {
    self.intern(TermData::Variable(Variable::ordinary(index)))
  }

  /// A special variable term. Only the indices create these.
  pub fn special_variable(&mut self, index: u32) -> Term {
    self.intern(TermData::Variable(Variable::special(index)))
  }

  pub fn application(&mut self, symbol: SymbolId, args: Vec<Term>) -> Term {
    debug_assert_eq!(
      self.signature.borrow().symbol(symbol).arity(),
      args.len(),
      "arity mismatch in application of {}",
      self.signature.borrow().symbol(symbol).name
    );
    self.intern(TermData::Application { symbol, args })
  }

  /// A constant, i.e. a nullary application.
  pub fn constant(&mut self, symbol: SymbolId) -> Term {
    self.application(symbol, Vec::new())
  }

  #[inline(always)]
  pub fn data(&self, term: Term) -> &TermData {
    &self.terms[term.0 as usize].data
  }

  #[inline(always)]
  pub fn ground(&self, term: Term) -> bool {
    self.terms[term.0 as usize].ground
  }

  #[inline(always)]
  pub fn weight(&self, term: Term) -> u32 {
    self.terms[term.0 as usize].weight
  }

  #[inline(always)]
  pub fn has_special_variables(&self, term: Term) -> bool {
    self.terms[term.0 as usize].has_special
  }

  #[inline(always)]
  pub fn is_variable(&self, term: Term) -> bool {
    matches!(self.data(term), TermData::Variable(_))
  }

  /// The top of a term, which the substitution tree discriminates on.
  pub fn top(&self, term: Term) -> TermTop {
    match self.data(term) {
      TermData::Variable(variable)        => TermTop::Variable(*variable),
      TermData::Application { symbol, .. } => TermTop::Functor(*symbol),
    }
  }

  /// The indices of all special variables occurring in `term`, each reported once.
  pub fn special_variables_of(&self, term: Term) -> Vec<u32> {
    if !self.has_special_variables(term) {
      return Vec::new();
    }

    let mut found = Vec::new();
    let mut to_visit = vec![term];
    while let Some(t) = to_visit.pop() {
      match self.data(t) {
        TermData::Variable(v) => {
          if v.kind == VarKind::Special && !found.contains(&v.index) {
            found.push(v.index);
          }
        }
        TermData::Application { args, .. } => {
          // Prune shared subterms that cannot contain special variables.
          to_visit.extend(args.iter().copied().filter(|&a| self.has_special_variables(a)));
        }
      }
    }
    found
  }

  // endregion

  // region Literals

  pub fn literal(&mut self, predicate: SymbolId, polarity: bool, args: Vec<Term>) -> Literal {
    // Equality is polymorphic and carries no argument-sort profile of its own.
    debug_assert!(
      self.signature.borrow().symbol(predicate).is_equality() && args.len() == 2
          || self.signature.borrow().symbol(predicate).arity() == args.len(),
      "arity mismatch in literal over {}",
      self.signature.borrow().symbol(predicate).name
    );

    let data = LiteralData { predicate, polarity, args };
    if let Some(&literal) = self.literal_ids.get(&data) {
      return literal;
    }

    let ground = data.args.iter().all(|&a| self.ground(a));
    let weight = 1 + data.args.iter().map(|&a| self.weight(a)).sum::<u32>();

    let literal = Literal(self.literals.len() as u32);
    self.literals.push(LiteralEntry { data: data.clone(), ground, weight });
    self.literal_ids.insert(data, literal);
    literal
  }

  /// A positive or negative equality between `left` and `right`.
  pub fn equality(&mut self, polarity: bool, left: Term, right: Term) -> Literal {
    let equality = self.signature.borrow().equality();
    self.literal(equality, polarity, vec![left, right])
  }

  #[inline(always)]
  pub fn literal_data(&self, literal: Literal) -> &LiteralData {
    &self.literals[literal.0 as usize].data
  }

  #[inline(always)]
  pub fn literal_ground(&self, literal: Literal) -> bool {
    self.literals[literal.0 as usize].ground
  }

  #[inline(always)]
  pub fn literal_weight(&self, literal: Literal) -> u32 {
    self.literals[literal.0 as usize].weight
  }

  // endregion

  // region Display

  pub fn term_to_string(&self, term: Term) -> String {
    match self.data(term) {
      TermData::Variable(Variable { kind: VarKind::Ordinary, index }) => format!("X{}", index),
      TermData::Variable(Variable { kind: VarKind::Special, index })  => format!("*{}", index),

      TermData::Application { symbol, args } => {
        let name = self.signature.borrow().symbol(*symbol).name.to_string();
        if args.is_empty() {
          name
        } else {
          let rendered: Vec<String> = args.iter().map(|&a| self.term_to_string(a)).collect();
          format!("{}({})", name, rendered.join(","))
        }
      }
    }
  }

  pub fn literal_to_string(&self, literal: Literal) -> String {
    let data = self.literal_data(literal);
    let signature = self.signature.borrow();
    let symbol = signature.symbol(data.predicate);

    if symbol.is_equality() {
      let connective = if data.polarity { "=" } else { "!=" };
      return format!(
        "{} {} {}",
        self.term_to_string(data.args[0]),
        connective,
        self.term_to_string(data.args[1])
      );
    }

    let sign = if data.polarity { "" } else { "~" };
    if data.args.is_empty() {
      format!("{}{}", sign, symbol.name)
    } else {
      let rendered: Vec<String> = data.args.iter().map(|&a| self.term_to_string(a)).collect();
      format!("{}{}({})", sign, symbol.name, rendered.join(","))
    }
  }

  // endregion
}

#[cfg(test)]
mod tests {
  use crate::{
    abstractions::rc_cell,
    core::signature::Signature,
  };
  use super::*;

  #[test]
  fn interning_is_maximal_sharing() {
    let signature = Signature::new();
    let (f, a) = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      let f = sig.declare_function("f".into(), vec![iota], iota, Default::default()).unwrap();
      let a = sig.declare_function("a".into(), vec![], iota, Default::default()).unwrap();
      (f, a)
    };
    let mut bank = TermBank::new(signature);

    let a1 = bank.constant(a);
    let a2 = bank.constant(a);
    assert_eq!(a1, a2);

    let fa1 = bank.application(f, vec![a1]);
    let fa2 = bank.application(f, vec![a2]);
    assert_eq!(fa1, fa2);
    assert_ne!(fa1, a1);

    assert!(bank.ground(fa1));
    assert_eq!(bank.weight(fa1), 2);
    assert!(!bank.has_special_variables(fa1));
  }

  #[test]
  fn variables_are_not_ground_and_specials_are_tracked() {
    let signature = Signature::new();
    let f = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      sig.declare_function("f".into(), vec![iota, iota], iota, Default::default()).unwrap()
    };
    let mut bank = TermBank::new(signature);

    let x  = bank.variable(0);
    let sv = bank.special_variable(7);
    let t  = bank.application(f, vec![x, sv]);

    assert!(!bank.ground(t));
    assert!(bank.has_special_variables(t));
    assert_eq!(bank.special_variables_of(t), vec![7]);
    assert!(!bank.has_special_variables(x));
  }

  #[test]
  fn literal_interning_shares_ids() {
    let signature = Signature::new();
    let (p, a) = {
      let mut sig = signature.borrow_mut();
      let iota = sig.declare_sort("iota".into());
      let p = sig.declare_predicate("p".into(), vec![iota], Default::default()).unwrap();
      let a = sig.declare_function("a".into(), vec![], iota, Default::default()).unwrap();
      (p, a)
    };
    let mut bank = TermBank::new(signature);

    let a = bank.constant(a);
    let l1 = bank.literal(p, true, vec![a]);
    let l2 = bank.literal(p, true, vec![a]);
    let l3 = bank.literal(p, false, vec![a]);
    assert_eq!(l1, l2);
    assert_ne!(l1, l3);
    assert!(bank.literal_ground(l1));
    assert_eq!(bank.literal_weight(l1), 2);
  }

  // Keeps the convenience constructor honest.
  #[test]
  fn rc_cell_roundtrip() {
    let cell = rc_cell(1u32);
    *cell.borrow_mut() += 1;
    assert_eq!(*cell.borrow(), 2);
  }
}
