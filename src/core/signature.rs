/*!

The `Signature` owns the symbol and sort tables: every function and predicate symbol the
prover runs with, the designated equality predicate, and the term-algebra declarations
the acyclicity index consults. It is built up front and effectively frozen once
saturation starts; the indexing code only ever reads it.

*/

use std::fmt::{Display, Formatter};

use crate::{
  abstractions::{rc_cell, HashMap, IString, RcCell},
  api::{
    sort::{Sort, SortId, TermAlgebra},
    symbol::{Symbol, SymbolAttribute, SymbolAttributes, SymbolId, SymbolType},
    term::{Term, TermData},
  },
  core::term_bank::TermBank,
};

pub type RcSignature = RcCell<Signature>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SignatureError {
  /// A symbol was redeclared with a different profile.
  ConflictingDeclaration { name: IString },
  /// A term-algebra declaration listed a symbol that is not a constructor of the sort.
  NotAConstructor { name: IString },
  /// A sort received a second term-algebra declaration.
  DuplicateTermAlgebra { sort: IString },
}

impl Display for SignatureError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      SignatureError::ConflictingDeclaration { name } => {
        write!(f, "symbol {} redeclared with a different profile", name)
      }
      SignatureError::NotAConstructor { name } => {
        write!(f, "symbol {} is not a constructor of the declared term-algebra sort", name)
      }
      SignatureError::DuplicateTermAlgebra { sort } => {
        write!(f, "sort {} already carries a term-algebra declaration", sort)
      }
    }
  }
}

impl std::error::Error for SignatureError {}

pub struct Signature {
  symbols        : Vec<Symbol>,
  symbols_by_name: HashMap<IString, SymbolId>,
  sorts          : Vec<Sort>,
  sorts_by_name  : HashMap<IString, SortId>,
  equality       : SymbolId,
}

impl Signature {
  /// A fresh signature containing only the equality predicate.
  pub fn new() -> RcSignature {
    let equality = Symbol::new(
      IString::from("="),
      SymbolType::Predicate,
      SymbolAttribute::Equality.into(),
      // Equality is polymorphic; its argument sorts are per-literal, recovered from the
      // arguments themselves.
      Vec::new(),
      None,
    );

    let mut symbols_by_name = HashMap::new();
    symbols_by_name.insert(equality.name.clone(), SymbolId(0));

    rc_cell(Signature {
      symbols        : vec![equality],
      symbols_by_name,
      sorts          : Vec::new(),
      sorts_by_name  : HashMap::new(),
      equality       : SymbolId(0),
    })
  }

  // region Declarations

  pub fn declare_sort(&mut self, name: IString) -> SortId {
    if let Some(&sort) = self.sorts_by_name.get(&name) {
      return sort;
    }
    let sort = SortId(self.sorts.len() as u32);
    self.sorts.push(Sort::new(name.clone()));
    self.sorts_by_name.insert(name, sort);
    sort
  }

  pub fn declare_function(
    &mut self,
    name       : IString,
    arg_sorts  : Vec<SortId>,
    result_sort: SortId,
    attributes : SymbolAttributes,
  ) -> Result<SymbolId, SignatureError>
  {
    self.declare(Symbol::new(name, SymbolType::Function, attributes, arg_sorts, Some(result_sort)))
  }

  pub fn declare_predicate(
    &mut self,
    name      : IString,
    arg_sorts : Vec<SortId>,
    attributes: SymbolAttributes,
  ) -> Result<SymbolId, SignatureError>
  {
    self.declare(Symbol::new(name, SymbolType::Predicate, attributes, arg_sorts, None))
  }

  fn declare(&mut self, symbol: Symbol) -> Result<SymbolId, SignatureError> {
    if let Some(&existing_id) = self.symbols_by_name.get(&symbol.name) {
      let existing = &self.symbols[existing_id.0 as usize];
      if existing.symbol_type == symbol.symbol_type
          && existing.arg_sorts == symbol.arg_sorts
          && existing.result_sort == symbol.result_sort
          && existing.attributes == symbol.attributes
      {
        // Redeclaration with an identical profile is idempotent.
        return Ok(existing_id);
      }
      return Err(SignatureError::ConflictingDeclaration { name: symbol.name.clone() });
    }

    let id = SymbolId(self.symbols.len() as u32);
    self.symbols_by_name.insert(symbol.name.clone(), id);
    self.symbols.push(symbol);
    Ok(id)
  }

  /// Declares `sort` to be the term algebra freely generated by `constructors`. Every
  /// listed symbol must already be a `Constructor`-flagged function with result sort
  /// `sort`.
  pub fn declare_term_algebra(
    &mut self,
    sort              : SortId,
    constructors      : Vec<SymbolId>,
    allows_cyclic_terms: bool,
  ) -> Result<(), SignatureError>
  {
    if self.sorts[sort.0 as usize].term_algebra.is_some() {
      return Err(SignatureError::DuplicateTermAlgebra {
        sort: self.sorts[sort.0 as usize].name.clone(),
      });
    }

    for &constructor in constructors.iter() {
      let symbol = &self.symbols[constructor.0 as usize];
      if !symbol.is_constructor() || symbol.result_sort != Some(sort) {
        return Err(SignatureError::NotAConstructor { name: symbol.name.clone() });
      }
    }

    self.sorts[sort.0 as usize].term_algebra = Some(TermAlgebra { constructors, allows_cyclic_terms });
    Ok(())
  }

  // endregion

  // region Accessors

  #[inline(always)]
  pub fn symbol(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0 as usize]
  }

  #[inline(always)]
  pub fn sort(&self, id: SortId) -> &Sort {
    &self.sorts[id.0 as usize]
  }

  #[inline(always)]
  pub fn equality(&self) -> SymbolId {
    self.equality
  }

  #[inline(always)]
  pub fn is_term_algebra_sort(&self, sort: SortId) -> bool {
    self.sort(sort).is_term_algebra()
  }

  pub fn allows_cyclic_terms(&self, sort: SortId) -> bool {
    match &self.sort(sort).term_algebra {
      Some(algebra) => algebra.allows_cyclic_terms,
      None          => false,
    }
  }

  #[inline(always)]
  pub fn is_constructor(&self, symbol: SymbolId) -> bool {
    self.symbol(symbol).is_constructor()
  }

  /// The result sort of an application term; `None` for a variable.
  pub fn sort_of_term(&self, bank: &TermBank, term: Term) -> Option<SortId> {
    match bank.data(term) {
      TermData::Variable(_)               => None,
      TermData::Application { symbol, .. } => self.symbol(*symbol).result_sort,
    }
  }

  // endregion
}
