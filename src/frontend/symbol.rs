//! Symbol tables and stack layout
//!
//! Every scope of the program (the global scope, each block, each `for`
//! loop, each function's parameter scope) owns one [`SymbolTable`]. Tables
//! live in a [`ScopeTree`] arena and are addressed by [`ScopeId`], which the
//! resolver stores on the AST so later passes re-enter the same scope.
//!
//! Stack layout: a non-global table reserves `align16(locals × 8)` bytes and
//! its n-th local lives at `n × 8` from the table's base. While executing in
//! scope S, a local owned by an enclosing table T is found above the frames
//! of every table between S (inclusive) and T (exclusive).

use std::collections::HashMap;

use crate::frontend::ast::TypeExpr;
use crate::types::{Type, WORD_SIZE};
use crate::utils::{Error, Result, Span};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The global scope, created with the tree
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// Namespace a symbol lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    /// Struct declared with `type`
    Type,
    Func,
}

/// Declared type of a symbol, resolved lazily by the checker
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolType {
    Pending(TypeExpr),
    Resolved(Type),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub ty: SymbolType,
    pub scope: SymbolScope,
    /// Declaration order among the variables of the owning table
    pub ordinal: usize,
    /// Slot offset within the owning table, set by `compute_stack`
    pub offset: Option<usize>,
}

impl Symbol {
    /// The resolved type, if the checker has filled it in
    pub fn resolved_type(&self) -> Option<&Type> {
        match &self.ty {
            SymbolType::Resolved(ty) => Some(ty),
            SymbolType::Pending(_) => None,
        }
    }
}

/// A scope containing symbols
#[derive(Debug)]
pub struct SymbolTable {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
    num_definitions: usize,
    stack_space: Option<usize>,
}

impl SymbolTable {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            symbols: HashMap::new(),
            num_definitions: 0,
            stack_space: None,
        }
    }

    fn insert(&mut self, name: &str, ty: SymbolType, scope: SymbolScope) {
        let ordinal = if matches!(scope, SymbolScope::Global | SymbolScope::Local) {
            self.num_definitions += 1;
            self.num_definitions - 1
        } else {
            0
        };
        self.symbols.insert(
            name.to_string(),
            Symbol {
                ty,
                scope,
                ordinal,
                offset: None,
            },
        );
    }
}

/// Where a variable or function lives at run time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A `.data` cell labelled with the name
    Global(String),
    /// Byte offset from the current stack pointer
    Stack(usize),
    /// Code label of a function
    Func(String),
}

/// Round up to the 16-byte stack alignment
pub fn align16(n: usize) -> usize {
    (n + 15) & !15
}

/// Arena of all symbol tables of a compilation
#[derive(Debug)]
pub struct ScopeTree {
    tables: Vec<SymbolTable>,
}

impl ScopeTree {
    /// Create a tree holding only the global table
    pub fn new() -> Self {
        Self { tables: vec![SymbolTable::new(None)] }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId::GLOBAL
    }

    /// Create a child table of `parent`
    pub fn enclose(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.tables.len());
        self.tables.push(SymbolTable::new(Some(parent)));
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.tables[scope.0].parent
    }

    pub fn is_global(&self, scope: ScopeId) -> bool {
        scope == ScopeId::GLOBAL
    }

    /// Define a variable in `scope`. Fails on redefinition in the same
    /// table and, outside the global table, on shadowing any enclosing name.
    pub fn define(&mut self, scope: ScopeId, name: &str, ty: TypeExpr, span: Span) -> Result<()> {
        if self.tables[scope.0].symbols.contains_key(name) {
            return Err(Error::DuplicateDefinition { name: name.to_string(), span });
        }

        let kind = if self.is_global(scope) {
            SymbolScope::Global
        } else {
            let mut ancestor = self.parent(scope);
            while let Some(id) = ancestor {
                if self.tables[id.0].symbols.contains_key(name) {
                    return Err(Error::IllegalShadowing { name: name.to_string(), span });
                }
                ancestor = self.parent(id);
            }
            SymbolScope::Local
        };

        self.tables[scope.0].insert(name, SymbolType::Pending(ty), kind);
        Ok(())
    }

    /// Define a function parameter. Parameters may shadow globals.
    pub fn define_func_parameter(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: TypeExpr,
        span: Span,
    ) -> Result<()> {
        if self.tables[scope.0].symbols.contains_key(name) {
            return Err(Error::DuplicateDefinition { name: name.to_string(), span });
        }
        self.tables[scope.0].insert(name, SymbolType::Pending(ty), SymbolScope::Local);
        Ok(())
    }

    /// Declare a struct type in the global namespace
    pub fn define_type(&mut self, name: &str, ty: TypeExpr, span: Span) -> Result<()> {
        self.define_global(name, ty, SymbolScope::Type, span)
    }

    /// Declare a function in the global namespace
    pub fn define_func(&mut self, name: &str, signature: TypeExpr, span: Span) -> Result<()> {
        self.define_global(name, signature, SymbolScope::Func, span)
    }

    fn define_global(&mut self, name: &str, ty: TypeExpr, kind: SymbolScope, span: Span) -> Result<()> {
        let global = &mut self.tables[ScopeId::GLOBAL.0];
        if global.symbols.contains_key(name) {
            return Err(Error::DuplicateDefinition { name: name.to_string(), span });
        }
        global.insert(name, SymbolType::Pending(ty), kind);
        Ok(())
    }

    /// Look `name` up in `scope` and then its ancestors, returning the
    /// owning table alongside the symbol
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Symbol)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.tables[id.0].symbols.get(name) {
                return Some((id, symbol));
            }
            current = self.parent(id);
        }
        None
    }

    pub fn resolve_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Symbol> {
        let (owner, _) = self.resolve(scope, name)?;
        self.tables[owner.0].symbols.get_mut(name)
    }

    /// Back-fill the type of a symbol. Returns `false` if it is not visible.
    pub fn set_type(&mut self, scope: ScopeId, name: &str, ty: Type) -> bool {
        match self.resolve_mut(scope, name) {
            Some(symbol) => {
                symbol.ty = SymbolType::Resolved(ty);
                true
            }
            None => false,
        }
    }

    /// Assign stack slots to the variables of `scope`. Idempotent.
    pub fn compute_stack(&mut self, scope: ScopeId) {
        if self.is_global(scope) {
            return;
        }
        let table = &mut self.tables[scope.0];
        if table.stack_space.is_some() {
            return;
        }
        for symbol in table.symbols.values_mut() {
            if symbol.scope == SymbolScope::Local {
                symbol.offset = Some(symbol.ordinal * WORD_SIZE);
            }
        }
        table.stack_space = Some(align16(table.num_definitions * WORD_SIZE));
    }

    /// Bytes reserved on the stack by `scope`; zero for the global table
    pub fn stack_space(&self, scope: ScopeId) -> usize {
        self.tables[scope.0].stack_space.unwrap_or(0)
    }

    /// Number of variables defined directly in `scope`
    pub fn num_definitions(&self, scope: ScopeId) -> usize {
        self.tables[scope.0].num_definitions
    }

    /// Run-time location of `name` as seen from `scope`
    pub fn locate(&self, scope: ScopeId, name: &str) -> Option<Location> {
        let mut depth = 0;
        let mut current = Some(scope);
        while let Some(id) = current {
            let table = &self.tables[id.0];
            if let Some(symbol) = table.symbols.get(name) {
                return match symbol.scope {
                    SymbolScope::Global => Some(Location::Global(name.to_string())),
                    SymbolScope::Func => Some(Location::Func(name.to_string())),
                    SymbolScope::Local => symbol.offset.map(|offset| Location::Stack(depth + offset)),
                    SymbolScope::Type => None,
                };
            }
            depth += table.stack_space.unwrap_or(0);
            current = table.parent;
        }
        None
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
