//! Typing environment shared by every node of a function while it is being
//! optimized and lowered.

use hashbrown::HashMap;

use crate::{
    frontend::{
        ast::{self, Identifier},
        intern::InternedSymbol,
        lexer::Span,
    },
    index::IndexVec,
    middle::{
        error::{CompileError, CompileErrorKind, CompileResult, TypeBoundary},
        lir::{FunctionId, RegisterId},
        ty::Type,
    },
};

/// Typed signature of a function in the module
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub id: FunctionId,
    pub name: InternedSymbol,
    pub parameters: Vec<Type>,
    pub return_type: Type,
}

/// Every function signature of a module. Built once before any function
/// body is compiled and only read afterwards, so it can be shared between
/// worker threads.
#[derive(Debug, Default)]
pub struct SignatureTable {
    signatures: IndexVec<FunctionId, Signature>,
    by_name: HashMap<InternedSymbol, FunctionId>,
}

impl SignatureTable {
    /// Assigns function IDs in declaration order
    pub fn build(module: &ast::Module) -> CompileResult<Self> {
        let mut table = Self::default();

        for function in &module.functions {
            table.declare(&function.signature)?;
        }

        Ok(table)
    }

    pub fn declare(&mut self, signature: &ast::FunctionSignature) -> CompileResult<FunctionId> {
        let name = signature.name.symbol;

        if self.by_name.contains_key(&name) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateFunction(name),
                signature.name.span,
            ));
        }

        let id = self.signatures.next_index();
        self.signatures.push(Signature {
            id,
            name,
            parameters: signature.parameters.iter().map(|p| p.ty).collect(),
            return_type: signature.return_type,
        });
        self.by_name.insert(name, id);

        Ok(id)
    }

    /// Looks up the lowered handle of a function by name
    pub fn function_handle(&self, name: InternedSymbol) -> Option<FunctionId> {
        self.by_name.get(&name).copied()
    }

    pub fn lookup(&self, name: &Identifier) -> CompileResult<&Signature> {
        self.function_handle(name.symbol)
            .and_then(|id| self.signatures.get(id))
            .ok_or_else(|| {
                CompileError::new(CompileErrorKind::UndefinedFunction(name.symbol), name.span)
            })
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// A local variable or parameter visible in the function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub ty: Type,
    /// Assigned the first time the binding is lowered
    pub register: Option<RegisterId>,
    pub span: Span,
}

/// Per-function compilation state. Bindings live in lexical scopes: the
/// outermost scope holds the parameters and every block pushes its own.
#[derive(Debug)]
pub struct FunctionContext<'m> {
    pub name: InternedSymbol,
    pub return_type: Type,
    pub signatures: &'m SignatureTable,
    scopes: Vec<HashMap<InternedSymbol, Binding>>,
    function: Option<FunctionId>,
}

impl<'m> FunctionContext<'m> {
    pub fn new(name: InternedSymbol, return_type: Type, signatures: &'m SignatureTable) -> Self {
        Self {
            name,
            return_type,
            signatures,
            scopes: vec![HashMap::new()],
            function: None,
        }
    }

    /// Creates the context for one of the module's function definitions
    pub fn for_function(
        function: &ast::FunctionDefinition,
        signatures: &'m SignatureTable,
    ) -> Self {
        Self::new(
            function.signature.name.symbol,
            function.signature.return_type,
            signatures,
        )
    }

    /// Records the lowered handle of the function being compiled
    pub fn set_function_handle(&mut self, function: FunctionId) {
        self.function = Some(function);
    }

    /// The lowered handle of the enclosing function, needed to create blocks
    /// inside of it
    pub fn function_handle(&self, span: Span) -> CompileResult<FunctionId> {
        self.function.ok_or_else(|| {
            CompileError::malformed("lowering outside of a function with a known handle", span)
        })
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drops every binding of the innermost scope. The parameter scope is
    /// never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Introduces a binding in the innermost scope. Redeclaring a name of the
    /// same scope with the same type reuses the existing binding (and its
    /// register); a binding of an outer scope is shadowed instead.
    pub fn declare(&mut self, name: &Identifier, ty: Type) -> CompileResult<&mut Binding> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(CompileError::malformed(
                "declaring a binding outside of any scope",
                name.span,
            ));
        };

        let binding = scope.entry(name.symbol).or_insert(Binding {
            ty,
            register: None,
            span: name.span,
        });

        if binding.ty != ty {
            return Err(CompileError::type_mismatch(
                TypeBoundary::LetRedeclaration,
                binding.ty,
                ty,
                name.span,
            ));
        }

        Ok(binding)
    }

    /// Finds the binding a name refers to, innermost scope first
    pub fn lookup(&self, name: &Identifier) -> CompileResult<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name.symbol))
            .ok_or_else(|| {
                CompileError::new(CompileErrorKind::UndefinedVariable(name.symbol), name.span)
            })
    }
}
