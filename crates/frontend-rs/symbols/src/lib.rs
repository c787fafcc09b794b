//! Object Pascal Declarations
//!
//! This crate owns the binding side of the front end: declarations, the
//! arena they live in, the case-insensitive per-scope maps that name them,
//! and the scope stack the parser consults while it builds the tree.
//!
//! AST nodes never own declarations. A resolved identifier stores a
//! [`DeclId`] handle into a [`DeclArena`]; a declaration stores the
//! [`NodeId`] of the AST node that introduced it.

use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;
use tokens::Location;

mod scope;

pub use scope::{builtin_scope, ImportedUnit, Scope, ScopeKind, ScopeStack, BUILTIN_TYPES};

/// Identity of a declaring AST node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Handle of a declaration in a [`DeclArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A name occurrence. Binding compares names case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub name: String,
    pub location: Option<Location>,
}

impl Ident {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location: Some(location),
        }
    }

    /// An identifier with no source location
    pub fn unlocated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    /// Scope key (uppercased name)
    pub fn key(&self) -> String {
        self.name.to_ascii_uppercase()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// What a declaration introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    /// Predeclared type name
    Builtin,
    Label,
    Constant,
    Type,
    Variable,
    ThreadVar,
    Parameter,
    Field,
    Property,
    Routine,
    EnumElement,
    /// Implicit `Result` of a function body
    FunctionResult,
    /// Implicit `Self` of a method body
    SelfRef,
    /// `E` in `on E: Exception do`
    ExceptionVar,
}

/// Structure of a type declaration, as far as member binding needs it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeShape {
    Opaque,
    Alias(DeclId),
    Pointer(Option<DeclId>),
    Array(Option<DeclId>),
    /// Record, class, object or interface; members are kept in the arena
    Structured,
    ClassRef(Option<DeclId>),
}

/// One declared name bound to the node that introduces it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub ident: Ident,
    pub kind: DeclKind,
    /// Declaring node; `None` for predeclared names
    pub node: Option<NodeId>,
    /// Declared without a body or definition (`forward`, `external`,
    /// interface headings, class method headings, `class;`)
    pub forward: bool,
    /// Node of the full definition that completed a forward declaration
    pub definition: Option<NodeId>,
    /// Type of a value, or result type of a function
    pub type_decl: Option<DeclId>,
    pub shape: TypeShape,
    /// Ancestor of a class, object or interface type
    pub ancestor: Option<DeclId>,
    pub overload: bool,
    /// Number of formal parameters; `None` when a definition omits its list
    pub param_count: Option<usize>,
    /// Next routine in an overload set
    pub next_overload: Option<DeclId>,
}

impl Declaration {
    pub fn new(ident: Ident, kind: DeclKind, node: Option<NodeId>) -> Self {
        Self {
            ident,
            kind,
            node,
            forward: false,
            definition: None,
            type_decl: None,
            shape: TypeShape::Opaque,
            ancestor: None,
            overload: false,
            param_count: None,
            next_overload: None,
        }
    }

    pub fn with_type(mut self, type_decl: Option<DeclId>) -> Self {
        self.type_decl = type_decl;
        self
    }

    pub fn with_shape(mut self, shape: TypeShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    /// Forward declaration still waiting for its definition
    pub fn is_pending(&self) -> bool {
        self.forward && self.definition.is_none()
    }
}

/// A name declared twice in one scope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate identifier '{name}'")]
pub struct DuplicateDeclaration {
    pub name: String,
    pub location: Option<Location>,
    pub previous: DeclId,
    pub previous_location: Option<Location>,
}

/// Case-insensitive name to declaration map of one scope
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeclMap {
    index: FxHashMap<String, DeclId>,
    order: Vec<DeclId>,
}

impl DeclMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<DeclId> {
        self.index.get(&name.to_ascii_uppercase()).copied()
    }

    fn get_key(&self, key: &str) -> Option<DeclId> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Declarations in the order they were bound
    pub fn iter(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.order.iter().copied()
    }

    fn bind(&mut self, key: String, id: DeclId) {
        self.index.insert(key, id);
        self.order.push(id);
    }
}

/// Owner of every declaration produced during a parse run
#[derive(Debug, Clone, Default)]
pub struct DeclArena {
    decls: Vec<Declaration>,
    /// Members of structured types and parameters of routines
    members: FxHashMap<DeclId, DeclMap>,
}

/// Bound on alias and ancestor chains, which may be cyclic in bad input
const MAX_CHAIN: usize = 64;

impl DeclArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i as u32), d))
    }

    /// Member map of a structured type, or parameter map of a routine
    pub fn members(&self, id: DeclId) -> Option<&DeclMap> {
        self.members.get(&id)
    }

    pub fn set_members(&mut self, id: DeclId, members: DeclMap) {
        self.members.insert(id, members);
    }

    pub fn take_members(&mut self, id: DeclId) -> Option<DeclMap> {
        self.members.remove(&id)
    }

    /// The overload set starting at `head`
    pub fn overloads(&self, head: DeclId) -> Vec<DeclId> {
        let mut chain = vec![head];
        let mut current = head;
        while let Some(next) = self.get(current).next_overload {
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    /// Member of an overload set whose parameter count matches `count`
    pub fn overload_with_arity(&self, head: DeclId, count: usize) -> Option<DeclId> {
        self.overloads(head)
            .into_iter()
            .find(|id| self.get(*id).param_count.unwrap_or(0) == count)
    }

    /// Bind `decl` in `map`.
    ///
    /// `outer` is a map that counts as the same scope for duplicate checks
    /// and forward completion (a unit's interface map seen from its
    /// implementation section). A definition that matches a pending forward
    /// declaration completes it and returns the forward's id; routines
    /// marked `overload` join the overload set of the existing name.
    pub fn declare_in(
        &mut self,
        map: &mut DeclMap,
        outer: Option<&DeclMap>,
        decl: Declaration,
    ) -> Result<DeclId, DuplicateDeclaration> {
        let key = decl.ident.key();
        let head = match map.get_key(&key).or_else(|| outer.and_then(|o| o.get_key(&key))) {
            Some(head) => head,
            None => {
                let id = self.alloc(decl);
                map.bind(key, id);
                return Ok(id);
            }
        };

        if !decl.forward {
            if let Some(pending) = self.pending_match(head, &decl) {
                self.get_mut(pending).definition = decl.node;
                return Ok(pending);
            }
        }

        let head_decl = self.get(head);
        let overloadable = decl.kind == DeclKind::Routine
            && head_decl.kind == DeclKind::Routine
            && (decl.overload || head_decl.overload);
        let same_shape = self
            .overloads(head)
            .into_iter()
            .any(|id| self.get(id).param_count.unwrap_or(0) == decl.param_count.unwrap_or(0));
        if overloadable && !same_shape {
            let chain = self.overloads(head);
            let id = self.alloc(decl);
            if let Some(last) = chain.last() {
                self.get_mut(*last).next_overload = Some(id);
            }
            return Ok(id);
        }

        Err(DuplicateDeclaration {
            name: decl.ident.name.clone(),
            location: decl.ident.location,
            previous: head,
            previous_location: self.get(head).ident.location,
        })
    }

    fn pending_match(&self, head: DeclId, decl: &Declaration) -> Option<DeclId> {
        self.overloads(head).into_iter().find(|id| {
            let candidate = self.get(*id);
            candidate.is_pending()
                && candidate.kind == decl.kind
                && (decl.param_count.is_none() || candidate.param_count == decl.param_count)
        })
    }

    /// Follow aliases, pointers and class references to a structured type
    pub fn structured(&self, mut id: DeclId) -> Option<DeclId> {
        for _ in 0..MAX_CHAIN {
            let decl = self.get(id);
            id = match decl.shape {
                TypeShape::Structured => return Some(id),
                TypeShape::Alias(target) => target,
                TypeShape::Pointer(Some(target)) | TypeShape::ClassRef(Some(target)) => target,
                _ => return None,
            };
        }
        None
    }

    /// Element type of an array type, following aliases
    pub fn element_type(&self, mut id: DeclId) -> Option<DeclId> {
        for _ in 0..MAX_CHAIN {
            id = match self.get(id).shape {
                TypeShape::Array(element) => return element,
                TypeShape::Alias(target) => target,
                _ => return None,
            };
        }
        None
    }

    /// Target type of a pointer type, following aliases
    pub fn pointee(&self, mut id: DeclId) -> Option<DeclId> {
        for _ in 0..MAX_CHAIN {
            id = match self.get(id).shape {
                TypeShape::Pointer(target) => return target,
                TypeShape::Alias(target) => target,
                _ => return None,
            };
        }
        None
    }

    /// Look `name` up among the members of a type and its ancestors
    pub fn find_member(&self, type_id: DeclId, name: &str) -> Option<DeclId> {
        let key = name.to_ascii_uppercase();
        let mut current = self.structured(type_id);
        for _ in 0..MAX_CHAIN {
            let id = current?;
            if let Some(found) = self.members(id).and_then(|m| m.get_key(&key)) {
                return Some(found);
            }
            current = self.get(id).ancestor.and_then(|a| self.structured(a));
        }
        None
    }

    /// Type a designator has after naming `id`: the declared type of a
    /// value, the result type of a function, or the type itself.
    pub fn value_type(&self, id: DeclId) -> Option<DeclId> {
        let decl = self.get(id);
        match decl.kind {
            DeclKind::Type => Some(id),
            DeclKind::Builtin | DeclKind::Label | DeclKind::EnumElement => None,
            _ => decl.type_decl,
        }
    }
}
