//! Lexical scope stack

use crate::{DeclArena, DeclId, DeclKind, DeclMap, Declaration, DuplicateDeclaration, Ident};

/// Predeclared ordinal, real and string type names
pub const BUILTIN_TYPES: &[&str] = &[
    "Integer",
    "Cardinal",
    "ShortInt",
    "SmallInt",
    "LongInt",
    "Int64",
    "UInt64",
    "Byte",
    "Word",
    "LongWord",
    "DWord",
    "NativeInt",
    "NativeUInt",
    "Boolean",
    "ByteBool",
    "WordBool",
    "LongBool",
    "Char",
    "AnsiChar",
    "WideChar",
    "Real",
    "Real48",
    "Single",
    "Double",
    "Extended",
    "Comp",
    "Currency",
    "ShortString",
    "AnsiString",
    "WideString",
    "UnicodeString",
    "Pointer",
    "PChar",
    "PAnsiChar",
    "PWideChar",
    "Variant",
];

/// Allocate the predeclared names once per parse run
pub fn builtin_scope(arena: &mut DeclArena) -> DeclMap {
    let mut map = DeclMap::new();
    for name in BUILTIN_TYPES {
        let decl = Declaration::new(Ident::unlocated(*name), DeclKind::Builtin, None);
        // names in the table are distinct
        let _ = arena.declare_in(&mut map, None, decl);
    }
    map
}

/// Region a scope belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Builtins,
    Program,
    Interface,
    Implementation,
    Routine,
    /// Body of a record, class, object or interface, or a method body's
    /// view of its class
    Members,
    With,
    Handler,
    /// Caller-seeded scope for fragment parsing
    Seeded,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub decls: DeclMap,
    /// Type whose members (ancestors included) are visible in this scope
    pub members_of: Option<DeclId>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            decls: DeclMap::new(),
            members_of: None,
        }
    }
}

/// Exported declarations of a unit named in a `uses` clause
#[derive(Debug, Clone)]
pub struct ImportedUnit {
    pub name: String,
    pub exports: DeclMap,
}

/// Stack of active scopes plus the units made visible by `uses`.
///
/// Lookup order is innermost scope first, then imported units (the last
/// one named wins), then the predeclared names.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
    imports: Vec<ImportedUnit>,
    own_unit: Option<String>,
}

impl ScopeStack {
    pub fn new(builtins: DeclMap) -> Self {
        let mut scope = Scope::new(ScopeKind::Builtins);
        scope.decls = builtins;
        Self {
            scopes: vec![scope],
            imports: Vec::new(),
            own_unit: None,
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    /// Push a scope that starts out with `decls`
    pub fn push_with_decls(&mut self, kind: ScopeKind, decls: DeclMap) {
        let mut scope = Scope::new(kind);
        scope.decls = decls;
        self.scopes.push(scope);
    }

    /// Push a scope exposing the members of `type_id`
    pub fn push_members(&mut self, kind: ScopeKind, type_id: Option<DeclId>) {
        let mut scope = Scope::new(kind);
        scope.members_of = type_id;
        self.scopes.push(scope);
    }

    /// Pop the innermost scope. The predeclared scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.current().kind
    }

    /// Innermost enclosing scope of the given kind
    pub fn innermost(&self, kind: ScopeKind) -> Option<&Scope> {
        self.scopes.iter().rev().find(|s| s.kind == kind)
    }

    /// Bind `decl` in the innermost scope. An implementation section treats
    /// its unit's interface scope as part of the same scope.
    pub fn declare(
        &mut self,
        arena: &mut DeclArena,
        decl: Declaration,
    ) -> Result<DeclId, DuplicateDeclaration> {
        self.declare_at(self.scopes.len() - 1, arena, decl)
    }

    /// Bind `decl` in the innermost scope that is not a member scope, so
    /// names introduced inside a record or class body belong to the block
    /// around it.
    pub fn declare_outside_members(
        &mut self,
        arena: &mut DeclArena,
        decl: Declaration,
    ) -> Result<DeclId, DuplicateDeclaration> {
        let index = self
            .scopes
            .iter()
            .rposition(|s| s.kind != ScopeKind::Members)
            .unwrap_or(0);
        self.declare_at(index, arena, decl)
    }

    fn declare_at(
        &mut self,
        index: usize,
        arena: &mut DeclArena,
        decl: Declaration,
    ) -> Result<DeclId, DuplicateDeclaration> {
        let chained = index >= 1
            && self.scopes[index].kind == ScopeKind::Implementation
            && self.scopes[index - 1].kind == ScopeKind::Interface;
        if chained {
            let (outer, inner) = self.scopes.split_at_mut(index);
            arena.declare_in(&mut inner[0].decls, Some(&outer[index - 1].decls), decl)
        } else {
            arena.declare_in(&mut self.scopes[index].decls, None, decl)
        }
    }

    /// Innermost-first lookup
    pub fn resolve(&self, arena: &DeclArena, name: &str) -> Option<DeclId> {
        for scope in self.scopes[1..].iter().rev() {
            if let Some(id) = scope.decls.get(name) {
                return Some(id);
            }
            if let Some(id) = scope.members_of.and_then(|t| arena.find_member(t, name)) {
                return Some(id);
            }
        }
        for unit in self.imports.iter().rev() {
            if let Some(id) = unit.exports.get(name) {
                return Some(id);
            }
        }
        self.scopes[0].decls.get(name)
    }

    /// Look `name` up in the exports of the named unit. The unit being
    /// parsed may qualify its own names.
    pub fn resolve_qualified(&self, arena: &DeclArena, unit: &str, name: &str) -> Option<DeclId> {
        if self.is_own_unit(unit) {
            return self.resolve(arena, name);
        }
        self.imported(unit).and_then(|u| u.exports.get(name))
    }

    pub fn imported(&self, unit: &str) -> Option<&ImportedUnit> {
        self.imports
            .iter()
            .rev()
            .find(|u| u.name.eq_ignore_ascii_case(unit))
    }

    /// Whether `name` names a unit visible for qualification
    pub fn is_unit(&self, name: &str) -> bool {
        self.is_own_unit(name) || self.imported(name).is_some()
    }

    fn is_own_unit(&self, name: &str) -> bool {
        self.own_unit
            .as_deref()
            .map_or(false, |own| own.eq_ignore_ascii_case(name))
    }

    pub fn import_unit(&mut self, name: impl Into<String>, exports: DeclMap) {
        self.imports.push(ImportedUnit {
            name: name.into(),
            exports,
        });
    }

    pub fn set_own_unit(&mut self, name: impl Into<String>) {
        self.own_unit = Some(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;
    use tokens::{Location, Position};

    fn decl(name: &str, kind: DeclKind, node: u32) -> Declaration {
        Declaration::new(
            Ident::new(name, Location::at(Position::new(node, 1, 0))),
            kind,
            Some(NodeId(node)),
        )
    }

    fn stack(arena: &mut DeclArena) -> ScopeStack {
        let builtins = builtin_scope(arena);
        ScopeStack::new(builtins)
    }

    #[test]
    fn test_builtins_resolve_case_insensitively() {
        let mut arena = DeclArena::new();
        let scopes = stack(&mut arena);
        let id = scopes.resolve(&arena, "INTEGER").unwrap();
        assert_eq!(arena.get(id).kind, DeclKind::Builtin);
        assert!(scopes.resolve(&arena, "writeln").is_none());
    }

    #[test]
    fn test_shadowing_innermost_first() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        scopes.push_scope(ScopeKind::Program);
        let outer = scopes.declare(&mut arena, decl("X", DeclKind::Variable, 1)).unwrap();
        scopes.push_scope(ScopeKind::Routine);
        let inner = scopes.declare(&mut arena, decl("X", DeclKind::Parameter, 2)).unwrap();
        assert_eq!(scopes.resolve(&arena, "x"), Some(inner));
        scopes.pop_scope();
        assert_eq!(scopes.resolve(&arena, "x"), Some(outer));
    }

    #[test]
    fn test_program_may_shadow_builtin() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        scopes.push_scope(ScopeKind::Program);
        let mine = scopes.declare(&mut arena, decl("Integer", DeclKind::Type, 1)).unwrap();
        assert_eq!(scopes.resolve(&arena, "Integer"), Some(mine));
    }

    #[test]
    fn test_implementation_sees_interface_as_same_scope() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        scopes.push_scope(ScopeKind::Interface);
        scopes.declare(&mut arena, decl("Count", DeclKind::Variable, 1)).unwrap();
        scopes.push_scope(ScopeKind::Implementation);
        let err = scopes.declare(&mut arena, decl("Count", DeclKind::Variable, 2));
        assert!(err.is_err());
    }

    #[test]
    fn test_qualified_lookup() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        let mut exports = DeclMap::new();
        let id = arena
            .declare_in(&mut exports, None, decl("Pi2", DeclKind::Constant, 1))
            .unwrap();
        scopes.import_unit("MathUtil", exports);
        scopes.set_own_unit("Main");
        scopes.push_scope(ScopeKind::Interface);
        let local = scopes.declare(&mut arena, decl("Local", DeclKind::Constant, 2)).unwrap();

        assert!(scopes.is_unit("mathutil"));
        assert_eq!(scopes.resolve_qualified(&arena, "MATHUTIL", "pi2"), Some(id));
        assert_eq!(scopes.resolve_qualified(&arena, "Other", "Pi2"), None);
        assert_eq!(scopes.resolve_qualified(&arena, "Main", "Local"), Some(local));
        assert_eq!(scopes.resolve(&arena, "Pi2"), Some(id));
    }

    #[test]
    fn test_later_import_wins() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        let mut a = DeclMap::new();
        arena.declare_in(&mut a, None, decl("Log", DeclKind::Routine, 1)).unwrap();
        let mut b = DeclMap::new();
        let from_b = arena.declare_in(&mut b, None, decl("Log", DeclKind::Routine, 2)).unwrap();
        scopes.import_unit("A", a);
        scopes.import_unit("B", b);
        assert_eq!(scopes.resolve(&arena, "Log"), Some(from_b));
    }

    #[test]
    fn test_declare_outside_members_skips_member_scopes() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        scopes.push_scope(ScopeKind::Program);
        scopes.push_members(ScopeKind::Members, None);
        scopes.push_members(ScopeKind::Members, None);
        let red = scopes
            .declare_outside_members(&mut arena, decl("Red", DeclKind::EnumElement, 1))
            .unwrap();
        assert!(scopes.current().decls.get("Red").is_none());
        scopes.pop_scope();
        scopes.pop_scope();
        assert_eq!(scopes.current().decls.get("Red"), Some(red));
    }

    #[test]
    fn test_builtin_scope_is_never_popped() {
        let mut arena = DeclArena::new();
        let mut scopes = stack(&mut arena);
        assert!(scopes.pop_scope().is_none());
        assert_eq!(scopes.depth(), 1);
    }
}
