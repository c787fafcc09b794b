//! Declaration and reference binding
//!
//! Every production that introduces a name goes through [`Parser::declare`],
//! every production that uses one through [`Parser::reference`]. Both record
//! non-fatal diagnostics in the session; strict mode turns the first one
//! into a fatal error.

use ast::{IdentRef, QualifiedIdent};
use errors::{Diagnostic, ParserError, ParserResult};
use symbols::{DeclId, DeclKind, Declaration, Ident, TypeShape};

impl<'s> super::Parser<'s> {
    /// Record a non-fatal diagnostic
    pub(crate) fn report(&mut self, diagnostic: Diagnostic) -> ParserResult<()> {
        let diagnostic = match &self.file {
            Some(file) => diagnostic.with_file(file.clone()),
            None => diagnostic,
        };
        if self.session.options.strict {
            return Err(ParserError::Strict {
                diagnostic: Box::new(diagnostic),
            });
        }
        self.session.diagnostics.push(diagnostic);
        Ok(())
    }

    /// Bind `decl` in the innermost scope. A duplicate is reported and
    /// yields `None`.
    pub(crate) fn declare(&mut self, decl: Declaration) -> ParserResult<Option<DeclId>> {
        match self.scopes.declare(&mut self.session.arena, decl) {
            Ok(id) => Ok(Some(id)),
            Err(dup) => {
                self.report(Diagnostic::duplicate(&dup.name, dup.location, dup.previous_location))?;
                Ok(None)
            }
        }
    }

    /// Bind `decl` in the block enclosing any record or class body being
    /// parsed
    pub(crate) fn declare_outside_members(&mut self, decl: Declaration) -> ParserResult<Option<DeclId>> {
        match self.scopes.declare_outside_members(&mut self.session.arena, decl) {
            Ok(id) => Ok(Some(id)),
            Err(dup) => {
                self.report(Diagnostic::duplicate(&dup.name, dup.location, dup.previous_location))?;
                Ok(None)
            }
        }
    }

    /// Bind a name the language introduces implicitly (`Self`, `Result`).
    /// An explicit declaration of the same name takes precedence.
    pub(crate) fn declare_implicit(&mut self, decl: Declaration) {
        if !self.scopes.current().decls.contains(&decl.ident.name) {
            let _ = self.scopes.declare(&mut self.session.arena, decl);
        }
    }

    /// Bind `decl` among the members of a structured type
    pub(crate) fn declare_member(&mut self, type_id: DeclId, decl: Declaration) -> ParserResult<Option<DeclId>> {
        let arena = &mut self.session.arena;
        let mut members = arena.take_members(type_id).unwrap_or_default();
        let result = arena.declare_in(&mut members, None, decl);
        arena.set_members(type_id, members);
        match result {
            Ok(id) => Ok(Some(id)),
            Err(dup) => {
                self.report(Diagnostic::duplicate(&dup.name, dup.location, dup.previous_location))?;
                Ok(None)
            }
        }
    }

    /// Resolve a use of `ident` against the scope stack
    pub(crate) fn reference(&mut self, ident: Ident) -> ParserResult<IdentRef> {
        let resolved = self.scopes.resolve(&self.session.arena, &ident.name);
        if resolved.is_none() {
            self.report(Diagnostic::unresolved(&ident.name, ident.location))?;
        }
        Ok(IdentRef::new(ident, resolved))
    }

    /// Resolve `unit.name`
    pub(crate) fn reference_qualified(&mut self, unit: Ident, ident: Ident) -> ParserResult<QualifiedIdent> {
        let resolved = self
            .scopes
            .resolve_qualified(&self.session.arena, &unit.name, &ident.name);
        if resolved.is_none() {
            self.report(Diagnostic::unresolved(&ident.name, ident.location))?;
        }
        Ok(QualifiedIdent {
            unit: Some(unit),
            ident: IdentRef::new(ident, resolved),
        })
    }

    /// Whether `name` followed by `.` should be read as a unit qualifier
    pub(crate) fn is_unit_qualifier(&self, name: &str) -> bool {
        self.at_symbol(".") && self.peek_is_ident() && self.scopes.is_unit(name)
    }

    /// A type name, optionally unit-qualified, as used in ancestor lists,
    /// handlers and property types
    pub(crate) fn parse_type_name(&mut self) -> ParserResult<QualifiedIdent> {
        let first = self.expect_ident()?;
        if self.is_unit_qualifier(&first.name) {
            self.advance()?;
            let name = self.expect_ident()?;
            return self.reference_qualified(first, name);
        }
        Ok(QualifiedIdent::simple(self.reference(first)?))
    }

    /// Allocate a type declaration that has no name of its own
    pub(crate) fn anonymous_type(&mut self, shape: TypeShape) -> DeclId {
        let decl = Declaration::new(Ident::unlocated(""), DeclKind::Type, None).with_shape(shape);
        self.session.arena.alloc(decl)
    }

    /// Type that values of declaration `id` have
    pub(crate) fn value_type(&self, id: Option<DeclId>) -> Option<DeclId> {
        id.and_then(|id| self.session.arena.value_type(id))
    }
}
