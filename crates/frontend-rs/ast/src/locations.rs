//! Location clearing and range recomputation
//!
//! Two trees parsed from layouts that differ only in whitespace and
//! comments compare equal once their locations are cleared.

use crate::*;

/// Bulk-clear every `Ident` location and every node range in a subtree
pub trait ClearLocations {
    fn clear_locations(&mut self);
}

/// Nodes that carry their own textual range
pub trait HasRange {
    fn range(&self) -> Option<Location>;

    fn set_range(&mut self, range: Option<Location>);

    /// Clear this node's range only; children keep theirs
    fn clear_range(&mut self) {
        self.set_range(None);
    }

    /// Recompute this node's range from the identifier locations beneath it
    fn recompute_range(&mut self);
}

impl<T: ClearLocations> ClearLocations for Vec<T> {
    fn clear_locations(&mut self) {
        self.iter_mut().for_each(T::clear_locations);
    }
}

impl<T: ClearLocations> ClearLocations for Option<T> {
    fn clear_locations(&mut self) {
        if let Some(inner) = self {
            inner.clear_locations();
        }
    }
}

impl<T: ClearLocations> ClearLocations for Box<T> {
    fn clear_locations(&mut self) {
        (**self).clear_locations();
    }
}

impl ClearLocations for Ident {
    fn clear_locations(&mut self) {
        self.location = None;
    }
}

macro_rules! clear_fields {
    ($($ty:ty { $($field:ident),* });* $(;)?) => {
        $(
            impl ClearLocations for $ty {
                fn clear_locations(&mut self) {
                    $( self.$field.clear_locations(); )*
                }
            }
        )*
    };
}

clear_fields! {
    IdentRef { ident };
    QualifiedIdent { unit, ident };
    Program { ident, params, block };
    ProgramBlock { uses, block };
    UsesClause { items };
    UsesClauseItem { ident };
    Unit { ident, portability, interface, implementation, init };
    InterfaceSection { uses, decls };
    ImplementationSection { uses, decls };
    InitSection { initialization, finalization };
    LabelSection { labels };
    LabelDecl { ident };
    ConstSection { decls };
    ConstDecl { ident, type_expr, value, portability };
    RecordConstField { field, value };
    TypeSection { decls };
    TypeDecl { ident, type_expr, portability };
    VarSection { decls };
    VarDecl { idents, type_expr, absolute, init, portability };
    RoutineDecl { heading, directives, body };
    RoutineHeading { qualifier, ident, params, result };
    FormalParam { idents, type_expr, default };
    EnumElement { ident, value };
    ArrayType { indexes, element };
    RecordType { fields, variant };
    FieldDecl { idents, type_expr };
    VariantPart { tag, tag_type, cases };
    VariantCase { labels, fields, variant };
    ProcedureType { params, result };
    ClassType { ancestors, guid, sections };
    ClassSection { members };
    PropertyDecl { ident, params, type_ref, specifiers };
    SetElement { low, high };
    Designator { root, items };
    Arg { value, width, decimals };
    CaseStmt { selector, arms, else_branch };
    CaseArm { labels, statement };
    CaseLabel { low, high };
    TryExceptStmt { statements, handlers, else_branch, except_statements };
    ExceptionHandler { ident, type_ref, statement };
}

impl ClearLocations for Block {
    fn clear_locations(&mut self) {
        self.decls.clear_locations();
        self.body.clear_locations();
        self.range = None;
    }
}

impl ClearLocations for CompoundStmt {
    fn clear_locations(&mut self) {
        self.statements.clear_locations();
        self.range = None;
    }
}

impl ClearLocations for AsmStmt {
    fn clear_locations(&mut self) {
        self.range = None;
    }
}

impl ClearLocations for InterfaceDecl {
    fn clear_locations(&mut self) {
        match self {
            InterfaceDecl::Const(s) => s.clear_locations(),
            InterfaceDecl::Type(s) => s.clear_locations(),
            InterfaceDecl::Var(s) => s.clear_locations(),
            InterfaceDecl::Heading(r) => r.clear_locations(),
        }
    }
}

impl ClearLocations for DeclSection {
    fn clear_locations(&mut self) {
        match self {
            DeclSection::Label(s) => s.clear_locations(),
            DeclSection::Const(s) => s.clear_locations(),
            DeclSection::Type(s) => s.clear_locations(),
            DeclSection::Var(s) => s.clear_locations(),
            DeclSection::Routine(r) => r.clear_locations(),
        }
    }
}

impl ClearLocations for ConstValue {
    fn clear_locations(&mut self) {
        match self {
            ConstValue::Expr(e) => e.clear_locations(),
            ConstValue::Array(items) => items.clear_locations(),
            ConstValue::Record(fields) => fields.clear_locations(),
        }
    }
}

impl ClearLocations for RoutineDirective {
    fn clear_locations(&mut self) {
        match self {
            RoutineDirective::External { library, name } => {
                library.clear_locations();
                name.clear_locations();
            }
            RoutineDirective::Message(e) => e.clear_locations(),
            RoutineDirective::CallingConvention(i) | RoutineDirective::Portability(i) => {
                i.clear_locations()
            }
            _ => {}
        }
    }
}

impl ClearLocations for TypeExpr {
    fn clear_locations(&mut self) {
        match self {
            TypeExpr::Named(q) | TypeExpr::ClassOf(q) => q.clear_locations(),
            TypeExpr::String(len) => len.clear_locations(),
            TypeExpr::Subrange { low, high } => {
                low.clear_locations();
                high.clear_locations();
            }
            TypeExpr::Enumerated(elements) => elements.clear_locations(),
            TypeExpr::Array(a) => a.clear_locations(),
            TypeExpr::ArrayOfConst | TypeExpr::ForwardClass(_) => {}
            TypeExpr::Set(t) | TypeExpr::Pointer(t) | TypeExpr::Distinct(t) => t.clear_locations(),
            TypeExpr::File(t) => t.clear_locations(),
            TypeExpr::Record(r) => r.clear_locations(),
            TypeExpr::Procedure(p) => p.clear_locations(),
            TypeExpr::Class(c) => c.clear_locations(),
        }
    }
}

impl ClearLocations for ClassMember {
    fn clear_locations(&mut self) {
        match self {
            ClassMember::Field(f) => f.clear_locations(),
            ClassMember::Method(m) => m.clear_locations(),
            ClassMember::Property(p) => p.clear_locations(),
        }
    }
}

impl ClearLocations for PropertySpecifier {
    fn clear_locations(&mut self) {
        match self {
            PropertySpecifier::Read(r) | PropertySpecifier::Write(r) => r.clear_locations(),
            PropertySpecifier::Index(e) | PropertySpecifier::Stored(e) | PropertySpecifier::DispId(e) => {
                e.clear_locations()
            }
            PropertySpecifier::Default(e) => e.clear_locations(),
            PropertySpecifier::Implements(list) => list.clear_locations(),
            PropertySpecifier::NoDefault | PropertySpecifier::ReadOnly | PropertySpecifier::WriteOnly => {}
        }
    }
}

impl ClearLocations for Expr {
    fn clear_locations(&mut self) {
        match self {
            Expr::Binary { left, right, .. } => {
                left.clear_locations();
                right.clear_locations();
            }
            Expr::Unary { operand, .. } => operand.clear_locations(),
            Expr::Factor(f) => f.clear_locations(),
        }
    }
}

impl ClearLocations for Factor {
    fn clear_locations(&mut self) {
        match self {
            Factor::Designator(d) | Factor::AddressOf(d) => d.clear_locations(),
            Factor::Inherited(d) => d.clear_locations(),
            Factor::Number(_) | Factor::String(_) | Factor::Nil => {}
            Factor::Set(elements) => elements.clear_locations(),
            Factor::Paren { expr, items } => {
                expr.clear_locations();
                items.clear_locations();
            }
        }
    }
}

impl ClearLocations for DesignatorItem {
    fn clear_locations(&mut self) {
        match self {
            DesignatorItem::Field(f) => f.clear_locations(),
            DesignatorItem::Index(exprs) => exprs.clear_locations(),
            DesignatorItem::Deref => {}
            DesignatorItem::Call(args) => args.clear_locations(),
        }
    }
}

impl ClearLocations for Statement {
    fn clear_locations(&mut self) {
        match self {
            Statement::Empty => {}
            Statement::Labeled { label, statement } => {
                label.clear_locations();
                statement.clear_locations();
            }
            Statement::Assign { target, value } => {
                target.clear_locations();
                value.clear_locations();
            }
            Statement::Call(d) => d.clear_locations(),
            Statement::ParenTarget { target, value } => {
                target.clear_locations();
                value.clear_locations();
            }
            Statement::Inherited(d) => d.clear_locations(),
            Statement::Goto(label) => label.clear_locations(),
            Statement::Compound(c) => c.clear_locations(),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.clear_locations();
                then_branch.clear_locations();
                else_branch.clear_locations();
            }
            Statement::Case(c) => c.clear_locations(),
            Statement::For {
                variable,
                start,
                end,
                body,
                ..
            } => {
                variable.clear_locations();
                start.clear_locations();
                end.clear_locations();
                body.clear_locations();
            }
            Statement::ForIn {
                variable,
                collection,
                body,
            } => {
                variable.clear_locations();
                collection.clear_locations();
                body.clear_locations();
            }
            Statement::While { condition, body } => {
                condition.clear_locations();
                body.clear_locations();
            }
            Statement::Repeat {
                statements,
                condition,
            } => {
                statements.clear_locations();
                condition.clear_locations();
            }
            Statement::With { targets, body } => {
                targets.clear_locations();
                body.clear_locations();
            }
            Statement::TryExcept(t) => t.clear_locations(),
            Statement::TryFinally {
                statements,
                finally,
            } => {
                statements.clear_locations();
                finally.clear_locations();
            }
            Statement::Raise { exception, at } => {
                exception.clear_locations();
                at.clear_locations();
            }
            Statement::Asm(a) => a.clear_locations(),
        }
    }
}

impl HasRange for Block {
    fn range(&self) -> Option<Location> {
        self.range
    }

    fn set_range(&mut self, range: Option<Location>) {
        self.range = range;
    }

    fn recompute_range(&mut self) {
        self.range = NodeRef::Block(self).ident_span();
    }
}

impl HasRange for CompoundStmt {
    fn range(&self) -> Option<Location> {
        self.range
    }

    fn set_range(&mut self, range: Option<Location>) {
        self.range = range;
    }

    fn recompute_range(&mut self) {
        self.range = NodeRef::Compound(self).ident_span();
    }
}

impl HasRange for AsmStmt {
    fn range(&self) -> Option<Location> {
        self.range
    }

    fn set_range(&mut self, range: Option<Location>) {
        self.range = range;
    }

    /// Assembler bodies hold no identifiers; the range is left as is
    fn recompute_range(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokens::Position;

    fn at(index: usize) -> Location {
        Location::new(
            Position::new(1, index as u32 + 1, index),
            Position::new(1, index as u32 + 2, index + 1),
        )
    }

    fn assign(name: &str, index: usize) -> Statement {
        Statement::Assign {
            target: Designator::simple(IdentRef::new(Ident::new(name, at(index)), Some(DeclId(0)))),
            value: Expr::Factor(Factor::Number(Numeral {
                text: "1".into(),
                real: false,
            })),
        }
    }

    #[test]
    fn test_clear_locations_makes_layouts_equal() {
        let mut a = CompoundStmt {
            statements: vec![assign("X", 6)],
            range: Some(at(0)),
        };
        let mut b = CompoundStmt {
            statements: vec![assign("X", 20)],
            range: Some(at(3)),
        };
        assert_ne!(a, b);
        a.clear_locations();
        b.clear_locations();
        assert_eq!(a, b);
    }

    #[test]
    fn test_clear_keeps_resolution() {
        let mut stmt = assign("X", 6);
        stmt.clear_locations();
        match stmt {
            Statement::Assign { target, .. } => {
                assert_eq!(target.root.ident.resolved, Some(DeclId(0)));
                assert_eq!(target.root.ident.ident.location, None);
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_range_is_independent_of_children() {
        let mut compound = CompoundStmt {
            statements: vec![assign("X", 6), assign("Y", 12)],
            range: Some(at(0)),
        };
        compound.clear_range();
        assert_eq!(compound.range(), None);

        compound.recompute_range();
        let range = compound.range().unwrap();
        assert_eq!(range.start.index, 6);
        assert_eq!(range.end.index, 13);
    }
}
