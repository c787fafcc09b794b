//! Generic tree walking

use crate::*;

/// Borrowed view of any tree node, for generic walking and queries
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Program(&'a Program),
    Unit(&'a Unit),
    UsesItem(&'a UsesClauseItem),
    Block(&'a Block),
    LabelDecl(&'a LabelDecl),
    ConstDecl(&'a ConstDecl),
    TypeDecl(&'a TypeDecl),
    VarDecl(&'a VarDecl),
    RoutineDecl(&'a RoutineDecl),
    FormalParam(&'a FormalParam),
    FieldDecl(&'a FieldDecl),
    PropertyDecl(&'a PropertyDecl),
    EnumElement(&'a EnumElement),
    VariantPart(&'a VariantPart),
    ExceptionHandler(&'a ExceptionHandler),
    Type(&'a TypeExpr),
    ConstValue(&'a ConstValue),
    Statement(&'a Statement),
    Compound(&'a CompoundStmt),
    Expr(&'a Expr),
    Designator(&'a Designator),
    IdentRef(&'a IdentRef),
    Ident(&'a Ident),
}

fn decl_section<'a>(section: &'a DeclSection, out: &mut Vec<NodeRef<'a>>) {
    match section {
        DeclSection::Label(s) => out.extend(s.labels.iter().map(NodeRef::LabelDecl)),
        DeclSection::Const(s) => out.extend(s.decls.iter().map(NodeRef::ConstDecl)),
        DeclSection::Type(s) => out.extend(s.decls.iter().map(NodeRef::TypeDecl)),
        DeclSection::Var(s) => out.extend(s.decls.iter().map(NodeRef::VarDecl)),
        DeclSection::Routine(r) => out.push(NodeRef::RoutineDecl(r)),
    }
}

fn qualified<'a>(q: &'a QualifiedIdent, out: &mut Vec<NodeRef<'a>>) {
    if let Some(unit) = &q.unit {
        out.push(NodeRef::Ident(unit));
    }
    out.push(NodeRef::IdentRef(&q.ident));
}

fn statements<'a>(list: &'a [Statement], out: &mut Vec<NodeRef<'a>>) {
    out.extend(list.iter().map(NodeRef::Statement));
}

fn designator_items<'a>(items: &'a [DesignatorItem], out: &mut Vec<NodeRef<'a>>) {
    for item in items {
        match item {
            DesignatorItem::Field(f) => out.push(NodeRef::IdentRef(f)),
            DesignatorItem::Index(exprs) => out.extend(exprs.iter().map(NodeRef::Expr)),
            DesignatorItem::Deref => {}
            DesignatorItem::Call(args) => {
                for arg in args {
                    out.push(NodeRef::Expr(&arg.value));
                    out.extend(arg.width.iter().map(NodeRef::Expr));
                    out.extend(arg.decimals.iter().map(NodeRef::Expr));
                }
            }
        }
    }
}

fn routine<'a>(r: &'a RoutineDecl, out: &mut Vec<NodeRef<'a>>) {
    let heading = &r.heading;
    if let Some(q) = &heading.qualifier {
        out.push(NodeRef::IdentRef(q));
    }
    out.push(NodeRef::Ident(&heading.ident));
    if let Some(params) = &heading.params {
        out.extend(params.iter().map(NodeRef::FormalParam));
    }
    out.extend(heading.result.iter().map(NodeRef::Type));
    for directive in &r.directives {
        match directive {
            RoutineDirective::External { library, name } => {
                out.extend(library.iter().map(NodeRef::Expr));
                out.extend(name.iter().map(NodeRef::Expr));
            }
            RoutineDirective::Message(e) => out.push(NodeRef::Expr(e)),
            RoutineDirective::CallingConvention(i) | RoutineDirective::Portability(i) => {
                out.push(NodeRef::Ident(i))
            }
            _ => {}
        }
    }
    out.extend(r.body.iter().map(NodeRef::Block));
}

fn type_children<'a>(ty: &'a TypeExpr, out: &mut Vec<NodeRef<'a>>) {
    match ty {
        TypeExpr::Named(q) | TypeExpr::ClassOf(q) => qualified(q, out),
        TypeExpr::String(len) => out.extend(len.iter().map(|e| NodeRef::Expr(e))),
        TypeExpr::Subrange { low, high } => {
            out.push(NodeRef::Expr(low));
            out.push(NodeRef::Expr(high));
        }
        TypeExpr::Enumerated(elements) => out.extend(elements.iter().map(NodeRef::EnumElement)),
        TypeExpr::Array(a) => {
            out.extend(a.indexes.iter().map(NodeRef::Type));
            out.push(NodeRef::Type(&a.element));
        }
        TypeExpr::ArrayOfConst | TypeExpr::ForwardClass(_) => {}
        TypeExpr::Set(t) | TypeExpr::Pointer(t) | TypeExpr::Distinct(t) => out.push(NodeRef::Type(t)),
        TypeExpr::File(t) => out.extend(t.iter().map(|t| NodeRef::Type(t))),
        TypeExpr::Record(r) => {
            out.extend(r.fields.iter().map(NodeRef::FieldDecl));
            out.extend(r.variant.iter().map(NodeRef::VariantPart));
        }
        TypeExpr::Procedure(p) => {
            out.extend(p.params.iter().map(NodeRef::FormalParam));
            out.extend(p.result.iter().map(|t| NodeRef::Type(t)));
        }
        TypeExpr::Class(c) => {
            for q in &c.ancestors {
                qualified(q, out);
            }
            out.extend(c.guid.iter().map(NodeRef::Expr));
            for section in &c.sections {
                for member in &section.members {
                    match member {
                        ClassMember::Field(f) => out.push(NodeRef::FieldDecl(f)),
                        ClassMember::Method(m) => out.push(NodeRef::RoutineDecl(m)),
                        ClassMember::Property(p) => out.push(NodeRef::PropertyDecl(p)),
                    }
                }
            }
        }
    }
}

fn statement_children<'a>(stmt: &'a Statement, out: &mut Vec<NodeRef<'a>>) {
    match stmt {
        Statement::Empty | Statement::Asm(_) => {}
        Statement::Labeled { label, statement } => {
            out.push(NodeRef::IdentRef(label));
            out.push(NodeRef::Statement(statement));
        }
        Statement::Assign { target, value } => {
            out.push(NodeRef::Designator(target));
            out.push(NodeRef::Expr(value));
        }
        Statement::Call(d) => out.push(NodeRef::Designator(d)),
        Statement::ParenTarget { target, value } => {
            out.push(NodeRef::Expr(target));
            out.extend(value.iter().map(NodeRef::Expr));
        }
        Statement::Inherited(d) => out.extend(d.iter().map(NodeRef::Designator)),
        Statement::Goto(label) => out.push(NodeRef::IdentRef(label)),
        Statement::Compound(c) => out.push(NodeRef::Compound(c)),
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push(NodeRef::Expr(condition));
            out.push(NodeRef::Statement(then_branch));
            out.extend(else_branch.iter().map(|s| NodeRef::Statement(s)));
        }
        Statement::Case(c) => {
            out.push(NodeRef::Expr(&c.selector));
            for arm in &c.arms {
                for label in &arm.labels {
                    out.push(NodeRef::Expr(&label.low));
                    out.extend(label.high.iter().map(NodeRef::Expr));
                }
                out.push(NodeRef::Statement(&arm.statement));
            }
            if let Some(list) = &c.else_branch {
                statements(list, out);
            }
        }
        Statement::For {
            variable,
            start,
            end,
            body,
            ..
        } => {
            out.push(NodeRef::IdentRef(variable));
            out.push(NodeRef::Expr(start));
            out.push(NodeRef::Expr(end));
            out.push(NodeRef::Statement(body));
        }
        Statement::ForIn {
            variable,
            collection,
            body,
        } => {
            out.push(NodeRef::IdentRef(variable));
            out.push(NodeRef::Expr(collection));
            out.push(NodeRef::Statement(body));
        }
        Statement::While { condition, body } => {
            out.push(NodeRef::Expr(condition));
            out.push(NodeRef::Statement(body));
        }
        Statement::Repeat {
            statements: list,
            condition,
        } => {
            statements(list, out);
            out.push(NodeRef::Expr(condition));
        }
        Statement::With { targets, body } => {
            out.extend(targets.iter().map(NodeRef::Expr));
            out.push(NodeRef::Statement(body));
        }
        Statement::TryExcept(t) => {
            statements(&t.statements, out);
            out.extend(t.handlers.iter().map(NodeRef::ExceptionHandler));
            if let Some(list) = &t.else_branch {
                statements(list, out);
            }
            statements(&t.except_statements, out);
        }
        Statement::TryFinally {
            statements: list,
            finally,
        } => {
            statements(list, out);
            statements(finally, out);
        }
        Statement::Raise { exception, at } => {
            out.extend(exception.iter().map(NodeRef::Expr));
            out.extend(at.iter().map(NodeRef::Expr));
        }
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<NodeRef<'a>>) {
    match expr {
        Expr::Binary { left, right, .. } => {
            out.push(NodeRef::Expr(left));
            out.push(NodeRef::Expr(right));
        }
        Expr::Unary { operand, .. } => out.push(NodeRef::Expr(operand)),
        Expr::Factor(factor) => match factor {
            Factor::Designator(d) | Factor::AddressOf(d) => out.push(NodeRef::Designator(d)),
            Factor::Inherited(d) => out.extend(d.iter().map(NodeRef::Designator)),
            Factor::Number(_) | Factor::String(_) | Factor::Nil => {}
            Factor::Set(elements) => {
                for e in elements {
                    out.push(NodeRef::Expr(&e.low));
                    out.extend(e.high.iter().map(NodeRef::Expr));
                }
            }
            Factor::Paren { expr, items } => {
                out.push(NodeRef::Expr(expr));
                designator_items(items, out);
            }
        },
    }
}

fn const_value_children<'a>(value: &'a ConstValue, out: &mut Vec<NodeRef<'a>>) {
    match value {
        ConstValue::Expr(e) => out.push(NodeRef::Expr(e)),
        ConstValue::Array(items) => out.extend(items.iter().map(NodeRef::ConstValue)),
        ConstValue::Record(fields) => {
            for f in fields {
                out.push(NodeRef::IdentRef(&f.field));
                out.push(NodeRef::ConstValue(&f.value));
            }
        }
    }
}

impl<'a> NodeRef<'a> {
    /// Direct children in source order
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            NodeRef::Program(p) => {
                out.push(NodeRef::Ident(&p.ident));
                out.extend(p.params.iter().map(NodeRef::Ident));
                if let Some(uses) = &p.block.uses {
                    out.extend(uses.items.iter().map(NodeRef::UsesItem));
                }
                out.push(NodeRef::Block(&p.block.block));
            }
            NodeRef::Unit(u) => {
                out.push(NodeRef::Ident(&u.ident));
                out.extend(u.portability.iter().map(NodeRef::Ident));
                if let Some(uses) = &u.interface.uses {
                    out.extend(uses.items.iter().map(NodeRef::UsesItem));
                }
                for decl in &u.interface.decls {
                    match decl {
                        InterfaceDecl::Const(s) => out.extend(s.decls.iter().map(NodeRef::ConstDecl)),
                        InterfaceDecl::Type(s) => out.extend(s.decls.iter().map(NodeRef::TypeDecl)),
                        InterfaceDecl::Var(s) => out.extend(s.decls.iter().map(NodeRef::VarDecl)),
                        InterfaceDecl::Heading(r) => out.push(NodeRef::RoutineDecl(r)),
                    }
                }
                if let Some(uses) = &u.implementation.uses {
                    out.extend(uses.items.iter().map(NodeRef::UsesItem));
                }
                for section in &u.implementation.decls {
                    decl_section(section, &mut out);
                }
                if let Some(init) = &u.init {
                    statements(&init.initialization, &mut out);
                    if let Some(fin) = &init.finalization {
                        statements(fin, &mut out);
                    }
                }
            }
            NodeRef::UsesItem(item) => out.push(NodeRef::Ident(&item.ident)),
            NodeRef::Block(b) => {
                for section in &b.decls {
                    decl_section(section, &mut out);
                }
                out.push(NodeRef::Compound(&b.body));
            }
            NodeRef::LabelDecl(l) => out.push(NodeRef::Ident(&l.ident)),
            NodeRef::ConstDecl(c) => {
                out.push(NodeRef::Ident(&c.ident));
                out.extend(c.type_expr.iter().map(NodeRef::Type));
                out.push(NodeRef::ConstValue(&c.value));
                out.extend(c.portability.iter().map(NodeRef::Ident));
            }
            NodeRef::TypeDecl(t) => {
                out.push(NodeRef::Ident(&t.ident));
                out.push(NodeRef::Type(&t.type_expr));
                out.extend(t.portability.iter().map(NodeRef::Ident));
            }
            NodeRef::VarDecl(v) => {
                out.extend(v.idents.iter().map(NodeRef::Ident));
                out.push(NodeRef::Type(&v.type_expr));
                out.extend(v.absolute.iter().map(NodeRef::IdentRef));
                out.extend(v.init.iter().map(NodeRef::ConstValue));
                out.extend(v.portability.iter().map(NodeRef::Ident));
            }
            NodeRef::RoutineDecl(r) => routine(r, &mut out),
            NodeRef::FormalParam(p) => {
                out.extend(p.idents.iter().map(NodeRef::Ident));
                out.extend(p.type_expr.iter().map(NodeRef::Type));
                out.extend(p.default.iter().map(NodeRef::Expr));
            }
            NodeRef::FieldDecl(f) => {
                out.extend(f.idents.iter().map(NodeRef::Ident));
                out.push(NodeRef::Type(&f.type_expr));
            }
            NodeRef::PropertyDecl(p) => {
                out.push(NodeRef::Ident(&p.ident));
                out.extend(p.params.iter().map(NodeRef::FormalParam));
                if let Some(q) = &p.type_ref {
                    qualified(q, &mut out);
                }
                for spec in &p.specifiers {
                    match spec {
                        PropertySpecifier::Read(r) | PropertySpecifier::Write(r) => {
                            out.push(NodeRef::IdentRef(r))
                        }
                        PropertySpecifier::Index(e)
                        | PropertySpecifier::Stored(e)
                        | PropertySpecifier::DispId(e) => out.push(NodeRef::Expr(e)),
                        PropertySpecifier::Default(e) => out.extend(e.iter().map(NodeRef::Expr)),
                        PropertySpecifier::Implements(list) => {
                            for q in list {
                                qualified(q, &mut out);
                            }
                        }
                        PropertySpecifier::NoDefault
                        | PropertySpecifier::ReadOnly
                        | PropertySpecifier::WriteOnly => {}
                    }
                }
            }
            NodeRef::EnumElement(e) => {
                out.push(NodeRef::Ident(&e.ident));
                out.extend(e.value.iter().map(NodeRef::Expr));
            }
            NodeRef::VariantPart(v) => {
                out.extend(v.tag.iter().map(NodeRef::Ident));
                qualified(&v.tag_type, &mut out);
                for case in &v.cases {
                    out.extend(case.labels.iter().map(NodeRef::Expr));
                    out.extend(case.fields.iter().map(NodeRef::FieldDecl));
                    out.extend(case.variant.iter().map(|v| NodeRef::VariantPart(v)));
                }
            }
            NodeRef::ExceptionHandler(h) => {
                out.extend(h.ident.iter().map(NodeRef::Ident));
                qualified(&h.type_ref, &mut out);
                out.push(NodeRef::Statement(&h.statement));
            }
            NodeRef::Type(t) => type_children(t, &mut out),
            NodeRef::ConstValue(v) => const_value_children(v, &mut out),
            NodeRef::Statement(s) => statement_children(s, &mut out),
            NodeRef::Compound(c) => statements(&c.statements, &mut out),
            NodeRef::Expr(e) => expr_children(e, &mut out),
            NodeRef::Designator(d) => {
                qualified(&d.root, &mut out);
                designator_items(&d.items, &mut out);
            }
            NodeRef::IdentRef(r) => out.push(NodeRef::Ident(&r.ident)),
            NodeRef::Ident(_) => {}
        }
        out
    }

    /// Id of a declaring node
    pub fn node_id(&self) -> Option<NodeId> {
        match *self {
            NodeRef::Program(p) => Some(p.id),
            NodeRef::Unit(u) => Some(u.id),
            NodeRef::LabelDecl(d) => Some(d.id),
            NodeRef::ConstDecl(d) => Some(d.id),
            NodeRef::TypeDecl(d) => Some(d.id),
            NodeRef::VarDecl(d) => Some(d.id),
            NodeRef::RoutineDecl(d) => Some(d.id),
            NodeRef::FormalParam(d) => Some(d.id),
            NodeRef::FieldDecl(d) => Some(d.id),
            NodeRef::PropertyDecl(d) => Some(d.id),
            NodeRef::EnumElement(d) => Some(d.id),
            NodeRef::VariantPart(d) => Some(d.id),
            NodeRef::ExceptionHandler(d) => Some(d.id),
            _ => None,
        }
    }

    /// Short name of the node category
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeRef::Program(_) => "Program",
            NodeRef::Unit(_) => "Unit",
            NodeRef::UsesItem(_) => "UsesItem",
            NodeRef::Block(_) => "Block",
            NodeRef::LabelDecl(_) => "LabelDecl",
            NodeRef::ConstDecl(_) => "ConstDecl",
            NodeRef::TypeDecl(_) => "TypeDecl",
            NodeRef::VarDecl(_) => "VarDecl",
            NodeRef::RoutineDecl(_) => "RoutineDecl",
            NodeRef::FormalParam(_) => "FormalParam",
            NodeRef::FieldDecl(_) => "FieldDecl",
            NodeRef::PropertyDecl(_) => "PropertyDecl",
            NodeRef::EnumElement(_) => "EnumElement",
            NodeRef::VariantPart(_) => "VariantPart",
            NodeRef::ExceptionHandler(_) => "ExceptionHandler",
            NodeRef::Type(_) => "Type",
            NodeRef::ConstValue(_) => "ConstValue",
            NodeRef::Statement(_) => "Statement",
            NodeRef::Compound(_) => "Compound",
            NodeRef::Expr(_) => "Expr",
            NodeRef::Designator(_) => "Designator",
            NodeRef::IdentRef(_) => "IdentRef",
            NodeRef::Ident(_) => "Ident",
        }
    }

    /// Pre-order walk over this node and its descendants
    pub fn walk(&self, visit: &mut dyn FnMut(NodeRef<'a>)) {
        visit(*self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Span covering every identifier location in the subtree
    pub fn ident_span(&self) -> Option<Location> {
        let mut span: Option<Location> = None;
        self.walk(&mut |node| {
            if let NodeRef::Ident(Ident {
                location: Some(loc), ..
            }) = node
            {
                span = Some(match span {
                    Some(s) => s.merge(*loc),
                    None => *loc,
                });
            }
        });
        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokens::Position;

    fn at(index: usize) -> Location {
        let start = Position::new(1, index as u32 + 1, index);
        let end = Position::new(1, index as u32 + 2, index + 1);
        Location::new(start, end)
    }

    fn call(name: &str, index: usize) -> Statement {
        Statement::Call(Designator::simple(IdentRef::new(Ident::new(name, at(index)), None)))
    }

    #[test]
    fn test_walk_reaches_identifiers() {
        let compound = CompoundStmt {
            statements: vec![call("A", 6), call("B", 9)],
            range: None,
        };
        let mut names = Vec::new();
        NodeRef::Compound(&compound).walk(&mut |node| {
            if let NodeRef::IdentRef(r) = node {
                names.push(r.name().to_string());
            }
        });
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_ident_span() {
        let compound = CompoundStmt {
            statements: vec![call("A", 6), call("B", 9)],
            range: None,
        };
        let span = NodeRef::Compound(&compound).ident_span().unwrap();
        assert_eq!(span.start.index, 6);
        assert_eq!(span.end.index, 10);
    }
}
