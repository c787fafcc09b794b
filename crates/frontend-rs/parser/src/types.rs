//! Type parsing
//!
//! Every type production returns the syntax together with a handle to the
//! declaration describing the type, when there is one. Member lookup after
//! `.` and typed-constant aggregates both follow these handles.

use crate::Parser;
use ast::{
    ArrayType, ClassMember, EnumElement, Expr, FieldDecl, IdentRef, ProcedureType, QualifiedIdent,
    RecordType, RoutineKind, TypeDecl, TypeExpr, VariantCase, VariantPart,
};
use errors::ParserResult;
use symbols::{DeclId, DeclKind, DeclMap, Declaration, Ident, ScopeKind, TypeShape};

impl<'s> Parser<'s> {
    /// Parse a type and return it with its type declaration handle
    pub(crate) fn parse_type(&mut self) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        let packed = self.eat_reserved("PACKED")?;
        if self.at_reserved("ARRAY") {
            return self.parse_array_type(packed);
        }
        if self.at_reserved("RECORD") {
            return self.parse_record_type(packed);
        }
        if packed {
            return Err(self.unexpected("'array' or 'record'"));
        }

        if self.at_symbol("^") {
            return self.parse_pointer_type();
        }
        if self.at_symbol("(") {
            return self.parse_enumerated_type();
        }
        if self.eat_reserved("SET")? {
            self.expect_reserved("OF")?;
            let (element, _) = self.parse_type()?;
            return Ok((TypeExpr::Set(Box::new(element)), None));
        }
        if self.eat_reserved("FILE")? {
            let element = if self.eat_reserved("OF")? {
                Some(Box::new(self.parse_type()?.0))
            } else {
                None
            };
            return Ok((TypeExpr::File(element), None));
        }
        if self.eat_reserved("STRING")? {
            let length = if self.eat_symbol("[")? {
                let length = self.parse_expression()?;
                self.expect_symbol("]")?;
                Some(Box::new(length))
            } else {
                None
            };
            return Ok((TypeExpr::String(length), None));
        }
        if self.at_reserved("PROCEDURE") || self.at_reserved("FUNCTION") {
            return self.parse_procedure_type();
        }
        if self.at_reserved("CLASS") && self.peek_token().is_reserved("OF") {
            self.advance()?;
            self.advance()?;
            let target = self.parse_type_name()?;
            let handle = self.anonymous_type(TypeShape::ClassRef(target.resolved()));
            return Ok((TypeExpr::ClassOf(target), Some(handle)));
        }
        self.parse_named_or_subrange()
    }

    /// A type name, or a subrange `low..high` over constant expressions
    fn parse_named_or_subrange(&mut self) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        let low = self.parse_simple_expression()?;
        if self.eat_symbol("..")? {
            let high = self.parse_simple_expression()?;
            return Ok((
                TypeExpr::Subrange {
                    low: Box::new(low),
                    high: Box::new(high),
                },
                None,
            ));
        }
        match low {
            Expr::Factor(ast::Factor::Designator(designator)) if designator.items.is_empty() => {
                let handle = designator.root.resolved();
                Ok((TypeExpr::Named(designator.root), handle))
            }
            _ => Err(self.invalid("type expected")),
        }
    }

    /// `array [Index, ...] of Element`, `array of Element`, `array of const`
    fn parse_array_type(&mut self, packed: bool) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        self.expect_reserved("ARRAY")?;
        let mut indexes = Vec::new();
        if self.eat_symbol("[")? {
            loop {
                indexes.push(self.parse_type()?.0);
                if !self.eat_symbol(",")? {
                    break;
                }
            }
            self.expect_symbol("]")?;
        }
        self.expect_reserved("OF")?;
        if indexes.is_empty() && self.eat_reserved("CONST")? {
            return Ok((TypeExpr::ArrayOfConst, None));
        }
        let (element, element_handle) = self.parse_type()?;
        // one array level per index so `A[I, J]` and nested aggregates line up
        let mut handle = element_handle;
        for _ in 0..indexes.len().max(1) {
            handle = Some(self.anonymous_type(TypeShape::Array(handle)));
        }
        Ok((
            TypeExpr::Array(ArrayType {
                packed,
                indexes,
                element: Box::new(element),
            }),
            handle,
        ))
    }

    /// `record Fields [case ...] end`; fields become members of an
    /// anonymous structured type
    fn parse_record_type(&mut self, packed: bool) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        self.expect_reserved("RECORD")?;
        let (record, members) = self.collect_members(None, |p| p.parse_record_body(packed))?;
        self.expect_reserved("END")?;
        let handle = self.anonymous_type(TypeShape::Structured);
        self.session.arena.set_members(handle, members);
        Ok((TypeExpr::Record(record), Some(handle)))
    }

    fn parse_record_body(&mut self, packed: bool) -> ParserResult<RecordType> {
        let mut fields = Vec::new();
        while self.at_ident() {
            fields.push(self.parse_field_decl()?);
        }
        let variant = if self.at_reserved("CASE") {
            Some(self.parse_variant_part()?)
        } else {
            None
        };
        Ok(RecordType {
            packed,
            fields,
            variant,
        })
    }

    /// `A, B: Type;` bound as fields in the current scope. The `;` may be
    /// omitted before `end` or `)`.
    pub(crate) fn parse_field_decl(&mut self) -> ParserResult<FieldDecl> {
        let id = self.node_id();
        let idents = self.parse_ident_list()?;
        self.expect_symbol(":")?;
        let (type_expr, type_decl) = self.parse_type()?;
        self.parse_portability()?;
        if !self.at_reserved("END") && !self.at_symbol(")") {
            self.expect_symbol(";")?;
        }
        for ident in &idents {
            self.declare(Declaration::new(ident.clone(), DeclKind::Field, Some(id)).with_type(type_decl))?;
        }
        Ok(FieldDecl {
            id,
            idents,
            type_expr,
        })
    }

    /// `case [Tag:] TagType of Label, ...: (Fields); ...`
    fn parse_variant_part(&mut self) -> ParserResult<VariantPart> {
        let id = self.node_id();
        self.expect_reserved("CASE")?;
        let tag = if self.at_ident() && self.peek_token().is_symbol(":") {
            let tag = self.expect_ident()?;
            self.advance()?;
            Some(tag)
        } else {
            None
        };
        let tag_type = self.parse_type_name()?;
        if let Some(tag) = &tag {
            self.declare(Declaration::new(tag.clone(), DeclKind::Field, Some(id)).with_type(tag_type.resolved()))?;
        }
        self.expect_reserved("OF")?;

        let mut cases = Vec::new();
        while !self.at_reserved("END") && !self.at_symbol(")") {
            let mut labels = vec![self.parse_expression()?];
            while self.eat_symbol(",")? {
                labels.push(self.parse_expression()?);
            }
            self.expect_symbol(":")?;
            self.expect_symbol("(")?;
            let mut fields = Vec::new();
            while self.at_ident() {
                fields.push(self.parse_field_decl()?);
            }
            let variant = if self.at_reserved("CASE") {
                Some(Box::new(self.parse_variant_part()?))
            } else {
                None
            };
            self.expect_symbol(")")?;
            cases.push(VariantCase {
                labels,
                fields,
                variant,
            });
            if !self.eat_symbol(";")? {
                break;
            }
        }
        Ok(VariantPart {
            id,
            tag,
            tag_type,
            cases,
        })
    }

    /// `^Target`. Inside a type section the target may be declared later in
    /// the same section; it is bound when the section ends.
    fn parse_pointer_type(&mut self) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        self.expect_symbol("^")?;
        let first = self.expect_ident()?;
        let target = if self.is_unit_qualifier(&first.name) {
            self.advance()?;
            let name = self.expect_ident()?;
            self.reference_qualified(first, name)?
        } else if self.pending_pointers.is_some() {
            QualifiedIdent::simple(IdentRef::new(first, None))
        } else {
            QualifiedIdent::simple(self.reference(first)?)
        };
        let handle = self.anonymous_type(TypeShape::Pointer(target.resolved()));
        let deferred = target.unit.is_none() && target.resolved().is_none();
        if let (true, Some(pending)) = (deferred, self.pending_pointers.as_mut()) {
            pending.push((handle, target.ident.ident.clone()));
        }
        Ok((TypeExpr::Pointer(Box::new(TypeExpr::Named(target))), Some(handle)))
    }

    /// Bind pointer targets deferred while parsing a type section and patch
    /// the references in the section's declarations
    pub(crate) fn resolve_pending_pointers(
        &mut self,
        pending: Vec<(DeclId, Ident)>,
        decls: &mut [TypeDecl],
    ) -> ParserResult<()> {
        for (pointer, ident) in pending {
            let target = self.reference(ident)?;
            self.session.arena.get_mut(pointer).shape = TypeShape::Pointer(target.resolved);
            if target.resolved.is_some() {
                for decl in decls.iter_mut() {
                    patch_pointer_target(&mut decl.type_expr, &target);
                }
            }
        }
        Ok(())
    }

    /// `(Red, Green = 5, Blue)`; elements are constants of the enclosing scope
    fn parse_enumerated_type(&mut self) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        self.expect_symbol("(")?;
        let mut elements = Vec::new();
        loop {
            let id = self.node_id();
            let ident = self.expect_ident()?;
            let value = if self.eat_symbol("=")? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let decl = Declaration::new(ident.clone(), DeclKind::EnumElement, Some(id));
            self.declare_outside_members(decl)?;
            elements.push(EnumElement { id, ident, value });
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok((TypeExpr::Enumerated(elements), None))
    }

    /// `procedure(...) [of object]`, `function(...): T [of object]`
    fn parse_procedure_type(&mut self) -> ParserResult<(TypeExpr, Option<DeclId>)> {
        let kind = if self.eat_reserved("PROCEDURE")? {
            RoutineKind::Procedure
        } else {
            self.expect_reserved("FUNCTION")?;
            RoutineKind::Function
        };
        // parameter names of a procedural type bind nothing outside it
        self.scopes.push_scope(ScopeKind::Routine);
        let params = if self.at_symbol("(") {
            self.parse_formal_params("(", ")")
        } else {
            Ok(Vec::new())
        };
        self.scopes.pop_scope();
        let params = params?;
        let result = if kind == RoutineKind::Function {
            self.expect_symbol(":")?;
            Some(Box::new(self.parse_type()?.0))
        } else {
            None
        };
        let of_object = if self.at_reserved("OF") && self.peek_token().is_reserved("OBJECT") {
            self.advance()?;
            self.advance()?;
            true
        } else {
            false
        };
        // `TProc = procedure; stdcall;`
        if self.at_symbol(";") && is_calling_convention(self.peek_token()) {
            self.advance()?;
            self.advance()?;
        }
        Ok((
            TypeExpr::Procedure(ProcedureType {
                kind,
                params,
                result,
                of_object,
            }),
            None,
        ))
    }

    /// Run `body` in a fresh members scope and return what it declared
    pub(crate) fn collect_members<T>(
        &mut self,
        members_of: Option<DeclId>,
        body: impl FnOnce(&mut Self) -> ParserResult<T>,
    ) -> ParserResult<(T, DeclMap)> {
        self.scopes.push_members(ScopeKind::Members, members_of);
        let result = body(self);
        let members = self.scopes.pop_scope().map(|s| s.decls).unwrap_or_default();
        Ok((result?, members))
    }
}

fn is_calling_convention(token: &tokens::Token) -> bool {
    ["CDECL", "STDCALL", "REGISTER", "PASCAL", "SAFECALL"]
        .iter()
        .any(|w| token.is_directive(w))
}

/// Fill in the deferred target `target` wherever the type refers to it
fn patch_pointer_target(type_expr: &mut TypeExpr, target: &IdentRef) {
    match type_expr {
        TypeExpr::Pointer(inner) => {
            if let TypeExpr::Named(name) = inner.as_mut() {
                if name.unit.is_none()
                    && name.ident.resolved.is_none()
                    && name.ident.ident.location == target.ident.location
                {
                    name.ident.resolved = target.resolved;
                }
            }
        }
        TypeExpr::Array(array) => patch_pointer_target(&mut array.element, target),
        TypeExpr::Set(inner) | TypeExpr::Distinct(inner) => patch_pointer_target(inner, target),
        TypeExpr::File(Some(inner)) => patch_pointer_target(inner, target),
        TypeExpr::Record(record) => {
            for field in &mut record.fields {
                patch_pointer_target(&mut field.type_expr, target);
            }
            let mut variant = record.variant.as_mut();
            while let Some(part) = variant {
                for case in &mut part.cases {
                    for field in &mut case.fields {
                        patch_pointer_target(&mut field.type_expr, target);
                    }
                }
                // nested variant parts only occur in the last case
                variant = part
                    .cases
                    .last_mut()
                    .and_then(|case| case.variant.as_deref_mut());
            }
        }
        TypeExpr::Class(class) => {
            for section in &mut class.sections {
                for member in &mut section.members {
                    if let ClassMember::Field(field) = member {
                        patch_pointer_target(&mut field.type_expr, target);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse_program_source, ParseOptions, Parser, Session};
    use ast::{DeclSection, Designator, DesignatorItem, Statement, TypeExpr};
    use symbols::{DeclKind, TypeShape};

    fn type_decls(src: &str) -> (Vec<ast::TypeDecl>, crate::ParsedProgram) {
        let parsed = parse_program_source(src).unwrap();
        let decls = parsed
            .program
            .block
            .block
            .decls
            .iter()
            .filter_map(|d| match d {
                DeclSection::Type(section) => Some(section.decls.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        (decls, parsed)
    }

    #[test]
    fn test_pointer_to_later_type_in_same_section() {
        let src = r#"
program P;
type
  PNode = ^TNode;
  TNode = record
    Value: Integer;
    Next: PNode;
  end;
var
  Head: PNode;
begin
  Head^.Next^.Value := 1
end.
"#;
        let (decls, parsed) = type_decls(src);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let TypeExpr::Pointer(target) = &decls[0].type_expr else { panic!() };
        let TypeExpr::Named(name) = target.as_ref() else { panic!() };
        assert_eq!(parsed.declaration(name.resolved().unwrap()).node, Some(decls[1].id));

        let Statement::Assign { target, .. } = &parsed.program.block.block.body.statements[0] else {
            panic!()
        };
        let Designator { items, .. } = target;
        assert_eq!(items.len(), 4);
        let DesignatorItem::Field(value) = &items[3] else { panic!() };
        assert_eq!(parsed.declaration(value.resolved.unwrap()).kind, DeclKind::Field);
    }

    #[test]
    fn test_unresolved_pointer_target_reported_at_section_end() {
        let (_, parsed) = type_decls("program P; type PX = ^TMissing; begin end.");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].name.as_deref(), Some("TMissing"));
    }

    #[test]
    fn test_type_forms() {
        let src = r#"
program P;
type
  TDigit = 0..9;
  TColor = (Red, Green = 5, Blue);
  TColors = set of TColor;
  TName = string[20];
  TMatrix = packed array[1..3, 1..3] of Real;
  TOpen = procedure(const A: array of const);
  TNotify = procedure(Sender: Pointer) of object;
  TCallback = function(X: Integer): Boolean; stdcall;
  TBytes = file of Byte;
  TMyInt = type Integer;
begin
end.
"#;
        let (decls, parsed) = type_decls(src);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        assert!(matches!(decls[0].type_expr, TypeExpr::Subrange { .. }));
        let TypeExpr::Enumerated(elements) = &decls[1].type_expr else { panic!() };
        assert_eq!(elements.len(), 3);
        assert!(elements[1].value.is_some());
        assert!(matches!(decls[2].type_expr, TypeExpr::Set(_)));
        assert!(matches!(decls[3].type_expr, TypeExpr::String(Some(_))));
        let TypeExpr::Array(matrix) = &decls[4].type_expr else { panic!() };
        assert!(matrix.packed);
        assert_eq!(matrix.indexes.len(), 2);
        let TypeExpr::Procedure(open) = &decls[5].type_expr else { panic!() };
        assert!(matches!(open.params[0].type_expr, Some(TypeExpr::ArrayOfConst)));
        let TypeExpr::Procedure(notify) = &decls[6].type_expr else { panic!() };
        assert!(notify.of_object);
        assert!(matches!(decls[7].type_expr, TypeExpr::Procedure(_)));
        assert!(matches!(decls[8].type_expr, TypeExpr::File(Some(_))));
        assert!(matches!(decls[9].type_expr, TypeExpr::Distinct(_)));
    }

    #[test]
    fn test_procedure_type_params_stay_local() {
        let (_, parsed) = type_decls(
            "program P; type TProc = procedure(Value: Integer); var Value: Integer; begin end.",
        );
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    }

    #[test]
    fn test_variant_record() {
        let src = r#"
program P;
type
  TShape = record
    Name: string;
    case Kind: Integer of
      0: (Radius: Real);
      1, 2: (Width, Height: Real;
             case Boolean of
               True: (Area: Real));
  end;
var S: TShape;
begin
  S.Width := S.Radius + S.Area
end.
"#;
        let (decls, parsed) = type_decls(src);
        // True is not predeclared; every field access resolves
        assert_eq!(parsed.diagnostics.len(), 1, "{:?}", parsed.diagnostics);
        assert_eq!(parsed.diagnostics[0].name.as_deref(), Some("True"));
        let TypeExpr::Record(record) = &decls[0].type_expr else { panic!() };
        let variant = record.variant.as_ref().unwrap();
        assert_eq!(variant.tag.as_ref().unwrap().name, "Kind");
        assert_eq!(variant.cases.len(), 2);
        assert_eq!(variant.cases[1].labels.len(), 2);
        assert!(variant.cases[1].variant.is_some());
    }

    #[test]
    fn test_enum_inside_record_binds_in_enclosing_block() {
        let src = r#"
program P;
type
  TPixel = record
    Color: (Red, Green);
    Level: Integer;
  end;
var Px: TPixel;
begin
  Px.Color := Green
end.
"#;
        let (_, parsed) = type_decls(src);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let Statement::Assign { value, .. } = &parsed.program.block.block.body.statements[0] else {
            panic!("expected an assignment")
        };
        let green = value.as_designator().unwrap().root.resolved().unwrap();
        assert_eq!(parsed.declaration(green).kind, DeclKind::EnumElement);

        let (pixel, _) = parsed
            .declarations
            .iter()
            .find(|(_, d)| d.ident.name == "TPixel")
            .unwrap();
        assert!(parsed.declarations.find_member(pixel, "Color").is_some());
        assert!(parsed.declarations.find_member(pixel, "Red").is_none());
    }

    #[test]
    fn test_type_fragment_handle() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("array[0..3] of record A: Integer end", None, &mut session).unwrap();
        let type_expr = parser.parse_type_fragment().unwrap();
        assert!(matches!(type_expr, TypeExpr::Array(_)));
        drop(parser);
        let arrays = session
            .arena()
            .iter()
            .filter(|(_, d)| matches!(d.shape, TypeShape::Array(Some(_))))
            .count();
        assert_eq!(arrays, 1);
    }
}
