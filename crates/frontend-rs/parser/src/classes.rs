//! Class parsing
//!
//! Class, object and interface types, their members, and properties. A
//! class is declared before its body is parsed so members may refer to the
//! class being defined.

use crate::declarations::RoutineContext;
use crate::Parser;
use ast::{
    ClassKind, ClassMember, ClassSection, ClassType, Ident, IdentRef, PropertyDecl, PropertySpecifier,
    QualifiedIdent, TypeExpr, Visibility,
};
use errors::ParserResult;
use symbols::{DeclId, DeclKind, Declaration, NodeId, ScopeKind, TypeShape};

impl<'s> Parser<'s> {
    /// A class, object or interface type starts here
    pub(crate) fn at_class_type(&self) -> bool {
        ["CLASS", "OBJECT", "INTERFACE", "DISPINTERFACE"]
            .iter()
            .any(|w| self.at_reserved(w))
    }

    fn parse_class_kind(&mut self) -> ParserResult<ClassKind> {
        let kind = match self.current().upper().as_str() {
            "CLASS" => ClassKind::Class,
            "OBJECT" => ClassKind::Object,
            "INTERFACE" => ClassKind::Interface,
            "DISPINTERFACE" => ClassKind::DispInterface,
            _ => return Err(self.unexpected("'class'")),
        };
        self.advance()?;
        Ok(kind)
    }

    /// Right-hand side of `Name = class ...` in a type section. Declares
    /// `ident` itself; a full declaration completes an earlier `class;`.
    pub(crate) fn parse_class_type_decl(&mut self, ident: &Ident, id: NodeId) -> ParserResult<TypeExpr> {
        let kind = self.parse_class_kind()?;

        if kind == ClassKind::Class && self.eat_reserved("OF")? {
            let target = self.parse_type_name()?;
            let decl = Declaration::new(ident.clone(), DeclKind::Type, Some(id))
                .with_shape(TypeShape::ClassRef(target.resolved()));
            self.declare(decl)?;
            return Ok(TypeExpr::ClassOf(target));
        }

        if self.at_symbol(";") {
            let decl = Declaration::new(ident.clone(), DeclKind::Type, Some(id))
                .with_shape(TypeShape::Structured)
                .forward(true);
            self.declare(decl)?;
            return Ok(TypeExpr::ForwardClass(kind));
        }

        let decl = Declaration::new(ident.clone(), DeclKind::Type, Some(id)).with_shape(TypeShape::Structured);
        let class = match self.declare(decl)? {
            Some(class) => class,
            // duplicate name; members still need somewhere to live
            None => self.anonymous_type(TypeShape::Structured),
        };
        let body = self.parse_class_body(kind, class)?;
        Ok(TypeExpr::Class(body))
    }

    /// `[(Ancestor, Interface, ...)] [GUID] members end`. The short form
    /// `class(Exception);` has no member list.
    fn parse_class_body(&mut self, kind: ClassKind, class: DeclId) -> ParserResult<ClassType> {
        let mut ancestors = Vec::new();
        if self.eat_symbol("(")? {
            loop {
                ancestors.push(self.parse_type_name()?);
                if !self.eat_symbol(",")? {
                    break;
                }
            }
            self.expect_symbol(")")?;
        }
        let ancestor = ancestors.first().and_then(QualifiedIdent::resolved);
        self.session.arena.get_mut(class).ancestor = ancestor;

        if self.at_symbol(";") && !ancestors.is_empty() {
            self.session.arena.set_members(class, Default::default());
            return Ok(ClassType {
                kind,
                ancestors,
                guid: None,
                sections: Vec::new(),
            });
        }

        let guid = if matches!(kind, ClassKind::Interface | ClassKind::DispInterface) && self.eat_symbol("[")? {
            let guid = self.parse_expression()?;
            self.expect_symbol("]")?;
            Some(guid)
        } else {
            None
        };

        let (sections, members) = self.collect_members(ancestor, |p| p.parse_class_sections())?;
        self.expect_reserved("END")?;
        self.session.arena.set_members(class, members);
        Ok(ClassType {
            kind,
            ancestors,
            guid,
            sections,
        })
    }

    fn parse_class_sections(&mut self) -> ParserResult<Vec<ClassSection>> {
        let mut sections = Vec::new();
        let mut section = ClassSection {
            visibility: Visibility::Default,
            members: Vec::new(),
        };
        while !self.at_reserved("END") {
            if let Some(visibility) = self.parse_visibility()? {
                let previous = std::mem::replace(
                    &mut section,
                    ClassSection {
                        visibility,
                        members: Vec::new(),
                    },
                );
                if !previous.members.is_empty() || previous.visibility != Visibility::Default {
                    sections.push(previous);
                }
                continue;
            }
            let member = if self.at_routine_start() {
                ClassMember::Method(self.parse_routine_decl(RoutineContext::ClassBody)?)
            } else if self.at_reserved("PROPERTY")
                || (self.at_reserved("CLASS") && self.peek_token().is_reserved("PROPERTY"))
            {
                ClassMember::Property(self.parse_property()?)
            } else if self.at_reserved("VAR") || (self.at_reserved("CLASS") && self.peek_token().is_reserved("VAR")) {
                // `class var` / `var` blocks hold ordinary field declarations
                self.eat_reserved("CLASS")?;
                self.advance()?;
                continue;
            } else if self.at_ident() {
                ClassMember::Field(self.parse_field_decl()?)
            } else {
                return Err(self.unexpected("class member"));
            };
            section.members.push(member);
        }
        if !section.members.is_empty() || section.visibility != Visibility::Default {
            sections.push(section);
        }
        Ok(sections)
    }

    /// `private`, `strict protected`, ... when the current token opens a
    /// visibility section
    fn parse_visibility(&mut self) -> ParserResult<Option<Visibility>> {
        // `Public: Boolean;` is a field named Public
        if self.peek_token().is_symbol(":") || self.peek_token().is_symbol(",") {
            return Ok(None);
        }
        if self.at_directive("STRICT") {
            let visibility = if self.peek_token().is_directive("PRIVATE") {
                Visibility::StrictPrivate
            } else if self.peek_token().is_directive("PROTECTED") {
                Visibility::StrictProtected
            } else {
                return Ok(None);
            };
            self.advance()?;
            self.advance()?;
            return Ok(Some(visibility));
        }
        let visibility = match self.current().upper().as_str() {
            "PRIVATE" => Visibility::Private,
            "PROTECTED" => Visibility::Protected,
            "PUBLIC" => Visibility::Public,
            "PUBLISHED" => Visibility::Published,
            "AUTOMATED" => Visibility::Automated,
            _ => return Ok(None),
        };
        if !self.at_ident() {
            return Ok(None);
        }
        self.advance()?;
        Ok(Some(visibility))
    }

    /// `property Name[Index: Integer]: T read FGet write FSet; default;`
    fn parse_property(&mut self) -> ParserResult<PropertyDecl> {
        let id = self.node_id();
        self.eat_reserved("CLASS")?;
        self.expect_reserved("PROPERTY")?;
        let ident = self.expect_ident()?;

        let params = if self.at_symbol("[") {
            self.scopes.push_scope(ScopeKind::Routine);
            let params = self.parse_formal_params("[", "]");
            self.scopes.pop_scope();
            params?
        } else {
            Vec::new()
        };
        let type_ref = if !self.eat_symbol(":")? {
            None
        } else if self.at_reserved("STRING") {
            let token = self.advance()?;
            Some(QualifiedIdent::simple(IdentRef::new(Ident::new(token.text, token.location), None)))
        } else {
            Some(self.parse_type_name()?)
        };

        let mut specifiers = Vec::new();
        loop {
            let specifier = match self.current().upper().as_str() {
                _ if !self.at_ident() => break,
                "READ" => {
                    self.advance()?;
                    let target = self.expect_ident()?;
                    PropertySpecifier::Read(self.reference(target)?)
                }
                "WRITE" => {
                    self.advance()?;
                    let target = self.expect_ident()?;
                    PropertySpecifier::Write(self.reference(target)?)
                }
                "INDEX" => {
                    self.advance()?;
                    PropertySpecifier::Index(self.parse_expression()?)
                }
                "DEFAULT" => {
                    self.advance()?;
                    if self.at_symbol(";") {
                        PropertySpecifier::Default(None)
                    } else {
                        PropertySpecifier::Default(Some(self.parse_expression()?))
                    }
                }
                "NODEFAULT" => {
                    self.advance()?;
                    PropertySpecifier::NoDefault
                }
                "STORED" => {
                    self.advance()?;
                    PropertySpecifier::Stored(self.parse_expression()?)
                }
                "IMPLEMENTS" => {
                    self.advance()?;
                    let mut interfaces = vec![self.parse_type_name()?];
                    while self.eat_symbol(",")? {
                        interfaces.push(self.parse_type_name()?);
                    }
                    PropertySpecifier::Implements(interfaces)
                }
                "READONLY" => {
                    self.advance()?;
                    PropertySpecifier::ReadOnly
                }
                "WRITEONLY" => {
                    self.advance()?;
                    PropertySpecifier::WriteOnly
                }
                "DISPID" => {
                    self.advance()?;
                    PropertySpecifier::DispId(self.parse_expression()?)
                }
                _ => break,
            };
            specifiers.push(specifier);
        }
        self.expect_symbol(";")?;
        // array property marked as the class' default
        if self.at_directive("DEFAULT") && self.peek_token().is_symbol(";") {
            self.advance()?;
            self.advance()?;
            specifiers.push(PropertySpecifier::Default(None));
        }

        let type_decl = type_ref.as_ref().and_then(QualifiedIdent::resolved);
        self.declare(Declaration::new(ident.clone(), DeclKind::Property, Some(id)).with_type(type_decl))?;
        Ok(PropertyDecl {
            id,
            ident,
            params,
            type_ref,
            specifiers,
        })
    }
}
