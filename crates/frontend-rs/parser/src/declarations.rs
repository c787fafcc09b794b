//! Declaration parsing
//!
//! Programs, units, blocks, the declaration sections inside them, and
//! routine headings and bodies. Names are bound in the active scope as
//! soon as their declaration has been parsed, so later entries of the same
//! section can refer to earlier ones.

use crate::Parser;
use ast::{
    Block, CompoundStmt, ConstDecl, ConstSection, ConstValue, DeclSection, Expr, Factor,
    FormalParam, IdentRef, ImplementationSection, InitSection, InterfaceDecl, InterfaceSection,
    LabelDecl, LabelSection, ParamMode, Program, ProgramBlock, RecordConstField, RoutineDecl,
    RoutineDirective, RoutineHeading, RoutineKind, Statement, TypeDecl, TypeExpr, TypeSection,
    Unit, UsesClause, UsesClauseItem, VarDecl, VarSection,
};
use errors::{Diagnostic, ParserError, ParserResult};
use std::rc::Rc;
use symbols::{DeclId, DeclKind, DeclMap, Declaration, Ident, NodeId, ScopeKind, TypeShape};
use tokens::TokenKind;

/// Where a routine declaration appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoutineContext {
    /// Block or implementation section: a body follows unless a directive
    /// says otherwise
    Block,
    /// Unit interface section
    Interface,
    /// Class, object or interface body
    ClassBody,
}

/// How a typed constant's parenthesized initializer is read
enum Aggregate {
    Array(Option<DeclId>),
    Record(DeclId),
    Scalar,
    /// The declared type did not resolve
    Unknown,
}

impl<'s> Parser<'s> {
    /// `program Name [(params)]; [uses ...;] block .`
    pub fn parse_program(&mut self) -> ParserResult<Program> {
        let id = self.node_id();
        self.expect_reserved("PROGRAM")?;
        let ident = self.expect_ident()?;
        let mut params = Vec::new();
        if self.eat_symbol("(")? {
            params = self.parse_ident_list()?;
            self.expect_symbol(")")?;
        }
        self.expect_symbol(";")?;
        self.scopes.set_own_unit(ident.name.clone());

        self.scopes.push_scope(ScopeKind::Program);
        let uses = self.parse_optional_uses()?;
        let block = self.parse_block()?;
        self.expect_symbol(".")?;
        self.expect_eof()?;
        self.scopes.pop_scope();

        Ok(Program {
            id,
            path: self.path.clone(),
            ident,
            params,
            block: ProgramBlock { uses, block },
        })
    }

    /// `unit Name; interface ... implementation ... [initialization ...] end.`
    pub fn parse_unit(&mut self) -> ParserResult<Unit> {
        let id = self.node_id();
        self.expect_reserved("UNIT")?;
        let ident = self.expect_dotted_name()?;
        let portability = self.parse_portability()?;
        self.expect_symbol(";")?;
        self.scopes.set_own_unit(ident.name.clone());

        self.expect_reserved("INTERFACE")?;
        self.scopes.push_scope(ScopeKind::Interface);
        let uses = self.parse_optional_uses()?;
        let decls = self.parse_interface_decls()?;
        // only the interface is exported
        let decl_map = self.scopes.current().decls.clone();

        self.expect_reserved("IMPLEMENTATION")?;
        self.scopes.push_scope(ScopeKind::Implementation);
        let implementation_uses = self.parse_optional_uses()?;
        let implementation_decls = self.parse_decl_sections()?;
        let init = self.parse_init_section()?;
        self.expect_reserved("END")?;
        self.expect_symbol(".")?;
        self.expect_eof()?;
        self.scopes.pop_scope();
        self.scopes.pop_scope();

        Ok(Unit {
            id,
            path: self.path.clone(),
            ident,
            portability,
            interface: InterfaceSection { uses, decls },
            implementation: ImplementationSection {
                uses: implementation_uses,
                decls: implementation_decls,
            },
            init,
            decl_map,
        })
    }

    fn parse_init_section(&mut self) -> ParserResult<Option<InitSection>> {
        if self.eat_reserved("INITIALIZATION")? {
            let initialization = self.parse_statement_list()?;
            let finalization = if self.eat_reserved("FINALIZATION")? {
                Some(self.parse_statement_list()?)
            } else {
                None
            };
            Ok(Some(InitSection {
                initialization,
                finalization,
            }))
        } else if self.eat_reserved("BEGIN")? {
            Ok(Some(InitSection {
                initialization: self.parse_statement_list()?,
                finalization: None,
            }))
        } else {
            Ok(None)
        }
    }

    fn parse_optional_uses(&mut self) -> ParserResult<Option<UsesClause>> {
        if self.at_reserved("USES") {
            Ok(Some(self.parse_uses_clause()?))
        } else {
            Ok(None)
        }
    }

    /// `uses A, B in 'b.pas', C;` Each unit is loaded before the next
    /// entry is read.
    fn parse_uses_clause(&mut self) -> ParserResult<UsesClause> {
        self.expect_reserved("USES")?;
        let mut items = Vec::new();
        loop {
            let ident = self.expect_dotted_name()?;
            let explicit_path = if self.eat_reserved("IN")? {
                let token = self.consume(
                    &tokens::predicate::kind(TokenKind::CharacterString),
                    "unit file name",
                )?;
                token.string_value()
            } else {
                None
            };
            let unit = self.load_unit(&ident, explicit_path.as_deref())?;
            items.push(UsesClauseItem {
                ident,
                explicit_path,
                unit,
            });
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(";")?;
        Ok(UsesClause { items })
    }

    /// Load a unit and make its exports visible
    pub(crate) fn load_unit(&mut self, ident: &Ident, explicit: Option<&str>) -> ParserResult<Option<Rc<Unit>>> {
        let from = self.path.clone();
        match self.session.load(&ident.name, explicit, from.as_deref()) {
            Ok(Some(unit)) => {
                self.scopes.import_unit(ident.name.clone(), unit.decl_map.clone());
                Ok(Some(unit))
            }
            Ok(None) => {
                self.report(Diagnostic::unresolved_unit(&ident.name, ident.location))?;
                Ok(None)
            }
            Err(source) => Err(ParserError::UnitLoad {
                unit: ident.name.clone(),
                location: ident.location.unwrap_or_default(),
                source: Box::new(source),
            }),
        }
    }

    fn parse_interface_decls(&mut self) -> ParserResult<Vec<InterfaceDecl>> {
        let mut decls = Vec::new();
        loop {
            let decl = if self.at_reserved("CONST") || self.at_reserved("RESOURCESTRING") {
                InterfaceDecl::Const(self.parse_const_section()?)
            } else if self.at_reserved("TYPE") {
                InterfaceDecl::Type(self.parse_type_section()?)
            } else if self.at_reserved("VAR") || self.at_reserved("THREADVAR") {
                InterfaceDecl::Var(self.parse_var_section()?)
            } else if self.at_routine_start() {
                InterfaceDecl::Heading(self.parse_routine_decl(RoutineContext::Interface)?)
            } else {
                break;
            };
            decls.push(decl);
        }
        Ok(decls)
    }

    /// Freely interleaved label, const, type, var and routine sections
    pub(crate) fn parse_decl_sections(&mut self) -> ParserResult<Vec<DeclSection>> {
        let mut decls = Vec::new();
        loop {
            let decl = if self.at_reserved("LABEL") {
                DeclSection::Label(self.parse_label_section()?)
            } else if self.at_reserved("CONST") || self.at_reserved("RESOURCESTRING") {
                DeclSection::Const(self.parse_const_section()?)
            } else if self.at_reserved("TYPE") {
                DeclSection::Type(self.parse_type_section()?)
            } else if self.at_reserved("VAR") || self.at_reserved("THREADVAR") {
                DeclSection::Var(self.parse_var_section()?)
            } else if self.at_routine_start() {
                DeclSection::Routine(self.parse_routine_decl(RoutineContext::Block)?)
            } else {
                break;
            };
            decls.push(decl);
        }
        Ok(decls)
    }

    /// Declarations followed by a compound statement (or an `asm` body)
    pub(crate) fn parse_block(&mut self) -> ParserResult<Block> {
        let start = self.location();
        let decls = self.parse_decl_sections()?;
        let body = if self.at_reserved("ASM") {
            let asm = self.parse_asm()?;
            CompoundStmt {
                range: asm.range,
                statements: vec![Statement::Asm(asm)],
            }
        } else {
            self.parse_compound()?
        };
        Ok(Block {
            decls,
            body,
            range: Some(start.merge(self.previous)),
        })
    }

    pub(crate) fn parse_ident_list(&mut self) -> ParserResult<Vec<Ident>> {
        let mut idents = vec![self.expect_ident()?];
        while self.eat_symbol(",")? {
            idents.push(self.expect_ident()?);
        }
        Ok(idents)
    }

    pub(crate) fn parse_portability(&mut self) -> ParserResult<Vec<Ident>> {
        let mut out = Vec::new();
        while self.current().kind == TokenKind::PortabilityDirective {
            let token = self.advance()?;
            out.push(Ident::new(token.text, token.location));
        }
        Ok(out)
    }

    fn parse_label_section(&mut self) -> ParserResult<LabelSection> {
        self.expect_reserved("LABEL")?;
        let mut labels = Vec::new();
        loop {
            let id = self.node_id();
            let ident = self.expect_label()?;
            self.declare(Declaration::new(ident.clone(), DeclKind::Label, Some(id)))?;
            labels.push(LabelDecl { id, ident });
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(";")?;
        Ok(LabelSection { labels })
    }

    fn parse_const_section(&mut self) -> ParserResult<ConstSection> {
        let resource = self.at_reserved("RESOURCESTRING");
        self.advance()?;
        let mut decls = Vec::new();
        while self.at_ident() {
            decls.push(self.parse_const_decl()?);
        }
        Ok(ConstSection { resource, decls })
    }

    /// `Name [: Type] = Value;` The name is bound after its value so the
    /// value only sees earlier entries.
    fn parse_const_decl(&mut self) -> ParserResult<ConstDecl> {
        let id = self.node_id();
        let ident = self.expect_ident()?;
        let (type_expr, type_decl) = if self.eat_symbol(":")? {
            let (type_expr, handle) = self.parse_type()?;
            (Some(type_expr), handle)
        } else {
            (None, None)
        };
        self.expect_symbol("=")?;
        let value = if type_expr.is_some() {
            self.parse_typed_value(type_decl)?
        } else {
            ConstValue::Expr(self.parse_expression()?)
        };
        let portability = self.parse_portability()?;
        self.expect_symbol(";")?;
        self.declare(Declaration::new(ident.clone(), DeclKind::Constant, Some(id)).with_type(type_decl))?;
        Ok(ConstDecl {
            id,
            ident,
            type_expr,
            value,
            portability,
        })
    }

    /// Initial value of a typed constant or variable. A parenthesized
    /// aggregate is read as an array or record value according to the
    /// declared type.
    pub(crate) fn parse_typed_value(&mut self, type_decl: Option<DeclId>) -> ParserResult<ConstValue> {
        if !self.at_symbol("(") {
            return Ok(ConstValue::Expr(self.parse_expression()?));
        }
        match self.aggregate_shape(type_decl) {
            Aggregate::Array(element) => {
                self.advance()?;
                let mut items = Vec::new();
                if !self.at_symbol(")") {
                    loop {
                        items.push(self.parse_typed_value(element)?);
                        if !self.eat_symbol(",")? {
                            break;
                        }
                    }
                }
                self.expect_symbol(")")?;
                Ok(ConstValue::Array(items))
            }
            Aggregate::Record(record) => {
                self.advance()?;
                let mut fields = Vec::new();
                while self.at_ident() {
                    let name = self.expect_ident()?;
                    self.expect_symbol(":")?;
                    let member = self.session.arena.find_member(record, &name.name);
                    if member.is_none() {
                        self.report(Diagnostic::unresolved(&name.name, name.location))?;
                    }
                    let member_type = self.value_type(member);
                    let value = self.parse_typed_value(member_type)?;
                    fields.push(RecordConstField {
                        field: IdentRef::new(name, member),
                        value,
                    });
                    if !self.eat_symbol(";")? {
                        break;
                    }
                }
                self.expect_symbol(")")?;
                Ok(ConstValue::Record(fields))
            }
            Aggregate::Scalar => Ok(ConstValue::Expr(self.parse_expression()?)),
            Aggregate::Unknown => self.parse_untyped_aggregate(),
        }
    }

    /// `(...)` against a type that did not resolve. `(Name: value; ...)`
    /// reads as a record with unbound fields, `(a, b, ...)` as an array.
    /// A single parenthesized value may continue as an expression.
    fn parse_untyped_aggregate(&mut self) -> ParserResult<ConstValue> {
        self.expect_symbol("(")?;
        if self.at_ident() && self.check_peek(&tokens::predicate::symbol(":")) {
            let mut fields = Vec::new();
            while self.at_ident() {
                let name = self.expect_ident()?;
                self.expect_symbol(":")?;
                let value = self.parse_typed_value(None)?;
                fields.push(RecordConstField {
                    field: IdentRef::new(name, None),
                    value,
                });
                if !self.eat_symbol(";")? {
                    break;
                }
            }
            self.expect_symbol(")")?;
            return Ok(ConstValue::Record(fields));
        }

        let mut items = Vec::new();
        if !self.at_symbol(")") {
            loop {
                items.push(self.parse_typed_value(None)?);
                if !self.eat_symbol(",")? {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;
        if items.len() != 1 {
            return Ok(ConstValue::Array(items));
        }
        match items.pop() {
            Some(ConstValue::Expr(expr)) => {
                let first = Expr::Factor(Factor::Paren {
                    expr: Box::new(expr),
                    items: Vec::new(),
                });
                Ok(ConstValue::Expr(self.parse_expression_from(first)?))
            }
            Some(other) => Ok(ConstValue::Array(vec![other])),
            None => Ok(ConstValue::Array(Vec::new())),
        }
    }

    fn aggregate_shape(&self, type_decl: Option<DeclId>) -> Aggregate {
        let arena = &self.session.arena;
        let mut current = type_decl;
        // alias chains are short; the bound guards against cycles
        for _ in 0..64 {
            let Some(id) = current else {
                return Aggregate::Unknown;
            };
            match arena.get(id).shape {
                TypeShape::Array(element) => return Aggregate::Array(element),
                TypeShape::Structured => return Aggregate::Record(id),
                TypeShape::Alias(target) => current = Some(target),
                _ => return Aggregate::Scalar,
            }
        }
        Aggregate::Scalar
    }

    fn parse_type_section(&mut self) -> ParserResult<TypeSection> {
        self.expect_reserved("TYPE")?;
        let enclosing = self.pending_pointers.replace(Vec::new());
        let mut decls = Vec::new();
        while self.at_ident() {
            decls.push(self.parse_type_decl()?);
        }
        let pending = std::mem::replace(&mut self.pending_pointers, enclosing).unwrap_or_default();
        self.resolve_pending_pointers(pending, &mut decls)?;
        Ok(TypeSection { decls })
    }

    fn parse_type_decl(&mut self) -> ParserResult<TypeDecl> {
        let id = self.node_id();
        let ident = self.expect_ident()?;
        self.expect_symbol("=")?;
        let type_expr = if self.at_class_type() {
            self.parse_class_type_decl(&ident, id)?
        } else {
            let distinct = self.eat_reserved("TYPE")?;
            let (type_expr, handle) = self.parse_type()?;
            let shape = handle.map_or(TypeShape::Opaque, TypeShape::Alias);
            self.declare(Declaration::new(ident.clone(), DeclKind::Type, Some(id)).with_shape(shape))?;
            if distinct {
                TypeExpr::Distinct(Box::new(type_expr))
            } else {
                type_expr
            }
        };
        let portability = self.parse_portability()?;
        self.expect_symbol(";")?;
        Ok(TypeDecl {
            id,
            ident,
            type_expr,
            portability,
        })
    }

    fn parse_var_section(&mut self) -> ParserResult<VarSection> {
        let thread = self.at_reserved("THREADVAR");
        self.advance()?;
        let kind = if thread {
            DeclKind::ThreadVar
        } else {
            DeclKind::Variable
        };
        let mut decls = Vec::new();
        while self.at_ident() {
            decls.push(self.parse_var_decl(kind)?);
        }
        Ok(VarSection { thread, decls })
    }

    /// `A, B: Type [absolute X] [= Init];`
    fn parse_var_decl(&mut self, kind: DeclKind) -> ParserResult<VarDecl> {
        let id = self.node_id();
        let idents = self.parse_ident_list()?;
        self.expect_symbol(":")?;
        let (type_expr, type_decl) = self.parse_type()?;
        let absolute = if self.eat_directive("ABSOLUTE")? {
            let target = self.expect_ident()?;
            Some(self.reference(target)?)
        } else {
            None
        };
        let init = if self.eat_symbol("=")? {
            Some(self.parse_typed_value(type_decl)?)
        } else {
            None
        };
        let portability = self.parse_portability()?;
        self.expect_symbol(";")?;
        for ident in &idents {
            self.declare(Declaration::new(ident.clone(), kind, Some(id)).with_type(type_decl))?;
        }
        Ok(VarDecl {
            id,
            idents,
            type_expr,
            absolute,
            init,
            portability,
        })
    }

    fn at_routine_keyword(&self, token: &tokens::Token) -> bool {
        ["PROCEDURE", "FUNCTION", "CONSTRUCTOR", "DESTRUCTOR"]
            .iter()
            .any(|w| token.is_reserved(w))
    }

    /// A routine heading starts here (`class procedure` included)
    pub(crate) fn at_routine_start(&self) -> bool {
        self.at_routine_keyword(self.current())
            || (self.at_reserved("CLASS") && self.at_routine_keyword(self.peek_token()))
    }

    fn parse_routine_kind(&mut self) -> ParserResult<RoutineKind> {
        let kind = match self.current().upper().as_str() {
            "PROCEDURE" => RoutineKind::Procedure,
            "FUNCTION" => RoutineKind::Function,
            "CONSTRUCTOR" => RoutineKind::Constructor,
            "DESTRUCTOR" => RoutineKind::Destructor,
            _ => return Err(self.unexpected("'procedure' or 'function'")),
        };
        self.advance()?;
        Ok(kind)
    }

    /// Routine heading, directives and, in a block, the body.
    ///
    /// Headings without a body (interface and class headings, `forward`
    /// and `external` routines) are bound as pending declarations that a
    /// later definition with the same name and parameter count completes.
    /// `TFoo.Bar` definitions complete a method heading of `TFoo`.
    pub(crate) fn parse_routine_decl(&mut self, context: RoutineContext) -> ParserResult<RoutineDecl> {
        let id = self.node_id();
        let class_method = self.eat_reserved("CLASS")?;
        let kind = self.parse_routine_kind()?;
        let first = self.expect_ident()?;
        let (qualifier, ident) =
            if context == RoutineContext::Block && self.at_symbol(".") && self.peek_is_ident() {
                self.advance()?;
                let name = self.expect_ident()?;
                (Some(self.reference(first)?), name)
            } else {
                (None, first)
            };
        let class = qualifier
            .as_ref()
            .and_then(|q| q.resolved)
            .and_then(|t| self.session.arena.structured(t));

        // parameters get a scope of their own; it becomes the body's scope
        self.scopes.push_scope(ScopeKind::Routine);
        let params = if self.at_symbol("(") {
            Some(self.parse_formal_params("(", ")")?)
        } else {
            None
        };
        let (result, result_type) = if kind == RoutineKind::Function && self.eat_symbol(":")? {
            let (type_expr, handle) = self.parse_type()?;
            (Some(type_expr), handle)
        } else {
            (None, None)
        };
        let param_map = self.scopes.pop_scope().map(|s| s.decls).unwrap_or_default();
        self.expect_symbol(";")?;
        let directives = self.parse_routine_directives()?;

        let heading_only = context != RoutineContext::Block
            || directives
                .iter()
                .any(|d| matches!(d, RoutineDirective::Forward | RoutineDirective::External { .. }));
        let param_count = match &params {
            Some(params) => Some(params.iter().map(|p| p.idents.len()).sum()),
            None if heading_only => Some(0),
            None => None,
        };
        let mut decl = Declaration::new(ident.clone(), DeclKind::Routine, Some(id))
            .forward(heading_only)
            .with_type(result_type);
        decl.overload = directives.contains(&RoutineDirective::Overload);
        decl.param_count = param_count;

        let decl_id = match (&qualifier, class) {
            (None, _) => self.declare(decl)?,
            (Some(_), Some(class)) => self.declare_method(class, decl)?,
            (Some(_), None) => None,
        };
        if let (Some(decl_id), Some(_)) = (decl_id, &params) {
            self.session.arena.set_members(decl_id, param_map.clone());
        }

        let body = if heading_only {
            None
        } else {
            // a definition may omit the parameter list of its heading
            let body_params = if params.is_some() {
                param_map
            } else {
                decl_id
                    .and_then(|d| self.session.arena.members(d).cloned())
                    .unwrap_or_default()
            };
            let result_type = result_type.or_else(|| decl_id.and_then(|d| self.session.arena.get(d).type_decl));
            let block = self.parse_routine_body(kind, id, class, result_type, body_params)?;
            self.expect_symbol(";")?;
            Some(block)
        };

        Ok(RoutineDecl {
            id,
            heading: RoutineHeading {
                kind,
                class_method,
                qualifier,
                ident,
                params,
                result,
            },
            directives,
            body,
        })
    }

    /// Bind a method definition among its class' members. The class must
    /// already declare a method of that name.
    fn declare_method(&mut self, class: DeclId, decl: Declaration) -> ParserResult<Option<DeclId>> {
        let known = self
            .session
            .arena
            .members(class)
            .map_or(false, |m| m.contains(&decl.ident.name));
        if !known {
            self.report(Diagnostic::unresolved(&decl.ident.name, decl.ident.location))?;
            return Ok(None);
        }
        self.declare_member(class, decl)
    }

    fn parse_routine_body(
        &mut self,
        kind: RoutineKind,
        node: NodeId,
        class: Option<DeclId>,
        result_type: Option<DeclId>,
        params: DeclMap,
    ) -> ParserResult<Block> {
        let enclosing_class = self.current_class;
        if let Some(class) = class {
            self.scopes.push_members(ScopeKind::Members, Some(class));
            self.current_class = Some(class);
        }
        self.scopes.push_with_decls(ScopeKind::Routine, params);
        if let Some(class) = class {
            self.declare_implicit(
                Declaration::new(Ident::unlocated("Self"), DeclKind::SelfRef, Some(node)).with_type(Some(class)),
            );
        }
        if kind == RoutineKind::Function {
            self.declare_implicit(
                Declaration::new(Ident::unlocated("Result"), DeclKind::FunctionResult, Some(node))
                    .with_type(result_type),
            );
        }
        let block = self.parse_block();
        self.scopes.pop_scope();
        if class.is_some() {
            self.scopes.pop_scope();
        }
        self.current_class = enclosing_class;
        block
    }

    /// `(A, B: Integer; var C; const D: string = '')` with `open`/`close`
    /// brackets (`[`/`]` for indexed properties). Parameters are bound in
    /// the current scope.
    pub(crate) fn parse_formal_params(&mut self, open: &'static str, close: &'static str) -> ParserResult<Vec<FormalParam>> {
        self.expect_symbol(open)?;
        let mut params = Vec::new();
        if self.eat_symbol(close)? {
            return Ok(params);
        }
        loop {
            params.push(self.parse_formal_param()?);
            if !self.eat_symbol(";")? {
                break;
            }
        }
        self.expect_symbol(close)?;
        Ok(params)
    }

    fn parse_formal_param(&mut self) -> ParserResult<FormalParam> {
        let id = self.node_id();
        let mode = if self.eat_reserved("VAR")? {
            ParamMode::Var
        } else if self.eat_reserved("CONST")? {
            ParamMode::Const
        } else if self.at_directive("OUT") && self.peek_is_ident() {
            self.advance()?;
            ParamMode::Out
        } else {
            ParamMode::Value
        };
        let idents = self.parse_ident_list()?;
        let (type_expr, type_decl) = if self.eat_symbol(":")? {
            let (type_expr, handle) = self.parse_type()?;
            (Some(type_expr), handle)
        } else {
            (None, None)
        };
        let default = if self.eat_symbol("=")? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        for ident in &idents {
            self.declare(Declaration::new(ident.clone(), DeclKind::Parameter, Some(id)).with_type(type_decl))?;
        }
        Ok(FormalParam {
            id,
            mode,
            idents,
            type_expr,
            default,
        })
    }

    /// Directives after a routine heading, each terminated by `;`
    fn parse_routine_directives(&mut self) -> ParserResult<Vec<RoutineDirective>> {
        let mut directives = Vec::new();
        loop {
            if !matches!(
                self.current().kind,
                TokenKind::Directive | TokenKind::PortabilityDirective
            ) || self.peek_token().is_symbol(":")
            {
                break;
            }
            let upper = self.current().upper();
            let directive = match upper.as_str() {
                "FORWARD" => self.simple_directive(RoutineDirective::Forward)?,
                "OVERLOAD" => self.simple_directive(RoutineDirective::Overload)?,
                "VIRTUAL" => self.simple_directive(RoutineDirective::Virtual)?,
                "DYNAMIC" => self.simple_directive(RoutineDirective::Dynamic)?,
                "OVERRIDE" => self.simple_directive(RoutineDirective::Override)?,
                "ABSTRACT" => self.simple_directive(RoutineDirective::Abstract)?,
                "REINTRODUCE" => self.simple_directive(RoutineDirective::Reintroduce)?,
                "STATIC" => self.simple_directive(RoutineDirective::Static)?,
                "INLINE" => self.simple_directive(RoutineDirective::Inline)?,
                "ASSEMBLER" => self.simple_directive(RoutineDirective::Assembler)?,
                "MESSAGE" => {
                    self.advance()?;
                    RoutineDirective::Message(self.parse_expression()?)
                }
                "EXTERNAL" => {
                    self.advance()?;
                    let library = if self.at_symbol(";") || self.at_directive("NAME") {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    let name = if self.eat_directive("NAME")? {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    RoutineDirective::External { library, name }
                }
                "CDECL" | "STDCALL" | "REGISTER" | "PASCAL" | "SAFECALL" | "EXPORT" | "FAR"
                | "NEAR" | "VARARGS" => {
                    let token = self.advance()?;
                    RoutineDirective::CallingConvention(Ident::new(token.text, token.location))
                }
                _ if self.current().kind == TokenKind::PortabilityDirective => {
                    let token = self.advance()?;
                    RoutineDirective::Portability(Ident::new(token.text, token.location))
                }
                _ => break,
            };
            directives.push(directive);
            if !self.eat_symbol(";")? {
                break;
            }
        }
        Ok(directives)
    }

    fn simple_directive(&mut self, directive: RoutineDirective) -> ParserResult<RoutineDirective> {
        self.advance()?;
        Ok(directive)
    }
}
