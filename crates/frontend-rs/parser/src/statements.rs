//! Statement parsing
//!
//! This module handles every statement form: assignments and calls,
//! structured statements, exception handling, `goto` and labels, and
//! `asm` bodies.

use crate::Parser;
use ast::{
    AsmStmt, CaseArm, CaseLabel, CaseStmt, CompoundStmt, ExceptionHandler, Expr, Factor,
    ForDirection, Statement, TryExceptStmt,
};
use errors::ParserResult;
use symbols::{DeclKind, Declaration, ScopeKind};
use tokens::TokenKind;

impl<'s> Parser<'s> {
    /// Statements separated by `;`. Empty statements are dropped.
    pub(crate) fn parse_statement_list(&mut self) -> ParserResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            let statement = self.parse_statement()?;
            if !matches!(statement, Statement::Empty) {
                statements.push(statement);
            }
            if !self.eat_symbol(";")? {
                break;
            }
        }
        Ok(statements)
    }

    /// Parse one statement; `Empty` when no statement starts here
    pub(crate) fn parse_statement(&mut self) -> ParserResult<Statement> {
        let labeled = self.peek_token().is_symbol(":")
            && (self.at_ident() || self.current().kind == TokenKind::NumeralInt);
        if labeled {
            let label = self.expect_label()?;
            self.expect_symbol(":")?;
            let label = self.reference(label)?;
            let statement = self.parse_statement()?;
            return Ok(Statement::Labeled {
                label,
                statement: Box::new(statement),
            });
        }

        if self.current().kind == TokenKind::ReservedWord {
            match self.current().upper().as_str() {
                "BEGIN" => return Ok(Statement::Compound(self.parse_compound()?)),
                "IF" => return self.parse_if(),
                "CASE" => return self.parse_case(),
                "FOR" => return self.parse_for(),
                "WHILE" => return self.parse_while(),
                "REPEAT" => return self.parse_repeat(),
                "WITH" => return self.parse_with(),
                "TRY" => return self.parse_try(),
                "RAISE" => return self.parse_raise(),
                "ASM" => return Ok(Statement::Asm(self.parse_asm()?)),
                "GOTO" => {
                    self.advance()?;
                    let label = self.expect_label()?;
                    return Ok(Statement::Goto(self.reference(label)?));
                }
                "INHERITED" => {
                    self.advance()?;
                    return Ok(Statement::Inherited(self.parse_inherited_designator()?));
                }
                _ => return Ok(Statement::Empty),
            }
        }

        if self.at_ident() {
            return self.parse_simple_statement();
        }
        if self.at_symbol("(") {
            return self.parse_paren_statement();
        }
        Ok(Statement::Empty)
    }

    /// `(expr).Selector ... [:= value]`
    fn parse_paren_statement(&mut self) -> ParserResult<Statement> {
        let target = self.parse_factor()?;
        let value = if self.eat_symbol(":=")? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Statement::ParenTarget { target, value })
    }

    /// Assignment or procedure call
    fn parse_simple_statement(&mut self) -> ParserResult<Statement> {
        let target = self.parse_designator()?;
        if self.eat_symbol(":=")? {
            let value = self.parse_expression()?;
            return Ok(Statement::Assign { target, value });
        }
        Ok(Statement::Call(target))
    }

    /// `begin ... end`
    pub(crate) fn parse_compound(&mut self) -> ParserResult<CompoundStmt> {
        let start = self.location();
        self.expect_reserved("BEGIN")?;
        let statements = self.parse_statement_list()?;
        self.expect_reserved("END")?;
        Ok(CompoundStmt {
            statements,
            range: Some(start.merge(self.previous)),
        })
    }

    fn parse_if(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("IF")?;
        let condition = self.parse_expression()?;
        self.expect_reserved("THEN")?;
        let then_branch = Box::new(self.parse_statement()?);
        // a dangling else binds to the nearest if
        let else_branch = if self.eat_reserved("ELSE")? {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_case(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("CASE")?;
        let selector = self.parse_expression()?;
        self.expect_reserved("OF")?;

        let mut arms = Vec::new();
        while !self.at_reserved("END") && !self.at_reserved("ELSE") {
            let mut labels = Vec::new();
            loop {
                let low = self.parse_expression()?;
                let high = if self.eat_symbol("..")? {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                labels.push(CaseLabel { low, high });
                if !self.eat_symbol(",")? {
                    break;
                }
            }
            self.expect_symbol(":")?;
            let statement = self.parse_statement()?;
            arms.push(CaseArm { labels, statement });
            if !self.eat_symbol(";")? {
                break;
            }
        }

        let else_branch = if self.eat_reserved("ELSE")? {
            Some(self.parse_statement_list()?)
        } else {
            None
        };
        self.expect_reserved("END")?;
        Ok(Statement::Case(CaseStmt {
            selector,
            arms,
            else_branch,
        }))
    }

    /// `for I := A to B do` and `for X in Items do`
    fn parse_for(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("FOR")?;
        let ident = self.expect_ident()?;
        let variable = self.reference(ident)?;

        if self.eat_reserved("IN")? {
            let collection = self.parse_expression()?;
            self.expect_reserved("DO")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Statement::ForIn {
                variable,
                collection,
                body,
            });
        }

        self.expect_symbol(":=")?;
        let start = self.parse_expression()?;
        let direction = if self.eat_reserved("TO")? {
            ForDirection::To
        } else if self.eat_reserved("DOWNTO")? {
            ForDirection::DownTo
        } else {
            return Err(self.unexpected("'to' or 'downto'"));
        };
        let end = self.parse_expression()?;
        self.expect_reserved("DO")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For {
            variable,
            start,
            direction,
            end,
            body,
        })
    }

    fn parse_while(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("WHILE")?;
        let condition = self.parse_expression()?;
        self.expect_reserved("DO")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { condition, body })
    }

    fn parse_repeat(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("REPEAT")?;
        let statements = self.parse_statement_list()?;
        self.expect_reserved("UNTIL")?;
        let condition = self.parse_expression()?;
        Ok(Statement::Repeat {
            statements,
            condition,
        })
    }

    /// `with A, B do S`. Each target opens a scope over its members before
    /// the next target is parsed.
    fn parse_with(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("WITH")?;
        let depth = self.scopes.depth();
        let result = self.parse_with_targets();
        while self.scopes.depth() > depth {
            self.scopes.pop_scope();
        }
        let (targets, body) = result?;
        Ok(Statement::With {
            targets,
            body: Box::new(body),
        })
    }

    fn parse_with_targets(&mut self) -> ParserResult<(Vec<Expr>, Statement)> {
        let mut targets = Vec::new();
        loop {
            let (target, type_decl) = if self.at_ident() {
                let (designator, type_decl) = self.parse_designator_typed()?;
                (Expr::Factor(Factor::Designator(designator)), type_decl)
            } else {
                (self.parse_expression()?, None)
            };
            let members_of = type_decl.and_then(|t| self.session.arena.structured(t));
            self.scopes.push_members(ScopeKind::With, members_of);
            targets.push(target);
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_reserved("DO")?;
        let body = self.parse_statement()?;
        Ok((targets, body))
    }

    fn parse_try(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("TRY")?;
        let statements = self.parse_statement_list()?;

        if self.eat_reserved("FINALLY")? {
            let finally = self.parse_statement_list()?;
            self.expect_reserved("END")?;
            return Ok(Statement::TryFinally {
                statements,
                finally,
            });
        }

        self.expect_reserved("EXCEPT")?;
        let mut handlers = Vec::new();
        let mut else_branch = None;
        let mut except_statements = Vec::new();
        if self.at_handler() {
            while self.at_handler() {
                handlers.push(self.parse_handler()?);
                if !self.eat_symbol(";")? {
                    break;
                }
            }
            if self.eat_reserved("ELSE")? {
                else_branch = Some(self.parse_statement_list()?);
            }
        } else {
            except_statements = self.parse_statement_list()?;
        }
        self.expect_reserved("END")?;
        Ok(Statement::TryExcept(TryExceptStmt {
            statements,
            handlers,
            else_branch,
            except_statements,
        }))
    }

    fn at_handler(&self) -> bool {
        self.at_directive("ON") && self.peek_is_ident()
    }

    /// `on [E:] EType do Statement`; `E` is visible in the statement only
    fn parse_handler(&mut self) -> ParserResult<ExceptionHandler> {
        let id = self.node_id();
        self.advance()?;
        let ident = if self.peek_token().is_symbol(":") {
            let ident = self.expect_ident()?;
            self.advance()?;
            Some(ident)
        } else {
            None
        };
        let type_ref = self.parse_type_name()?;
        self.expect_reserved("DO")?;

        self.scopes.push_scope(ScopeKind::Handler);
        if let Some(ident) = &ident {
            let decl = Declaration::new(ident.clone(), DeclKind::ExceptionVar, Some(id))
                .with_type(type_ref.resolved());
            self.declare(decl)?;
        }
        let statement = self.parse_statement();
        self.scopes.pop_scope();

        Ok(ExceptionHandler {
            id,
            ident,
            type_ref,
            statement: statement?,
        })
    }

    /// `raise`, `raise E`, `raise E at Address`
    fn parse_raise(&mut self) -> ParserResult<Statement> {
        self.expect_reserved("RAISE")?;
        if self.at_statement_end() {
            return Ok(Statement::Raise {
                exception: None,
                at: None,
            });
        }
        let exception = self.parse_expression()?;
        let at = if self.eat_directive("AT")? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Statement::Raise {
            exception: Some(exception),
            at,
        })
    }

    fn at_statement_end(&self) -> bool {
        self.at_symbol(";")
            || self.current().is_eof()
            || ["END", "ELSE", "UNTIL", "EXCEPT", "FINALLY"]
                .iter()
                .any(|w| self.at_reserved(w))
    }

    /// `asm ... end`; the instructions are skipped
    pub(crate) fn parse_asm(&mut self) -> ParserResult<AsmStmt> {
        let start = self.location();
        self.expect_reserved("ASM")?;
        while !self.at_reserved("END") {
            if self.current().is_eof() {
                return Err(self.unexpected("'end'"));
            }
            self.advance()?;
        }
        self.advance()?;
        Ok(AsmStmt {
            range: Some(start.merge(self.previous)),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse_program_source, ParseOptions, Parser, Session};
    use ast::{DesignatorItem, ForDirection, HasRange, Statement};
    use errors::ParserError;
    use symbols::DeclKind;

    fn statement(src: &str) -> Statement {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new(src, None, &mut session).unwrap();
        parser.parse_statement_fragment().unwrap()
    }

    fn body(parsed: &crate::ParsedProgram) -> &[Statement] {
        &parsed.program.block.block.body.statements
    }

    #[test]
    fn test_dangling_else_binds_inner_if() {
        let Statement::If { then_branch, else_branch, .. } = statement("if a then if b then x else y") else {
            panic!("expected if");
        };
        assert!(else_branch.is_none());
        let Statement::If { else_branch, .. } = *then_branch else { panic!("expected inner if") };
        assert!(else_branch.is_some());
    }

    #[test]
    fn test_case_with_ranges_and_else() {
        let Statement::Case(case) = statement("case N of 1..5, 7: A; 6: begin B end; else C; D end") else {
            panic!("expected case");
        };
        assert_eq!(case.arms.len(), 2);
        assert_eq!(case.arms[0].labels.len(), 2);
        assert!(case.arms[0].labels[0].high.is_some());
        assert_eq!(case.else_branch.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_loops() {
        let Statement::For { direction, .. } = statement("for I := 10 downto 1 do Write(I)") else {
            panic!("expected for");
        };
        assert_eq!(direction, ForDirection::DownTo);
        assert!(matches!(statement("for S in List do Write(S)"), Statement::ForIn { .. }));
        assert!(matches!(statement("while X > 0 do X := X - 1"), Statement::While { .. }));
        let Statement::Repeat { statements, .. } = statement("repeat A; B; until Done") else {
            panic!("expected repeat");
        };
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_missing_then() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("if x do y", None, &mut session).unwrap();
        match parser.parse_statement() {
            Err(ParserError::UnexpectedToken { expected, text, .. }) => {
                assert_eq!(expected, "'then'");
                assert_eq!(text, "do");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_with_opens_record_members() {
        let src = r#"
program P;
type
  TPoint = record X, Y: Integer; end;
  TLine = record A, B: TPoint; end;
var
  L: TLine;
begin
  with L, A do
    X := B.Y
end.
"#;
        let parsed = parse_program_source(src).unwrap();
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let Statement::With { targets, body } = &body(&parsed)[0] else { panic!("expected with") };
        assert_eq!(targets.len(), 2);
        let Statement::Assign { target, value } = body.as_ref() else { panic!("expected assignment") };
        assert_eq!(parsed.declaration(target.root.resolved().unwrap()).kind, DeclKind::Field);
        let source = value.as_designator().unwrap();
        let DesignatorItem::Field(y) = &source.items[0] else { panic!("expected field") };
        assert_eq!(parsed.declaration(y.resolved.unwrap()).kind, DeclKind::Field);
    }

    #[test]
    fn test_with_scope_ends_with_statement() {
        let src = r#"
program P;
var R: record Count: Integer; end;
begin
  with R do Count := 1;
  Count := 2
end.
"#;
        let parsed = parse_program_source(src).unwrap();
        assert_eq!(parsed.diagnostics.len(), 1, "{:?}", parsed.diagnostics);
        assert_eq!(parsed.diagnostics[0].name.as_deref(), Some("Count"));
        assert_eq!(parsed.diagnostics[0].location.map(|l| l.start.line), Some(6));
    }

    #[test]
    fn test_goto_forward_and_backward() {
        let src = r#"
program P;
label Again, 99;
var I: Integer;
begin
  Again: I := I + 1;
  if I < 10 then goto Again;
  goto 99;
  99: ;
end.
"#;
        let parsed = parse_program_source(src).unwrap();
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let statements = body(&parsed);
        let Statement::Labeled { label, .. } = &statements[0] else { panic!("expected label") };
        let again = label.resolved.unwrap();
        let Statement::If { then_branch, .. } = &statements[1] else { panic!("expected if") };
        let Statement::Goto(target) = then_branch.as_ref() else { panic!("expected goto") };
        assert_eq!(target.resolved, Some(again));
        let Statement::Goto(forward) = &statements[2] else { panic!("expected goto") };
        let Statement::Labeled { label, statement } = &statements[3] else { panic!("expected label") };
        assert_eq!(forward.resolved, label.resolved);
        assert_eq!(**statement, Statement::Empty);
    }

    #[test]
    fn test_try_except_handlers() {
        let src = r#"
program P;
type
  EError = class
    Message: string;
  end;
begin
  try
    Work
  except
    on E: EError do Show(E.Message);
    on EError do Show('other')
  else
    Show('unknown')
  end;
  try
    Work
  finally
    Cleanup
  end
end.
"#;
        let parsed = parse_program_source(src).unwrap();
        let unresolved: Vec<_> = parsed.diagnostics.iter().filter_map(|d| d.name.as_deref()).collect();
        assert!(unresolved.iter().all(|n| ["Work", "Show", "Cleanup"].contains(n)), "{:?}", unresolved);

        let Statement::TryExcept(try_except) = &body(&parsed)[0] else { panic!("expected try/except") };
        assert_eq!(try_except.handlers.len(), 2);
        assert!(try_except.else_branch.is_some());
        let handler = &try_except.handlers[0];
        let Statement::Call(show) = &handler.statement else { panic!("expected call") };
        let DesignatorItem::Call(args) = &show.items[0] else { panic!("expected args") };
        let e = args[0].value.as_designator().unwrap();
        let exception_var = parsed.declaration(e.root.resolved().unwrap());
        assert_eq!(exception_var.kind, DeclKind::ExceptionVar);
        assert_eq!(exception_var.node, Some(handler.id));
        let DesignatorItem::Field(message) = &e.items[0] else { panic!("expected field") };
        assert!(message.resolved.is_some());
        assert!(matches!(&body(&parsed)[1], Statement::TryFinally { .. }));
    }

    #[test]
    fn test_statement_through_parenthesized_cast() {
        let src = r#"
program P;
type
  TControl = class
    Tag: Integer;
  end;
  TButton = class(TControl)
    Caption: string;
    procedure Click;
  end;
var S: TControl;
procedure TButton.Click; begin end;
begin
  (S as TButton).Caption := 'x';
  (S as TButton).Click
end.
"#;
        let parsed = parse_program_source(src).unwrap();
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let statements = body(&parsed);
        assert_eq!(statements.len(), 2);

        let Statement::ParenTarget { target, value: Some(_) } = &statements[0] else {
            panic!("expected an assignment through a cast")
        };
        let ast::Expr::Factor(ast::Factor::Paren { items, .. }) = target else {
            panic!("expected a parenthesized target")
        };
        let [DesignatorItem::Field(caption)] = items.as_slice() else {
            panic!("expected one field selector")
        };
        let caption = caption.resolved.unwrap();
        assert_eq!(parsed.declaration(caption).ident.name, "Caption");

        assert!(matches!(&statements[1], Statement::ParenTarget { value: None, .. }));
    }

    #[test]
    fn test_raise_forms() {
        assert!(matches!(statement("raise"), Statement::Raise { exception: None, at: None }));
        let Statement::Raise { exception, at } = statement("raise E at Addr") else { panic!() };
        assert!(exception.is_some() && at.is_some());
    }

    #[test]
    fn test_asm_and_compound_ranges() {
        let Statement::Asm(asm) = statement("asm mov eax, 1 end") else { panic!("expected asm") };
        let range = asm.range.unwrap();
        assert_eq!((range.start.index, range.end.index), (0, 18));

        let Statement::Compound(compound) = statement("begin end") else { panic!("expected compound") };
        assert_eq!(compound.range().map(|r| r.end.index), Some(9));
    }
}
