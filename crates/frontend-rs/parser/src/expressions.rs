//! Expression parsing
//!
//! Four precedence levels, lowest first: relational, additive,
//! multiplicative, then factors. Designators follow the type of what they
//! name so `Rec.Field`, `List[I]` and `P^.Next` bind their members.

use crate::Parser;
use ast::{
    Arg, BinaryOp, Designator, DesignatorItem, Expr, Factor, Ident, IdentRef, Numeral,
    QualifiedIdent, SetElement, StringLiteral, UnaryOp,
};
use errors::{Diagnostic, ParserResult};
use symbols::{DeclId, DeclKind};
use tokens::TokenKind;

impl<'s> Parser<'s> {
    /// `simple [relop simple]`
    pub(crate) fn parse_expression(&mut self) -> ParserResult<Expr> {
        let first = self.parse_factor()?;
        self.parse_expression_from(first)
    }

    /// Continue an expression whose first factor has already been read
    pub(crate) fn parse_expression_from(&mut self, first: Expr) -> ParserResult<Expr> {
        let left = self.parse_simple_expression_from(first)?;
        match self.relational_op() {
            Some(op) => {
                self.advance()?;
                let right = self.parse_simple_expression()?;
                Ok(binary(op, left, right))
            }
            None => Ok(left),
        }
    }

    /// `term {addop term}`
    pub(crate) fn parse_simple_expression(&mut self) -> ParserResult<Expr> {
        let first = self.parse_factor()?;
        self.parse_simple_expression_from(first)
    }

    fn parse_simple_expression_from(&mut self, first: Expr) -> ParserResult<Expr> {
        let mut left = self.parse_term_from(first)?;
        while let Some(op) = self.additive_op() {
            self.advance()?;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParserResult<Expr> {
        let first = self.parse_factor()?;
        self.parse_term_from(first)
    }

    fn parse_term_from(&mut self, first: Expr) -> ParserResult<Expr> {
        let mut left = first;
        while let Some(op) = self.multiplicative_op() {
            self.advance()?;
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn relational_op(&self) -> Option<BinaryOp> {
        let token = self.current();
        let op = match token.kind {
            TokenKind::SpecialSymbol => match token.text.as_str() {
                "=" => BinaryOp::Eq,
                "<>" => BinaryOp::NotEq,
                "<" => BinaryOp::Less,
                "<=" => BinaryOp::LessEq,
                ">" => BinaryOp::Greater,
                ">=" => BinaryOp::GreaterEq,
                _ => return None,
            },
            TokenKind::ReservedWord => match token.upper().as_str() {
                "IN" => BinaryOp::In,
                "IS" => BinaryOp::Is,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn additive_op(&self) -> Option<BinaryOp> {
        let token = self.current();
        match token.kind {
            TokenKind::SpecialSymbol => match token.text.as_str() {
                "+" => Some(BinaryOp::Add),
                "-" => Some(BinaryOp::Sub),
                _ => None,
            },
            TokenKind::ReservedWord => match token.upper().as_str() {
                "OR" => Some(BinaryOp::Or),
                "XOR" => Some(BinaryOp::Xor),
                _ => None,
            },
            _ => None,
        }
    }

    fn multiplicative_op(&self) -> Option<BinaryOp> {
        let token = self.current();
        match token.kind {
            TokenKind::SpecialSymbol => match token.text.as_str() {
                "*" => Some(BinaryOp::Mul),
                "/" => Some(BinaryOp::RealDiv),
                _ => None,
            },
            TokenKind::ReservedWord => match token.upper().as_str() {
                "DIV" => Some(BinaryOp::Div),
                "MOD" => Some(BinaryOp::Mod),
                "AND" => Some(BinaryOp::And),
                "SHL" => Some(BinaryOp::Shl),
                "SHR" => Some(BinaryOp::Shr),
                "AS" => Some(BinaryOp::As),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn parse_factor(&mut self) -> ParserResult<Expr> {
        let kind = self.current().kind;
        match kind {
            TokenKind::NumeralInt | TokenKind::NumeralReal => {
                let token = self.advance()?;
                return Ok(Expr::Factor(Factor::Number(Numeral {
                    text: token.text,
                    real: kind == TokenKind::NumeralReal,
                })));
            }
            TokenKind::CharacterString => {
                let value = self
                    .current()
                    .string_value()
                    .ok_or_else(|| self.invalid("malformed character string"))?;
                let token = self.advance()?;
                return Ok(Expr::Factor(Factor::String(StringLiteral {
                    text: token.text,
                    value,
                })));
            }
            _ => {}
        }

        if self.eat_reserved("NIL")? {
            return Ok(Expr::Factor(Factor::Nil));
        }
        if self.eat_reserved("NOT")? {
            return Ok(unary(UnaryOp::Not, self.parse_factor()?));
        }
        if self.eat_symbol("-")? {
            return Ok(unary(UnaryOp::Neg, self.parse_factor()?));
        }
        if self.eat_symbol("+")? {
            return Ok(unary(UnaryOp::Pos, self.parse_factor()?));
        }
        if self.eat_symbol("@")? {
            return Ok(Expr::Factor(Factor::AddressOf(self.parse_designator()?)));
        }
        if self.at_symbol("[") {
            return Ok(Expr::Factor(Factor::Set(self.parse_set_constructor()?)));
        }
        if self.eat_symbol("(")? {
            let expr = self.parse_expression()?;
            self.expect_symbol(")")?;
            let mut scratch = IdentRef::new(Ident::unlocated(""), None);
            let cast = self.cast_type(&expr);
            let (items, _) = self.parse_designator_items(&mut scratch, cast)?;
            return Ok(Expr::Factor(Factor::Paren {
                expr: Box::new(expr),
                items,
            }));
        }
        if self.eat_reserved("INHERITED")? {
            return Ok(Expr::Factor(Factor::Inherited(self.parse_inherited_designator()?)));
        }
        if self.at_reserved("STRING") && self.peek_token().is_symbol("(") {
            // `string(P)` cast; the type name is not a declared identifier
            let token = self.advance()?;
            let mut root = IdentRef::new(Ident::new(token.text, token.location), None);
            let (items, _) = self.parse_designator_items(&mut root, None)?;
            return Ok(Expr::Factor(Factor::Designator(Designator {
                root: QualifiedIdent::simple(root),
                items,
            })));
        }
        if self.at_ident() {
            return Ok(Expr::Factor(Factor::Designator(self.parse_designator()?)));
        }
        Err(self.unexpected("expression"))
    }

    /// `[]`, `[A, B..C]`
    fn parse_set_constructor(&mut self) -> ParserResult<Vec<SetElement>> {
        self.expect_symbol("[")?;
        let mut elements = Vec::new();
        if self.eat_symbol("]")? {
            return Ok(elements);
        }
        loop {
            let low = self.parse_expression()?;
            let high = if self.eat_symbol("..")? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            elements.push(SetElement { low, high });
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_symbol("]")?;
        Ok(elements)
    }

    pub(crate) fn parse_designator(&mut self) -> ParserResult<Designator> {
        Ok(self.parse_designator_typed()?.0)
    }

    /// Parse a designator and return the type of the value it denotes,
    /// when that is known
    pub(crate) fn parse_designator_typed(&mut self) -> ParserResult<(Designator, Option<DeclId>)> {
        let first = self.expect_ident()?;
        let mut root = if self.is_unit_qualifier(&first.name) {
            self.advance()?;
            let name = self.expect_ident()?;
            self.reference_qualified(first, name)?
        } else {
            QualifiedIdent::simple(self.reference(first)?)
        };
        let current = self.value_type(root.resolved());
        let (items, current) = self.parse_designator_items(&mut root.ident, current)?;
        Ok((Designator { root, items }, current))
    }

    /// Name after `inherited`, looked up among the members of the enclosing
    /// class' ancestor. `None` for a bare `inherited`.
    pub(crate) fn parse_inherited_designator(&mut self) -> ParserResult<Option<Designator>> {
        if !self.at_ident() {
            return Ok(None);
        }
        let ident = self.expect_ident()?;
        let ancestor = self.current_class.and_then(|c| self.session.arena.get(c).ancestor);
        let resolved = ancestor.and_then(|a| self.session.arena.find_member(a, &ident.name));
        // an ancestor outside the parsed sources has unknown members
        if ancestor.is_some() && resolved.is_none() {
            self.report(Diagnostic::unresolved(&ident.name, ident.location))?;
        }
        let mut root = IdentRef::new(ident, resolved);
        let current = self.value_type(resolved);
        let (items, _) = self.parse_designator_items(&mut root, current)?;
        Ok(Some(Designator {
            root: QualifiedIdent::simple(root),
            items,
        }))
    }

    /// `.Field`, `[Index]`, `^` and `(Args)` selectors. `current` is the
    /// type of the value selected so far.
    fn parse_designator_items(
        &mut self,
        root: &mut IdentRef,
        mut current: Option<DeclId>,
    ) -> ParserResult<(Vec<DesignatorItem>, Option<DeclId>)> {
        let mut items = Vec::new();
        loop {
            if self.at_symbol(".") && self.peek_is_ident() {
                self.advance()?;
                let ident = self.expect_ident()?;
                let resolved = current.and_then(|t| self.session.arena.find_member(t, &ident.name));
                current = self.value_type(resolved);
                items.push(DesignatorItem::Field(IdentRef::new(ident, resolved)));
            } else if self.eat_symbol("[")? {
                let mut indexes = vec![self.parse_expression()?];
                while self.eat_symbol(",")? {
                    indexes.push(self.parse_expression()?);
                }
                self.expect_symbol("]")?;
                for _ in &indexes {
                    current = current.and_then(|t| self.session.arena.element_type(t));
                }
                items.push(DesignatorItem::Index(indexes));
            } else if self.eat_symbol("^")? {
                current = current.and_then(|t| self.session.arena.pointee(t));
                items.push(DesignatorItem::Deref);
            } else if self.at_symbol("(") {
                let args = self.parse_args()?;
                let callee = match items.last_mut() {
                    None => Some(&mut *root),
                    Some(DesignatorItem::Field(field)) => Some(field),
                    Some(_) => None,
                };
                if let Some(callee) = callee {
                    if let Some(picked) = self.pick_overload(callee.resolved, args.len()) {
                        callee.resolved = Some(picked);
                        current = self.value_type(Some(picked));
                    }
                }
                items.push(DesignatorItem::Call(args));
            } else {
                break;
            }
        }
        Ok((items, current))
    }

    /// Type named on the right of `x as T`, so selectors after
    /// `(x as T)` bind members of `T`
    fn cast_type(&self, expr: &Expr) -> Option<DeclId> {
        let Expr::Binary {
            op: BinaryOp::As,
            right,
            ..
        } = expr
        else {
            return None;
        };
        let designator = right.as_designator()?;
        if !designator.items.is_empty() {
            return None;
        }
        let id = designator.root.resolved()?;
        (self.session.arena.get(id).kind == DeclKind::Type).then_some(id)
    }

    /// Member of an overload set matching the argument count
    fn pick_overload(&self, head: Option<DeclId>, arity: usize) -> Option<DeclId> {
        let head = head?;
        let arena = &self.session.arena;
        let decl = arena.get(head);
        if decl.kind != DeclKind::Routine || decl.next_overload.is_none() {
            return None;
        }
        arena.overload_with_arity(head, arity)
    }

    /// `(A, B:8, C:8:2)`
    fn parse_args(&mut self) -> ParserResult<Vec<Arg>> {
        self.expect_symbol("(")?;
        let mut args = Vec::new();
        if self.eat_symbol(")")? {
            return Ok(args);
        }
        loop {
            let value = self.parse_expression()?;
            let width = if self.eat_symbol(":")? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let decimals = if width.is_some() && self.eat_symbol(":")? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            args.push(Arg {
                value,
                width,
                decimals,
            });
            if !self.eat_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(args)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

#[cfg(test)]
mod tests {
    use crate::{ParseOptions, Parser, Session};
    use ast::{BinaryOp, DesignatorItem, Expr, Factor, UnaryOp};
    use errors::ParserError;

    fn expr(src: &str) -> Expr {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new(src, None, &mut session).unwrap();
        parser.parse_expression_fragment().unwrap()
    }

    fn op(e: &Expr) -> BinaryOp {
        match e {
            Expr::Binary { op, .. } => *op,
            other => panic!("expected a binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // a + b * c = d  ==>  (a + (b * c)) = d
        let e = expr("a + b * c = d");
        assert_eq!(op(&e), BinaryOp::Eq);
        let Expr::Binary { left, .. } = &e else { unreachable!() };
        assert_eq!(op(left), BinaryOp::Add);
        let Expr::Binary { right, .. } = left.as_ref() else { unreachable!() };
        assert_eq!(op(right), BinaryOp::Mul);
    }

    #[test]
    fn test_additive_is_left_associative() {
        let e = expr("a - b - c");
        let Expr::Binary { left, op: outer, .. } = &e else { unreachable!() };
        assert_eq!(*outer, BinaryOp::Sub);
        assert_eq!(op(left), BinaryOp::Sub);
    }

    #[test]
    fn test_word_operators() {
        assert_eq!(op(&expr("x div 2")), BinaryOp::Div);
        assert_eq!(op(&expr("x shl 2")), BinaryOp::Shl);
        assert_eq!(op(&expr("x in [1, 3..5]")), BinaryOp::In);
        assert_eq!(op(&expr("Sender is TButton")), BinaryOp::Is);
        assert_eq!(op(&expr("a or b and c")), BinaryOp::Or);
    }

    #[test]
    fn test_unary_and_literals() {
        let Expr::Unary { op, operand } = expr("not Done") else { panic!() };
        assert_eq!(op, UnaryOp::Not);
        assert!(operand.as_designator().is_some());

        let Expr::Unary { op, .. } = expr("-X") else { panic!() };
        assert_eq!(op, UnaryOp::Neg);

        // a sign before a literal in operand position belongs to the numeral
        let Expr::Factor(Factor::Number(n)) = expr("-1.5") else { panic!() };
        assert!(n.real);
        assert_eq!(n.text, "-1.5");

        let Expr::Factor(Factor::String(s)) = expr("'it''s'#33") else { panic!() };
        assert_eq!(s.value, "it's!");

        let Expr::Factor(Factor::Number(n)) = expr("$FF") else { panic!() };
        assert!(!n.real);

        assert!(matches!(expr("nil"), Expr::Factor(Factor::Nil)));
        let Expr::Factor(Factor::Set(elements)) = expr("[]") else { panic!() };
        assert!(elements.is_empty());
    }

    #[test]
    fn test_designator_items() {
        let e = expr("List[I, J]^.Items(0).Name");
        let d = e.as_designator().unwrap();
        assert_eq!(d.root.ident.name(), "List");
        assert!(matches!(&d.items[0], DesignatorItem::Index(ix) if ix.len() == 2));
        assert_eq!(d.items[1], DesignatorItem::Deref);
        assert!(matches!(&d.items[2], DesignatorItem::Field(f) if f.name() == "Items"));
        assert!(matches!(&d.items[3], DesignatorItem::Call(args) if args.len() == 1));
        assert!(matches!(&d.items[4], DesignatorItem::Field(f) if f.name() == "Name"));
    }

    #[test]
    fn test_format_args_and_paren_selectors() {
        let e = expr("Format(X:8:2, Y:4)");
        let d = e.as_designator().unwrap();
        let DesignatorItem::Call(args) = &d.items[0] else { panic!() };
        assert!(args[0].width.is_some() && args[0].decimals.is_some());
        assert!(args[1].width.is_some() && args[1].decimals.is_none());

        let Expr::Factor(Factor::Paren { items, .. }) = expr("(Obj as TFoo).Bar") else { panic!() };
        assert_eq!(items.len(), 1);

        let Expr::Factor(Factor::AddressOf(target)) = expr("@Handler") else { panic!() };
        assert_eq!(target.root.ident.name(), "Handler");
    }

    #[test]
    fn test_missing_operand() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("a + ;", None, &mut session).unwrap();
        match parser.parse_expression() {
            Err(ParserError::UnexpectedToken { expected, text, .. }) => {
                assert_eq!(expected, "expression");
                assert_eq!(text, ";");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
