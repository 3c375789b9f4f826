// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, StmtNode,
    UnaryOp,
};
use crate::errors::CompileError;
use crate::lex::Token;
use loam_var::{ErrorCode, Symbol, v_err, v_float, v_int, v_objid, v_str, SYSTEM_OBJECT};

/// Recursive-descent parser over the token stream. Expressions use precedence climbing;
/// statements are block-keyword driven. `$` is legal only inside `[...]`, tracked with a
/// depth counter.
pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    index_depth: usize,
}

/// Binding powers, loosest to tightest. Assignment and the catch suffix sit below these.
fn binary_op(t: &Token) -> Option<(BinaryOp, u8, bool)> {
    // (op, binding power, right-assoc)
    match t {
        Token::Eq => Some((BinaryOp::Eq, 3, false)),
        Token::Ne => Some((BinaryOp::NEq, 3, false)),
        Token::Lt => Some((BinaryOp::Lt, 3, false)),
        Token::Gt => Some((BinaryOp::Gt, 3, false)),
        Token::Le => Some((BinaryOp::LtE, 3, false)),
        Token::Ge => Some((BinaryOp::GtE, 3, false)),
        Token::In => Some((BinaryOp::In, 3, false)),
        Token::Plus => Some((BinaryOp::Add, 4, false)),
        Token::Minus => Some((BinaryOp::Sub, 4, false)),
        Token::Star => Some((BinaryOp::Mul, 5, false)),
        Token::Slash => Some((BinaryOp::Div, 5, false)),
        Token::Percent => Some((BinaryOp::Mod, 5, false)),
        Token::Caret => Some((BinaryOp::Exp, 6, true)),
        _ => None,
    }
}

enum BraceItem {
    Plain(Arg),
    Optional(Symbol, Option<Expr>),
}

impl Parser {
    pub fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self {
            tokens,
            pos: 0,
            index_depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let t = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or(CompileError::UnexpectedEof)?;
        self.pos += 1;
        Ok(t)
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Token) -> Result<(), CompileError> {
        let line = self.line();
        match self.peek() {
            Some(found) if found == t => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(CompileError::at(
                line,
                format!("expected {} but found {}", t.describe(), found.describe()),
            )),
            None => Err(CompileError::UnexpectedEof),
        }
    }

    fn expect_ident(&mut self) -> Result<Symbol, CompileError> {
        let line = self.line();
        match self.advance()? {
            Token::Ident(s) => Ok(Symbol::mk(&s)),
            t => Err(CompileError::at(
                line,
                format!("expected identifier but found {}", t.describe()),
            )),
        }
    }

    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = vec![];
        while self.peek().is_some() {
            if let Some(stmt) = self.parse_statement()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Option<Stmt>, CompileError> {
        let line = self.line();
        let node = match self.peek() {
            Some(Token::Semicolon) => {
                self.pos += 1;
                return Ok(None);
            }
            Some(Token::If) => self.parse_if()?,
            Some(Token::While) => self.parse_while()?,
            Some(Token::For) => self.parse_for()?,
            Some(Token::Try) => self.parse_try()?,
            Some(Token::Fork) => self.parse_fork()?,
            Some(Token::Break) => {
                self.pos += 1;
                self.expect(&Token::Semicolon)?;
                StmtNode::Break
            }
            Some(Token::Continue) => {
                self.pos += 1;
                self.expect(&Token::Semicolon)?;
                StmtNode::Continue
            }
            Some(Token::Return) => {
                self.pos += 1;
                let expr = if self.peek() == Some(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semicolon)?;
                StmtNode::Return(expr)
            }
            Some(_) => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                StmtNode::Expr(expr)
            }
            None => return Err(CompileError::UnexpectedEof),
        };
        Ok(Some(Stmt::new(node, line)))
    }

    /// Parse statements until one of `terminators` shows up at this block depth; the found
    /// terminator is consumed and returned.
    fn parse_stmts_until(
        &mut self,
        terminators: &[Token],
    ) -> Result<(Vec<Stmt>, Token), CompileError> {
        let mut stmts = vec![];
        loop {
            match self.peek() {
                Some(t) if terminators.contains(t) => {
                    let t = t.clone();
                    self.pos += 1;
                    return Ok((stmts, t));
                }
                Some(_) => {
                    if let Some(stmt) = self.parse_statement()? {
                        stmts.push(stmt);
                    }
                }
                None => return Err(CompileError::UnexpectedEof),
            }
        }
    }

    fn parse_if(&mut self) -> Result<StmtNode, CompileError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let (statements, mut term) =
            self.parse_stmts_until(&[Token::Elseif, Token::Else, Token::Endif])?;
        let mut arms = vec![CondArm {
            condition,
            statements,
        }];
        let mut otherwise = vec![];
        loop {
            match term {
                Token::Elseif => {
                    self.expect(&Token::LParen)?;
                    let condition = self.parse_expr()?;
                    self.expect(&Token::RParen)?;
                    let (statements, t) =
                        self.parse_stmts_until(&[Token::Elseif, Token::Else, Token::Endif])?;
                    arms.push(CondArm {
                        condition,
                        statements,
                    });
                    term = t;
                }
                Token::Else => {
                    let (statements, _) = self.parse_stmts_until(&[Token::Endif])?;
                    otherwise = statements;
                    break;
                }
                _ => break,
            }
        }
        Ok(StmtNode::Cond { arms, otherwise })
    }

    fn parse_while(&mut self) -> Result<StmtNode, CompileError> {
        self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let (body, _) = self.parse_stmts_until(&[Token::Endwhile])?;
        Ok(StmtNode::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<StmtNode, CompileError> {
        self.expect(&Token::For)?;
        let id = self.expect_ident()?;
        self.expect(&Token::In)?;
        let line = self.line();
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let (body, _) = self.parse_stmts_until(&[Token::Endfor])?;
                Ok(StmtNode::ForList { id, expr, body })
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                self.index_depth += 1;
                let from = self.parse_expr()?;
                self.expect(&Token::DotDot)?;
                let to = self.parse_expr()?;
                self.index_depth -= 1;
                self.expect(&Token::RBracket)?;
                let (body, _) = self.parse_stmts_until(&[Token::Endfor])?;
                Ok(StmtNode::ForRange { id, from, to, body })
            }
            _ => Err(CompileError::at(
                line,
                "expected (list) or [range] in for statement",
            )),
        }
    }

    fn parse_try(&mut self) -> Result<StmtNode, CompileError> {
        self.expect(&Token::Try)?;
        let (body, mut term) =
            self.parse_stmts_until(&[Token::Except, Token::Finally, Token::Endtry])?;
        let mut excepts = vec![];
        while term == Token::Except {
            let id = match (self.peek(), self.peek2()) {
                // `except e (codes)` / `except e ANY`; an identifier spelled "any" is only a
                // variable when codes follow it.
                (Some(Token::Ident(name)), after) => {
                    let is_any = name.eq_ignore_ascii_case("any");
                    let followed_by_codes =
                        matches!(after, Some(Token::LParen) | Some(Token::Ident(_)));
                    if !is_any || followed_by_codes {
                        let sym = Symbol::mk(name);
                        self.pos += 1;
                        Some(sym)
                    } else {
                        None
                    }
                }
                _ => None,
            };
            let codes = self.parse_catch_codes()?;
            let (statements, t) =
                self.parse_stmts_until(&[Token::Except, Token::Finally, Token::Endtry])?;
            excepts.push(ExceptArm {
                id,
                codes,
                statements,
            });
            term = t;
        }
        let finally = if term == Token::Finally {
            let (handler, _) = self.parse_stmts_until(&[Token::Endtry])?;
            handler
        } else {
            vec![]
        };
        Ok(StmtNode::TryExcept {
            body,
            excepts,
            finally,
        })
    }

    fn parse_fork(&mut self) -> Result<StmtNode, CompileError> {
        self.expect(&Token::Fork)?;
        self.expect(&Token::LParen)?;
        let delay = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let (body, _) = self.parse_stmts_until(&[Token::Endfork])?;
        Ok(StmtNode::Fork { delay, body })
    }

    /// Entry point for expressions: assignment, right-associative and loosest.
    pub fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        let left = self.parse_catch_level()?;
        if !self.eat(&Token::Assign) {
            return Ok(left);
        }
        let right = self.parse_expr()?;
        match left {
            Expr::List(args) => Ok(Expr::Scatter(
                Self::list_to_scatter(args, line)?,
                Box::new(right),
            )),
            Expr::Id(_) | Expr::Prop { .. } | Expr::Index(_, _) | Expr::Range { .. } => {
                Ok(Expr::Assign {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => Err(CompileError::at(line, "invalid assignment target")),
        }
    }

    fn list_to_scatter(args: Vec<Arg>, line: usize) -> Result<Vec<ScatterItem>, CompileError> {
        let mut items = vec![];
        for arg in args {
            let item = match arg {
                Arg::Normal(Expr::Id(id)) => ScatterItem {
                    kind: ScatterKind::Required,
                    id,
                    expr: None,
                },
                Arg::Splice(Expr::Id(id)) => ScatterItem {
                    kind: ScatterKind::Rest,
                    id,
                    expr: None,
                },
                _ => {
                    return Err(CompileError::at(
                        line,
                        "list destructuring pattern may contain only variables",
                    ));
                }
            };
            items.push(item);
        }
        Ok(items)
    }

    /// The naked catch suffix `expr ! codes [=> default]`, binding tighter than `=` and
    /// looser than the conditional.
    fn parse_catch_level(&mut self) -> Result<Expr, CompileError> {
        let e = self.parse_cond_level()?;
        if !self.eat(&Token::Bang) {
            return Ok(e);
        }
        let codes = self.parse_catch_codes()?;
        let except = if self.eat(&Token::Arrow) {
            Some(Box::new(self.parse_cond_level()?))
        } else {
            None
        };
        Ok(Expr::Catch {
            trye: Box::new(e),
            codes,
            except,
        })
    }

    /// `ANY`, a parenthesized code list, or a single code expression.
    fn parse_catch_codes(&mut self) -> Result<CatchCodes, CompileError> {
        match self.peek() {
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("any") => {
                self.pos += 1;
                Ok(CatchCodes::Any)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                if let Some(Token::Ident(s)) = self.peek() {
                    if s.eq_ignore_ascii_case("any") && self.peek2() == Some(&Token::RParen) {
                        self.pos += 2;
                        return Ok(CatchCodes::Any);
                    }
                }
                let args = self.parse_args_until(&Token::RParen)?;
                Ok(CatchCodes::Codes(args))
            }
            _ => {
                let e = self.parse_cond_level()?;
                Ok(CatchCodes::Codes(vec![Arg::Normal(e)]))
            }
        }
    }

    /// The conditional `c ? t | e`, right-associative.
    fn parse_cond_level(&mut self) -> Result<Expr, CompileError> {
        let condition = self.parse_binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let consequence = self.parse_cond_level()?;
        self.expect(&Token::Pipe)?;
        let alternative = self.parse_cond_level()?;
        Ok(Expr::Cond {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative: Box::new(alternative),
        })
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Expr, CompileError> {
        let mut lhs = if min_bp <= 1 {
            // `||` and `&&` short-circuit, so they are distinct nodes, not BinaryOps.
            let mut lhs = self.parse_binary(2)?;
            while self.eat(&Token::OrOr) {
                let rhs = self.parse_binary(2)?;
                lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
            }
            lhs
        } else if min_bp == 2 {
            let mut lhs = self.parse_binary(3)?;
            while self.eat(&Token::AndAnd) {
                let rhs = self.parse_binary(3)?;
                lhs = Expr::And(Box::new(lhs), Box::new(rhs));
            }
            lhs
        } else {
            self.parse_unary()?
        };
        if min_bp < 3 {
            return Ok(lhs);
        }
        loop {
            let Some((op, bp, right_assoc)) = self.peek().and_then(binary_op) else {
                return Ok(lhs);
            };
            if bp < min_bp {
                return Ok(lhs);
            }
            self.pos += 1;
            let next_bp = if right_assoc { bp } else { bp + 1 };
            let rhs = self.parse_binary(next_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                // Fold negative literals so `-1` is a value, not an operation.
                match operand {
                    Expr::Value(v) => match v.as_integer() {
                        Some(i) => Ok(Expr::Value(v_int(-i))),
                        None => match v.as_float() {
                            Some(f) => Ok(Expr::Value(v_float(-f))),
                            None => Ok(Expr::Unary(UnaryOp::Neg, Box::new(Expr::Value(v)))),
                        },
                    },
                    e => Ok(Expr::Unary(UnaryOp::Neg, Box::new(e))),
                }
            }
            Some(Token::Bang) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let property = match self.peek() {
                        Some(Token::LParen) => {
                            self.pos += 1;
                            let inner = self.parse_expr()?;
                            self.expect(&Token::RParen)?;
                            inner
                        }
                        _ => {
                            let name = self.expect_ident()?;
                            Expr::Value(v_str(name.as_str()))
                        }
                    };
                    e = Expr::Prop {
                        location: Box::new(e),
                        property: Box::new(property),
                    };
                }
                Some(Token::Colon) => {
                    self.pos += 1;
                    let verb = match self.peek() {
                        Some(Token::LParen) => {
                            self.pos += 1;
                            let inner = self.parse_expr()?;
                            self.expect(&Token::RParen)?;
                            inner
                        }
                        _ => {
                            let name = self.expect_ident()?;
                            Expr::Value(v_str(name.as_str()))
                        }
                    };
                    self.expect(&Token::LParen)?;
                    let args = self.parse_args_until(&Token::RParen)?;
                    e = Expr::Verb {
                        location: Box::new(e),
                        verb: Box::new(verb),
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.index_depth += 1;
                    let from = self.parse_expr()?;
                    if self.eat(&Token::DotDot) {
                        let to = self.parse_expr()?;
                        self.index_depth -= 1;
                        self.expect(&Token::RBracket)?;
                        e = Expr::Range {
                            base: Box::new(e),
                            from: Box::new(from),
                            to: Box::new(to),
                        };
                    } else {
                        self.index_depth -= 1;
                        self.expect(&Token::RBracket)?;
                        e = Expr::Index(Box::new(e), Box::new(from));
                    }
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.advance()? {
            Token::Int(i) => Ok(Expr::Value(v_int(i))),
            Token::Float(f) => Ok(Expr::Value(v_float(f))),
            Token::Str(s) => Ok(Expr::Value(v_str(&s))),
            Token::ObjLit(o) => Ok(Expr::Value(v_objid(o))),
            Token::Ident(name) => {
                // Error-code literals are spelled like identifiers.
                if name.len() > 2 && name[..2].eq_ignore_ascii_case("e_") {
                    if let Some(code) = ErrorCode::parse_str(&name) {
                        return Ok(Expr::Value(v_err(code)));
                    }
                }
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args_until(&Token::RParen)?;
                    if name.eq_ignore_ascii_case("pass") {
                        return Ok(Expr::Pass { args });
                    }
                    return Ok(Expr::Call {
                        function: Symbol::mk(&name),
                        args,
                    });
                }
                Ok(Expr::Id(Symbol::mk(&name)))
            }
            Token::SysIdent(name) => {
                // `$name` is `#0.name`; `$name(...)` is `#0:name(...)`.
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args_until(&Token::RParen)?;
                    return Ok(Expr::Verb {
                        location: Box::new(Expr::Value(v_objid(SYSTEM_OBJECT.id()))),
                        verb: Box::new(Expr::Value(v_str(&name))),
                        args,
                    });
                }
                Ok(Expr::Prop {
                    location: Box::new(Expr::Value(v_objid(SYSTEM_OBJECT.id()))),
                    property: Box::new(Expr::Value(v_str(&name))),
                })
            }
            Token::Dollar => {
                if self.index_depth == 0 {
                    return Err(CompileError::at(line, "$ is only valid inside an index"));
                }
                Ok(Expr::Length)
            }
            Token::LParen => {
                let e = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Token::LBrace => self.parse_brace(line),
            Token::Backtick => {
                let trye = self.parse_expr()?;
                self.expect(&Token::Bang)?;
                let codes = self.parse_catch_codes()?;
                let except = if self.eat(&Token::Arrow) {
                    Some(Box::new(self.parse_expr()?))
                } else {
                    None
                };
                self.expect(&Token::Quote)?;
                Ok(Expr::Catch {
                    trye: Box::new(trye),
                    codes,
                    except,
                })
            }
            t => Err(CompileError::at(
                line,
                format!("unexpected {} in expression", t.describe()),
            )),
        }
    }

    /// `{...}` is a list literal, unless it holds `?name` items or is followed by `=`, in
    /// which case it is a destructuring pattern.
    fn parse_brace(&mut self, line: usize) -> Result<Expr, CompileError> {
        let mut items = vec![];
        let mut has_optional = false;
        if !self.eat(&Token::RBrace) {
            loop {
                match self.peek() {
                    Some(Token::Question) => {
                        self.pos += 1;
                        has_optional = true;
                        let id = self.expect_ident()?;
                        let expr = if self.eat(&Token::Assign) {
                            Some(self.parse_expr()?)
                        } else {
                            None
                        };
                        items.push(BraceItem::Optional(id, expr));
                    }
                    Some(Token::At) => {
                        self.pos += 1;
                        let e = self.parse_expr()?;
                        items.push(BraceItem::Plain(Arg::Splice(e)));
                    }
                    _ => {
                        let e = self.parse_expr()?;
                        items.push(BraceItem::Plain(Arg::Normal(e)));
                    }
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBrace)?;
        }
        if has_optional {
            // Must be a scatter pattern; the assignment is mandatory.
            self.expect(&Token::Assign)?;
            let right = self.parse_expr()?;
            let mut scatter = vec![];
            for item in items {
                match item {
                    BraceItem::Optional(id, expr) => scatter.push(ScatterItem {
                        kind: ScatterKind::Optional,
                        id,
                        expr,
                    }),
                    BraceItem::Plain(arg) => {
                        scatter.extend(Self::list_to_scatter(vec![arg], line)?)
                    }
                }
            }
            return Ok(Expr::Scatter(scatter, Box::new(right)));
        }
        let args = items
            .into_iter()
            .map(|i| match i {
                BraceItem::Plain(a) => a,
                BraceItem::Optional(_, _) => unreachable!(),
            })
            .collect();
        Ok(Expr::List(args))
    }

    fn parse_args_until(&mut self, terminator: &Token) -> Result<Vec<Arg>, CompileError> {
        let mut args = vec![];
        if self.eat(terminator) {
            return Ok(args);
        }
        loop {
            if self.eat(&Token::At) {
                args.push(Arg::Splice(self.parse_expr()?));
            } else {
                args.push(Arg::Normal(self.parse_expr()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(terminator)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::lex;
    use loam_var::v_obj;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Stmt> {
        Parser::new(lex(source).unwrap()).parse_program().unwrap()
    }

    fn parse_expr_src(source: &str) -> Expr {
        let stmts = parse(&format!("{source};"));
        match &stmts[0].node {
            StmtNode::Expr(e) => e.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let e = parse_expr_src("1 + 2 * 3");
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Value(v_int(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Value(v_int(2))),
                    Box::new(Expr::Value(v_int(3))),
                )),
            )
        );
    }

    #[test]
    fn test_exp_right_assoc() {
        let e = parse_expr_src("2 ^ 3 ^ 2");
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Exp,
                Box::new(Expr::Value(v_int(2))),
                Box::new(Expr::Binary(
                    BinaryOp::Exp,
                    Box::new(Expr::Value(v_int(3))),
                    Box::new(Expr::Value(v_int(2))),
                )),
            )
        );
    }

    #[test]
    fn test_negative_literal_folding() {
        assert_eq!(parse_expr_src("-5"), Expr::Value(v_int(-5)));
        assert_eq!(
            parse_expr_src("1 - 2"),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Value(v_int(1))),
                Box::new(Expr::Value(v_int(2))),
            )
        );
    }

    #[test]
    fn test_error_literals() {
        assert_eq!(parse_expr_src("E_PERM"), Expr::Value(v_err(ErrorCode::E_PERM)));
        // A random E_-ish name is just an identifier.
        assert_eq!(parse_expr_src("e_custom"), Expr::Id(Symbol::mk("e_custom")));
    }

    #[test]
    fn test_sysprop_sugar() {
        let e = parse_expr_src("$foo");
        assert_eq!(
            e,
            Expr::Prop {
                location: Box::new(Expr::Value(v_obj(SYSTEM_OBJECT))),
                property: Box::new(Expr::Value(v_str("foo"))),
            }
        );
        let e = parse_expr_src("$bar(1)");
        assert_eq!(
            e,
            Expr::Verb {
                location: Box::new(Expr::Value(v_obj(SYSTEM_OBJECT))),
                verb: Box::new(Expr::Value(v_str("bar"))),
                args: vec![Arg::Normal(Expr::Value(v_int(1)))],
            }
        );
    }

    #[test]
    fn test_dollar_inside_index_only() {
        let e = parse_expr_src("s[$]");
        assert_eq!(
            e,
            Expr::Index(Box::new(Expr::Id(Symbol::mk("s"))), Box::new(Expr::Length))
        );
        let r = Parser::new(lex("x = $;").unwrap()).parse_program();
        assert!(r.is_err());
    }

    #[test]
    fn test_range_and_index() {
        let e = parse_expr_src("s[2..$]");
        assert_eq!(
            e,
            Expr::Range {
                base: Box::new(Expr::Id(Symbol::mk("s"))),
                from: Box::new(Expr::Value(v_int(2))),
                to: Box::new(Expr::Length),
            }
        );
    }

    #[test]
    fn test_dynamic_prop_and_verb() {
        let e = parse_expr_src("x.(\"na\" + \"me\")");
        match e {
            Expr::Prop { property, .. } => match *property {
                Expr::Binary(BinaryOp::Add, _, _) => {}
                other => panic!("expected dynamic property expr, got {other:?}"),
            },
            other => panic!("expected prop, got {other:?}"),
        }
        let e = parse_expr_src("x:(v)(1, 2)");
        match e {
            Expr::Verb { verb, args, .. } => {
                assert_eq!(*verb, Expr::Id(Symbol::mk("v")));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected verb, got {other:?}"),
        }
    }

    #[test]
    fn test_scatter_assignment() {
        let e = parse_expr_src("{a, ?b = 2, @c} = args");
        match e {
            Expr::Scatter(items, _) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].kind, ScatterKind::Required);
                assert_eq!(items[1].kind, ScatterKind::Optional);
                assert!(items[1].expr.is_some());
                assert_eq!(items[2].kind, ScatterKind::Rest);
            }
            other => panic!("expected scatter, got {other:?}"),
        }
        // Without optionals it still converts on `=`.
        let e = parse_expr_src("{a, b} = args");
        assert!(matches!(e, Expr::Scatter(items, _) if items.len() == 2));
    }

    #[test]
    fn test_catch_expr_backtick() {
        let e = parse_expr_src("`1/0 ! E_DIV => 42'");
        match e {
            Expr::Catch {
                codes: CatchCodes::Codes(codes),
                except: Some(except),
                ..
            } => {
                assert_eq!(codes.len(), 1);
                assert_eq!(*except, Expr::Value(v_int(42)));
            }
            other => panic!("expected catch, got {other:?}"),
        }
    }

    #[test]
    fn test_catch_suffix() {
        let e = parse_expr_src("x = 1/0 ! (E_DIV, E_PERM)");
        match e {
            Expr::Assign { right, .. } => match *right {
                Expr::Catch {
                    codes: CatchCodes::Codes(codes),
                    except: None,
                    ..
                } => assert_eq!(codes.len(), 2),
                other => panic!("expected catch, got {other:?}"),
            },
            other => panic!("expected assign, got {other:?}"),
        }
        let e = parse_expr_src("this.x ! ANY");
        assert!(matches!(
            e,
            Expr::Catch {
                codes: CatchCodes::Any,
                ..
            }
        ));
    }

    #[test]
    fn test_conditional_expr() {
        let e = parse_expr_src("x ? 1 | 2");
        assert!(matches!(e, Expr::Cond { .. }));
    }

    #[test]
    fn test_if_elseif_else() {
        let stmts = parse("if (1) return 1; elseif (2) return 2; else return 3; endif");
        match &stmts[0].node {
            StmtNode::Cond { arms, otherwise } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("expected cond, got {other:?}"),
        }
    }

    #[test]
    fn test_for_list_and_range() {
        let stmts = parse("for x in ({1, 2}) endfor for y in [1..5] endfor");
        assert!(matches!(stmts[0].node, StmtNode::ForList { .. }));
        assert!(matches!(stmts[1].node, StmtNode::ForRange { .. }));
    }

    #[test]
    fn test_try_except_finally() {
        let stmts = parse(
            "try x = 1/0; except e (E_DIV) x = 42; except (ANY) x = 0; finally y = 1; endtry",
        );
        match &stmts[0].node {
            StmtNode::TryExcept {
                excepts, finally, ..
            } => {
                assert_eq!(excepts.len(), 2);
                assert_eq!(excepts[0].id, Some(Symbol::mk("e")));
                assert!(matches!(excepts[0].codes, CatchCodes::Codes(_)));
                assert_eq!(excepts[1].id, None);
                assert!(matches!(excepts[1].codes, CatchCodes::Any));
                assert_eq!(finally.len(), 1);
            }
            other => panic!("expected try, got {other:?}"),
        }
    }

    #[test]
    fn test_fork() {
        let stmts = parse("fork (5) notify(player, \"later\"); endfork");
        assert!(matches!(stmts[0].node, StmtNode::Fork { .. }));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let stmts = parse("# a comment line\n\nreturn 1; # trailing\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line, 3);
    }

    #[test]
    fn test_unbalanced_block_errors() {
        let r = Parser::new(lex("while (1) if (2) endwhile endif").unwrap()).parse_program();
        assert!(r.is_err());
        let r = Parser::new(lex("if (1) return;").unwrap()).parse_program();
        assert_eq!(r.unwrap_err(), CompileError::UnexpectedEof);
    }

    #[test]
    fn test_pass_call() {
        let e = parse_expr_src("pass(@args)");
        assert!(matches!(e, Expr::Pass { .. }));
    }

    #[test]
    fn test_splice_in_list_literal() {
        let e = parse_expr_src("{1, @rest}");
        match e {
            Expr::List(args) => {
                assert!(matches!(args[1], Arg::Splice(_)));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }
}
