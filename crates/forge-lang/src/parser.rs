//! Recursive-descent parser with precedence climbing for binary operators.
//!
//! Each `parse_*` method corresponds to one grammar production. Errors
//! short-circuit out via `?` rather than a longjmp-style unwind — see
//! `diagnostics.rs` for the mode switch this replaces.

use forge_base::{Interner, Span};

use crate::ast::{Ast, BasicType, BinOp, NodeId, NodeKind, UnOp};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind, TypeName};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    ast: Ast,
    interner: &'a mut Interner,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a [u8], interner: &'a mut Interner) -> Self {
        Parser { lexer: Lexer::new(src), ast: Ast::new(), interner }
    }

    pub fn parse_program(mut self) -> Result<(Ast, NodeId), ParseError> {
        let start = 0;
        let mut globals = Vec::new();
        while !self.check_eof()? {
            globals.push(self.parse_global_stmt()?);
        }
        let end = self.lexer.peek()?.span.end;
        let root = self.ast.push(NodeKind::Program { globals }, Span::new(start, end), None);
        Ok((self.ast, root))
    }

    // -- helpers --------------------------------------------------------

    fn check_eof(&mut self) -> Result<bool, ParseError> {
        Ok(self.lexer.peek()?.is_eof())
    }

    fn peek(&mut self) -> Result<Token, ParseError> {
        Ok(self.lexer.peek()?)
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        Ok(self.lexer.advance()?)
    }

    fn expect(&mut self, want: &TokenKind) -> Result<Token, ParseError> {
        let tok = self.bump()?;
        if std::mem::discriminant(&tok.kind) == std::mem::discriminant(want) {
            Ok(tok)
        } else {
            Err(ParseError::Unexpected {
                expected: format!("{want:?}"),
                found: format!("{:?}", tok.kind),
                span: tok.span,
            })
        }
    }

    fn basic_type(&self, tok: &Token) -> Result<BasicType, ParseError> {
        match &tok.kind {
            TokenKind::Typename(TypeName::Int) => Ok(BasicType::Int),
            TokenKind::Typename(TypeName::Real) => Ok(BasicType::Real),
            TokenKind::Typename(TypeName::Void) => Ok(BasicType::Void),
            TokenKind::Typename(TypeName::Bool) => Ok(BasicType::Bool),
            TokenKind::Typename(TypeName::Char) => Ok(BasicType::Char),
            TokenKind::Typename(TypeName::String) => Ok(BasicType::String),
            other => Err(ParseError::Unexpected {
                expected: "a typename".into(),
                found: format!("{other:?}"),
                span: tok.span,
            }),
        }
    }

    fn ident_symbol(&mut self, tok: &Token) -> Result<forge_base::Symbol, ParseError> {
        match &tok.kind {
            TokenKind::Ident(s) => Ok(self.interner.intern(s)),
            other => Err(ParseError::Unexpected {
                expected: "an identifier".into(),
                found: format!("{other:?}"),
                span: tok.span,
            }),
        }
    }

    // -- declarations -----------------------------------------------------

    fn parse_global_stmt(&mut self) -> Result<NodeId, ParseError> {
        match self.peek()?.kind {
            TokenKind::Typename(_) => self.parse_var_decl(),
            TokenKind::Struct => self.parse_struct_decl(),
            _ => self.parse_func_decl(),
        }
    }

    /// `struct { field-decl* } name ;`. A field-decl is either a plain
    /// `typename name ;` (no initializer — structs don't support default
    /// field values) or a nested `struct { ... } name ;`.
    fn parse_struct_decl(&mut self) -> Result<NodeId, ParseError> {
        let kw = self.bump()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !matches!(self.peek()?.kind, TokenKind::RBrace) {
            fields.push(self.parse_field_decl()?);
        }
        self.expect(&TokenKind::RBrace)?;
        let name_tok = self.bump()?;
        let name = self.ident_symbol(&name_tok)?;
        let end = self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push(NodeKind::StructDecl { name, fields }, Span::new(kw.span.start, end.span.end), None))
    }

    fn parse_field_decl(&mut self) -> Result<NodeId, ParseError> {
        if matches!(self.peek()?.kind, TokenKind::Struct) {
            return self.parse_struct_decl();
        }
        let ty_tok = self.bump()?;
        let start = ty_tok.span.start;
        let ty = self.basic_type(&ty_tok)?;
        let name_tok = self.bump()?;
        let name = self.ident_symbol(&name_tok)?;
        let end = self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push(NodeKind::FieldDecl { ty, name }, Span::new(start, end.span.end), None))
    }

    fn parse_var_decl(&mut self) -> Result<NodeId, ParseError> {
        let ty_tok = self.bump()?;
        let start = ty_tok.span.start;
        let ty = self.basic_type(&ty_tok)?;
        let name_tok = self.bump()?;
        let name = self.ident_symbol(&name_tok)?;
        let init = if matches!(self.peek()?.kind, TokenKind::ColonEq) {
            self.bump()?;
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end_tok = self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push(NodeKind::VarDecl { ty, name, init }, Span::new(start, end_tok.span.end), None))
    }

    fn parse_func_decl(&mut self) -> Result<NodeId, ParseError> {
        let name_tok = self.bump()?;
        let start = name_tok.span.start;
        let name = self.ident_symbol(&name_tok)?;
        self.expect(&TokenKind::ColonEq)?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.peek()?.kind, TokenKind::RParen) {
            loop {
                let pty_tok = self.bump()?;
                let pty = self.basic_type(&pty_tok)?;
                let pname_tok = self.bump()?;
                let pname = self.ident_symbol(&pname_tok)?;
                params.push((pname, pty));
                if matches!(self.peek()?.kind, TokenKind::Comma) {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Arrow)?;
        let ret_tok = self.bump()?;
        let ret = self.basic_type(&ret_tok)?;
        let body = self.parse_block()?;
        let end = self.ast.get(body).span.end;
        Ok(self.ast.push(NodeKind::FuncDecl { name, params, ret, body }, Span::new(start, end), None))
    }

    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let open = self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek()?.kind, TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        let close = self.expect(&TokenKind::RBrace)?;
        Ok(self.ast.push(NodeKind::Block { stmts }, Span::new(open.span.start, close.span.end), None))
    }

    // -- statements -------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<NodeId, ParseError> {
        match self.peek()?.kind {
            TokenKind::Return => self.parse_return(),
            TokenKind::Typename(_) => self.parse_var_decl(),
            TokenKind::Struct => self.parse_struct_decl(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break => {
                let tok = self.bump()?;
                let end = self.expect(&TokenKind::Semicolon)?;
                Ok(self.ast.push(NodeKind::Break, Span::new(tok.span.start, end.span.end), None))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_return(&mut self) -> Result<NodeId, ParseError> {
        let kw = self.bump()?;
        let value = if matches!(self.peek()?.kind, TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push(NodeKind::Return { value }, Span::new(kw.span.start, end.span.end), None))
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let kw = self.bump()?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = self.parse_block()?;
        let mut end = self.ast.get(then_branch).span.end;
        let else_branch = if matches!(self.peek()?.kind, TokenKind::Else) {
            self.bump()?;
            let e = self.parse_block()?;
            end = self.ast.get(e).span.end;
            Some(e)
        } else {
            None
        };
        Ok(self.ast.push(NodeKind::If { cond, then_branch, else_branch }, Span::new(kw.span.start, end), None))
    }

    fn parse_while(&mut self) -> Result<NodeId, ParseError> {
        let kw = self.bump()?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let end = self.ast.get(body).span.end;
        Ok(self.ast.push(NodeKind::While { cond, body }, Span::new(kw.span.start, end), None))
    }

    fn parse_expr_stmt(&mut self) -> Result<NodeId, ParseError> {
        let expr = self.parse_expr()?;
        let start = self.ast.get(expr).span.start;
        let end = self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push(NodeKind::ExprStmt { expr }, Span::new(start, end.span.end), None))
    }

    // -- expressions ------------------------------------------------------

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_assignment()
    }

    /// `:=` is right-associative and looser than comparison.
    fn parse_assignment(&mut self) -> Result<NodeId, ParseError> {
        let lhs = self.parse_binary(0)?;
        if matches!(self.peek()?.kind, TokenKind::ColonEq) {
            self.bump()?;
            let value = self.parse_assignment()?;
            let span = self.ast.get(lhs).span.merge(self.ast.get(value).span);
            return Ok(self.ast.push(NodeKind::Assign { target: lhs, value }, span, None));
        }
        Ok(lhs)
    }

    /// Precedence-climbing over the binary operator table, tightest-to-
    /// loosest: `==`/`!=` (0) < `<`/`>`/`<=`/`>=` (1) < `+`/`-` (2) <
    /// `*`/`/`/`%` (3). `min_level` starts at 0 (loosest).
    fn parse_binary(&mut self, min_level: u8) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, level)) = self.peek_binop_level()? else { break };
            if level < min_level {
                break;
            }
            self.bump()?;
            let rhs = self.parse_binary(level + 1)?;
            let span = self.ast.get(lhs).span.merge(self.ast.get(rhs).span);
            lhs = self.ast.push(NodeKind::Binary { op, lhs, rhs }, span, None);
        }
        Ok(lhs)
    }

    fn peek_binop_level(&mut self) -> Result<Option<(BinOp, u8)>, ParseError> {
        Ok(match self.peek()?.kind {
            TokenKind::EqEq => Some((BinOp::Eq, 0)),
            TokenKind::NotEq => Some((BinOp::NotEq, 0)),
            TokenKind::Lt => Some((BinOp::Lt, 1)),
            TokenKind::Gt => Some((BinOp::Gt, 1)),
            TokenKind::Le => Some((BinOp::Le, 1)),
            TokenKind::Ge => Some((BinOp::Ge, 1)),
            TokenKind::Plus => Some((BinOp::Add, 2)),
            TokenKind::Minus => Some((BinOp::Sub, 2)),
            TokenKind::Star => Some((BinOp::Mul, 3)),
            TokenKind::Slash => Some((BinOp::Div, 3)),
            TokenKind::Percent => Some((BinOp::Mod, 3)),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let op = match self.peek()?.kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.bump()?;
            let operand = self.parse_postfix()?;
            let end = self.ast.get(operand).span.end;
            return Ok(self.ast.push(NodeKind::Unary { op, operand }, Span::new(tok.span.start, end), None));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek()?.kind {
                TokenKind::LParen => {
                    // Only identifiers are callable; reuse their name as
                    // the callee symbol and discard the bare Ident node.
                    let callee = match self.ast.get(node).kind.clone() {
                        NodeKind::Ident { name } => name,
                        _ => {
                            let tok = self.peek()?;
                            return Err(ParseError::Unexpected {
                                expected: "a callable identifier".into(),
                                found: format!("{:?}", tok.kind),
                                span: tok.span,
                            });
                        }
                    };
                    self.bump()?;
                    let mut args = Vec::new();
                    if !matches!(self.peek()?.kind, TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        while matches!(self.peek()?.kind, TokenKind::Comma) {
                            self.bump()?;
                            args.push(self.parse_expr()?);
                        }
                    }
                    let close = self.expect(&TokenKind::RParen)?;
                    let start = self.ast.get(node).span.start;
                    node = self.ast.push(NodeKind::Call { callee, args }, Span::new(start, close.span.end), None);
                }
                TokenKind::Dot => {
                    self.bump()?;
                    let name_tok = self.bump()?;
                    let field = self.ident_symbol(&name_tok)?;
                    let span = self.ast.get(node).span.merge(name_tok.span);
                    node = self.ast.push(NodeKind::FieldAccess { base: node, field }, span, None);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let tok = self.bump()?;
        let span = tok.span;
        let kind = match tok.kind {
            TokenKind::IntLit(v) => NodeKind::IntLit(v),
            TokenKind::RealLit(v) => NodeKind::RealLit(v),
            TokenKind::CharLit(v) => NodeKind::CharLit(v),
            TokenKind::StringLit(s) => NodeKind::StringLit(self.interner.intern(&s)),
            TokenKind::True => NodeKind::BoolLit(true),
            TokenKind::False => NodeKind::BoolLit(false),
            TokenKind::Ident(s) => NodeKind::Ident { name: self.interner.intern(&s) },
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Cast => {
                self.expect(&TokenKind::LParen)?;
                let ty_tok = self.bump()?;
                let ty = self.basic_type(&ty_tok)?;
                self.expect(&TokenKind::Comma)?;
                let operand = self.parse_expr()?;
                let close = self.expect(&TokenKind::RParen)?;
                return Ok(self.ast.push(NodeKind::Cast { ty, operand }, Span::new(span.start, close.span.end), None));
            }
            other => {
                return Err(ParseError::Unexpected {
                    expected: "an expression".into(),
                    found: format!("{other:?}"),
                    span,
                })
            }
        };
        Ok(self.ast.push(kind, span, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str, interner: &mut Interner) -> (Ast, NodeId) {
        Parser::new(src.as_bytes(), interner).parse_program().unwrap()
    }

    #[test]
    fn parses_var_decl_with_initializer() {
        let mut interner = Interner::new();
        let (ast, root) = parse("int x := 1;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        assert_eq!(globals.len(), 1);
        assert!(matches!(ast.get(globals[0]).kind, NodeKind::VarDecl { .. }));
    }

    #[test]
    fn parses_func_decl_with_params_and_return() {
        let mut interner = Interner::new();
        let (ast, root) = parse("add := (int a, int b) -> int { return a + b; }", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        match &ast.get(globals[0]).kind {
            NodeKind::FuncDecl { params, ret, .. } => {
                assert_eq!(params.len(), 2);
                assert_eq!(*ret, BasicType::Int);
            }
            other => panic!("expected FuncDecl, got {other:?}"),
        }
    }

    #[test]
    fn precedence_climbing_binds_multiplication_tighter_than_addition() {
        let mut interner = Interner::new();
        let (ast, root) = parse("int x := 1 + 2 * 3;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let init = match &ast.get(globals[0]).kind {
            NodeKind::VarDecl { init, .. } => init.unwrap(),
            _ => panic!(),
        };
        match &ast.get(init).kind {
            NodeKind::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(ast.get(*rhs).kind, NodeKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected top-level Add, got {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative_and_looser_than_comparison() {
        let mut interner = Interner::new();
        let (ast, root) = parse("int x; { x := x := 1; }", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let block = globals[1];
        let stmts = match &ast.get(block).kind {
            NodeKind::Block { stmts } => stmts.clone(),
            _ => panic!(),
        };
        let expr = match &ast.get(stmts[0]).kind {
            NodeKind::ExprStmt { expr } => *expr,
            _ => panic!(),
        };
        match &ast.get(expr).kind {
            NodeKind::Assign { value, .. } => {
                assert!(matches!(ast.get(*value).kind, NodeKind::Assign { .. }));
            }
            other => panic!("expected outer Assign, got {other:?}"),
        }
    }

    #[test]
    fn if_else_parses_both_branches() {
        let mut interner = Interner::new();
        let (ast, root) = parse("foo := () -> void { if (1) { } else { } }", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let body = match &ast.get(globals[0]).kind {
            NodeKind::FuncDecl { body, .. } => *body,
            _ => panic!(),
        };
        let stmts = match &ast.get(body).kind {
            NodeKind::Block { stmts } => stmts.clone(),
            _ => panic!(),
        };
        assert!(matches!(ast.get(stmts[0]).kind, NodeKind::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn call_expression_collects_arguments() {
        let mut interner = Interner::new();
        let (ast, root) = parse("foo := () -> void { print(1, 2); }", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let body = match &ast.get(globals[0]).kind {
            NodeKind::FuncDecl { body, .. } => *body,
            _ => panic!(),
        };
        let stmts = match &ast.get(body).kind {
            NodeKind::Block { stmts } => stmts.clone(),
            _ => panic!(),
        };
        let expr = match &ast.get(stmts[0]).kind {
            NodeKind::ExprStmt { expr } => *expr,
            _ => panic!(),
        };
        match &ast.get(expr).kind {
            NodeKind::Call { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn cast_expression_parses() {
        let mut interner = Interner::new();
        let (ast, root) = parse("real y := cast(real, 1);", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let init = match &ast.get(globals[0]).kind {
            NodeKind::VarDecl { init, .. } => init.unwrap(),
            _ => panic!(),
        };
        assert!(matches!(ast.get(init).kind, NodeKind::Cast { ty: BasicType::Real, .. }));
    }

    #[test]
    fn unary_minus_binds_tighter_than_binary_operators() {
        let mut interner = Interner::new();
        let (ast, root) = parse("int x := -1 + 2;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let init = match &ast.get(globals[0]).kind {
            NodeKind::VarDecl { init, .. } => init.unwrap(),
            _ => panic!(),
        };
        match &ast.get(init).kind {
            NodeKind::Binary { op: BinOp::Add, lhs, .. } => {
                assert!(matches!(ast.get(*lhs).kind, NodeKind::Unary { op: UnOp::Neg, .. }));
            }
            other => panic!("expected top-level Add, got {other:?}"),
        }
    }

    #[test]
    fn struct_decl_collects_its_fields() {
        let mut interner = Interner::new();
        let (ast, root) = parse("struct { int x; int y; } point;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        match &ast.get(globals[0]).kind {
            NodeKind::StructDecl { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert!(fields.iter().all(|&f| matches!(ast.get(f).kind, NodeKind::FieldDecl { .. })));
            }
            other => panic!("expected StructDecl, got {other:?}"),
        }
    }

    #[test]
    fn nested_struct_field_parses_as_a_nested_struct_decl() {
        let mut interner = Interner::new();
        let (ast, root) = parse("struct { struct { int x; } inner; } outer;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let fields = match &ast.get(globals[0]).kind {
            NodeKind::StructDecl { fields, .. } => fields.clone(),
            other => panic!("expected StructDecl, got {other:?}"),
        };
        assert!(matches!(ast.get(fields[0]).kind, NodeKind::StructDecl { .. }));
    }

    #[test]
    fn dot_access_keeps_the_base_expression() {
        let mut interner = Interner::new();
        let (ast, root) = parse("struct { int x; } point; int z := point.x;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let init = match &ast.get(globals[1]).kind {
            NodeKind::VarDecl { init, .. } => init.unwrap(),
            _ => panic!(),
        };
        match &ast.get(init).kind {
            NodeKind::FieldAccess { base, .. } => {
                assert!(matches!(ast.get(*base).kind, NodeKind::Ident { .. }));
            }
            other => panic!("expected FieldAccess, got {other:?}"),
        }
    }

    #[test]
    fn chained_dot_access_nests_field_access_nodes() {
        let mut interner = Interner::new();
        let (ast, root) =
            parse("struct { struct { int x; } inner; } outer; int z := outer.inner.x;", &mut interner);
        let globals = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => panic!(),
        };
        let init = match &ast.get(globals[1]).kind {
            NodeKind::VarDecl { init, .. } => init.unwrap(),
            _ => panic!(),
        };
        match &ast.get(init).kind {
            NodeKind::FieldAccess { base, field: _ } => {
                assert!(matches!(ast.get(*base).kind, NodeKind::FieldAccess { .. }));
            }
            other => panic!("expected outer FieldAccess, got {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_is_parse_error() {
        let mut interner = Interner::new();
        let parser = Parser::new(b"int x := 1", &mut interner);
        assert!(parser.parse_program().is_err());
    }
}
