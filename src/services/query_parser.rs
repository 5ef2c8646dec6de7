//! Parser for generated query snippets.
//!
//! Model output is never executed as code. It must fit a closed grammar:
//! a sequence of statements, each either `name = expr` or a bare
//! expression, where `expr` is a method chain over the table binding:
//! bracket selection (`df["col"]`, `df[["a","b"]]`), comparison filters
//! (`df[df["col"] > 10]`) and a fixed set of query methods. Anything
//! outside the grammar fails to parse and therefore cannot run.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// One argument in a method call: positional literal, list of column
/// names, or a keyword argument (`ascending=False`, `by="col"`).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Pos(Literal),
    PosList(Vec<String>),
    Kw(String, Literal),
}

/// The contents of a bracket index.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Column(String),
    Columns(Vec<String>),
    Mask {
        column: String,
        op: CmpOp,
        value: Literal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to the table binding or a variable bound earlier in
    /// the snippet.
    Ref(String),
    Lit(Literal),
    Index { on: Box<Expr>, index: Index },
    Call {
        on: Box<Expr>,
        method: String,
        args: Vec<Arg>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Assignment target, when the statement is `name = expr`.
    pub target: Option<String>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Cmp(CmpOp),
    Assign,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "`{}`", s),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(v) => write!(f, "{}", v),
            Token::Cmp(op) => write!(f, "`{}`", op),
            Token::Assign => f.write_str("`=`"),
            Token::Dot => f.write_str("`.`"),
            Token::Comma => f.write_str("`,`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::LBracket => f.write_str("`[`"),
            Token::RBracket => f.write_str("`]`"),
            Token::Newline => f.write_str("end of statement"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    // line breaks inside parens or brackets continue the statement
    let mut depth: u32 = 0;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '\n' if depth > 0 => {
                chars.next();
            }
            '\n' | ';' => {
                chars.next();
                tokens.push(Token::Newline);
            }
            '#' => {
                // comment runs to end of line
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                depth += 1;
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                depth = depth.saturating_sub(1);
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                depth += 1;
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                depth = depth.saturating_sub(1);
                tokens.push(Token::RBracket);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Eq));
                } else {
                    tokens.push(Token::Assign);
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Neq));
                } else {
                    return Err("unexpected `!`".to_string());
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Ge));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Le));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => s.push(c),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut num = String::new();
                num.push(c);
                chars.next();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        is_float = true;
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let v: f64 = num
                        .parse()
                        .map_err(|_| format!("invalid number `{}`", num))?;
                    tokens.push(Token::Float(v));
                } else {
                    let v: i64 = num
                        .parse()
                        .map_err(|_| format!("invalid number `{}`", num))?;
                    tokens.push(Token::Int(v));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character `{}`", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.next() {
            Some(ref tok) if tok == expected => Ok(()),
            Some(tok) => Err(format!("expected {}, found {}", expected, tok)),
            None => Err(format!("expected {}, found end of snippet", expected)),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.pos += 1;
        }
    }

    fn parse_statements(&mut self) -> Result<Vec<Stmt>, String> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            stmts.push(self.parse_statement()?);
            match self.peek() {
                None | Some(Token::Newline) => {}
                Some(tok) => return Err(format!("unexpected {} after statement", tok)),
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, String> {
        let target = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(name)), Some(Token::Assign)) => {
                let name = name.clone();
                self.pos += 2;
                Some(name)
            }
            _ => None,
        };
        let expr = self.parse_expr()?;
        Ok(Stmt { target, expr })
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let method = match self.next() {
                        Some(Token::Ident(name)) => name,
                        Some(tok) => {
                            return Err(format!("expected a method name after `.`, found {}", tok))
                        }
                        None => return Err("expected a method name after `.`".to_string()),
                    };
                    self.expect(&Token::LParen)?;
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        on: Box::new(expr),
                        method,
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_index()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        on: Box::new(expr),
                        index,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Expr::Lit(Literal::Bool(true))),
                "False" | "false" => Ok(Expr::Lit(Literal::Bool(false))),
                _ => Ok(Expr::Ref(name)),
            },
            Some(Token::Str(s)) => Ok(Expr::Lit(Literal::Str(s))),
            Some(Token::Int(i)) => Ok(Expr::Lit(Literal::Int(i))),
            Some(Token::Float(v)) => Ok(Expr::Lit(Literal::Float(v))),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(tok) => Err(format!("unexpected {} at start of expression", tok)),
            None => Err("unexpected end of snippet".to_string()),
        }
    }

    /// Contents of `[...]`: a column name, a list of column names, or a
    /// comparison filter like `df["col"] > 10`.
    fn parse_index(&mut self) -> Result<Index, String> {
        match self.peek() {
            Some(Token::Str(_)) => {
                if let Some(Token::Str(s)) = self.next() {
                    Ok(Index::Column(s))
                } else {
                    unreachable!()
                }
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let columns = self.parse_string_list_body()?;
                Ok(Index::Columns(columns))
            }
            _ => {
                let inner = self.parse_expr()?;
                let op = match self.next() {
                    Some(Token::Cmp(op)) => op,
                    Some(tok) => {
                        return Err(format!(
                            "expected a comparison inside `[...]`, found {}",
                            tok
                        ))
                    }
                    None => return Err("expected a comparison inside `[...]`".to_string()),
                };
                let value = self.parse_literal()?;
                match inner {
                    Expr::Index {
                        index: Index::Column(column),
                        ..
                    } => Ok(Index::Mask { column, op, value }),
                    _ => Err(
                        "filters must compare a single column, e.g. df[df[\"col\"] > 10]"
                            .to_string(),
                    ),
                }
            }
        }
    }

    /// String elements up to and including the closing `]`.
    fn parse_string_list_body(&mut self) -> Result<Vec<String>, String> {
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token::Str(s)) => items.push(s),
                Some(Token::RBracket) if items.is_empty() => return Ok(items),
                Some(tok) => return Err(format!("expected a column name string, found {}", tok)),
                None => return Err("unterminated column list".to_string()),
            }
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RBracket) => return Ok(items),
                Some(tok) => return Err(format!("expected `,` or `]`, found {}", tok)),
                None => return Err("unterminated column list".to_string()),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            let arg = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Assign)) => {
                    let name = name.clone();
                    self.pos += 2;
                    Arg::Kw(name, self.parse_literal()?)
                }
                (Some(Token::LBracket), _) => {
                    self.pos += 1;
                    Arg::PosList(self.parse_string_list_body()?)
                }
                _ => Arg::Pos(self.parse_literal()?),
            };
            args.push(arg);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => break,
                Some(tok) => return Err(format!("expected `,` or `)`, found {}", tok)),
                None => return Err("unterminated argument list".to_string()),
            }
        }
        Ok(args)
    }

    fn parse_literal(&mut self) -> Result<Literal, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Int(i)) => Ok(Literal::Int(i)),
            Some(Token::Float(v)) => Ok(Literal::Float(v)),
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Literal::Bool(true)),
                "False" | "false" => Ok(Literal::Bool(false)),
                _ => Err(format!("expected a literal value, found `{}`", name)),
            },
            Some(tok) => Err(format!("expected a literal value, found {}", tok)),
            None => Err("expected a literal value".to_string()),
        }
    }
}

/// Parse a snippet into statements, or explain why it does not fit the
/// grammar.
pub fn parse(snippet: &str) -> Result<Vec<Stmt>, String> {
    let tokens = tokenize(snippet)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmts = parser.parse_statements()?;
    if stmts.is_empty() {
        return Err("snippet contains no statements".to_string());
    }
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groupby_aggregation_chain() {
        let stmts = parse(
            "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(ascending=False).head(5)",
        )
        .unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].target.as_deref(), Some("answer"));
        // outermost call is head(5)
        match &stmts[0].expr {
            Expr::Call { method, args, .. } => {
                assert_eq!(method, "head");
                assert_eq!(args, &[Arg::Pos(Literal::Int(5))]);
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn parses_keyword_arguments() {
        let stmts = parse("answer = df.sort_values(by=\"price\", ascending=False)").unwrap();
        match &stmts[0].expr {
            Expr::Call { args, .. } => {
                assert_eq!(
                    args,
                    &[
                        Arg::Kw("by".into(), Literal::Str("price".into())),
                        Arg::Kw("ascending".into(), Literal::Bool(false)),
                    ]
                );
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn parses_comparison_filter() {
        let stmts = parse("answer = df[df[\"price\"] > 10]").unwrap();
        match &stmts[0].expr {
            Expr::Index { index, .. } => {
                assert_eq!(
                    index,
                    &Index::Mask {
                        column: "price".into(),
                        op: CmpOp::Gt,
                        value: Literal::Int(10),
                    }
                );
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn parses_column_list_selection() {
        let stmts = parse("answer = df[[\"region\", \"revenue\"]]").unwrap();
        match &stmts[0].expr {
            Expr::Index { index, .. } => {
                assert_eq!(
                    index,
                    &Index::Columns(vec!["region".into(), "revenue".into()])
                );
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn parses_multiple_statements_and_variables() {
        let stmts = parse("top = df.head(10)\nanswer = top[\"price\"].mean()").unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].target.as_deref(), Some("top"));
        assert_eq!(stmts[1].target.as_deref(), Some("answer"));
    }

    #[test]
    fn parses_bare_scalar_assignment() {
        let stmts = parse("result = 42").unwrap();
        assert_eq!(stmts[0].target.as_deref(), Some("result"));
        assert_eq!(stmts[0].expr, Expr::Lit(Literal::Int(42)));
    }

    #[test]
    fn line_breaks_inside_calls_continue_the_statement() {
        let stmts = parse(
            "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(\n    ascending=False\n).head(5)",
        )
        .unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].target.as_deref(), Some("answer"));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let stmts = parse("# top products\n\nanswer = df.head(3)\n").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn rejects_attribute_access_without_call() {
        let err = parse("answer = df.genexpr").unwrap_err();
        assert!(err.contains("expected `(`"), "got: {}", err);
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = parse("answer = df @ df").unwrap_err();
        assert!(err.contains("unexpected character"), "got: {}", err);
    }

    #[test]
    fn rejects_non_column_filter() {
        let err = parse("answer = df[df > 10]").unwrap_err();
        assert!(err.contains("single column"), "got: {}", err);
    }
}
