//! License expression parsing and rendering.

/// A parsed license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpr {
    License(String),
    With(Box<LicenseExpr>, String),
    And(Vec<LicenseExpr>),
    Or(Vec<LicenseExpr>),
}

impl LicenseExpr {
    /// Combine expressions with AND, flattening nested ANDs and dropping duplicates.
    pub fn and_all(items: Vec<LicenseExpr>) -> Option<LicenseExpr> {
        let mut flat: Vec<LicenseExpr> = Vec::new();
        for item in items {
            let parts = match item {
                LicenseExpr::And(parts) => parts,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(LicenseExpr::And(flat)),
        }
    }

    fn combine_or(items: Vec<LicenseExpr>) -> LicenseExpr {
        let mut flat: Vec<LicenseExpr> = Vec::new();
        for item in items {
            let parts = match item {
                LicenseExpr::Or(parts) => parts,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            LicenseExpr::Or(flat)
        }
    }

    pub fn render(&self) -> String {
        match self {
            LicenseExpr::License(id) => id.clone(),
            LicenseExpr::With(base, exception) => format!("{} WITH {}", base.render(), exception),
            LicenseExpr::And(parts) => parts
                .iter()
                .map(|p| match p {
                    LicenseExpr::Or(_) => format!("({})", p.render()),
                    _ => p.render(),
                })
                .collect::<Vec<_>>()
                .join(" AND "),
            LicenseExpr::Or(parts) => parts
                .iter()
                .map(LicenseExpr::render)
                .collect::<Vec<_>>()
                .join(" OR "),
        }
    }
}

impl std::fmt::Display for LicenseExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Word(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

/// Tokenize a license expression. Operators are matched case-insensitively as whole words.
fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            tokens.push(Token::LParen);
            chars.next();
        } else if c == ')' {
            tokens.push(Token::RParen);
            chars.next();
        } else {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            let token = match s.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ => Token::Word(s),
            };
            tokens.push(token);
        }
    }
    tokens
}

/// Recursive descent parser. Leaves are runs of words between operators, so
/// free-text names like `Apache License 2.0 or MIT` split into two leaves.
///
/// ```text
/// expr     := or_expr
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" expr ")" | leaf ( "WITH" leaf )?
/// ```
struct ExprParser<'a, F> {
    tokens: Vec<Token>,
    pos: usize,
    resolve: &'a F,
}

impl<F> ExprParser<'_, F>
where
    F: Fn(&str) -> String,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Option<LicenseExpr> {
        let mut items = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.consume();
            items.push(self.parse_and()?);
        }
        Some(LicenseExpr::combine_or(items))
    }

    fn parse_and(&mut self) -> Option<LicenseExpr> {
        let mut items = vec![self.parse_atom()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.consume();
            items.push(self.parse_atom()?);
        }
        LicenseExpr::and_all(items)
    }

    fn parse_atom(&mut self) -> Option<LicenseExpr> {
        match self.peek()? {
            Token::LParen => {
                self.consume();
                let inner = self.parse_or()?;
                match self.consume() {
                    Some(Token::RParen) => Some(inner),
                    _ => None,
                }
            }
            Token::Word(_) => {
                let leaf = self.leaf()?;
                let base = LicenseExpr::License((self.resolve)(&leaf));
                if matches!(self.peek(), Some(Token::With)) {
                    self.consume();
                    let exception = self.leaf()?;
                    return Some(LicenseExpr::With(Box::new(base), (self.resolve)(&exception)));
                }
                Some(base)
            }
            _ => None,
        }
    }

    fn leaf(&mut self) -> Option<String> {
        let mut words = Vec::new();
        while let Some(Token::Word(w)) = self.peek() {
            words.push(w.clone());
            self.consume();
        }
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

/// Parse `expr`, mapping each leaf through `resolve`. Returns `None` when the
/// text is not a well-formed expression.
pub fn parse<F>(expr: &str, resolve: &F) -> Option<LicenseExpr>
where
    F: Fn(&str) -> String,
{
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        return None;
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        resolve,
    };
    let expr = parser.parse_or()?;
    if parser.pos == parser.tokens.len() {
        Some(expr)
    } else {
        None
    }
}
