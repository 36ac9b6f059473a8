//! Token, keyword and symbol definitions.

use std::fmt;

/// Keywords are matched case-insensitively and carried in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Drop,
    Alter,
    Add,
    Primary,
    Key,
    Not,
    Null,
    Unique,
    Autoincrement,
    Default,
    And,
    Or,
    In,
    Like,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Group,
    Having,
    Join,
    Inner,
    Left,
    Right,
    Outer,
    Cross,
    As,
    On,
    Is,
    Distinct,
    True,
    False,
}

impl Keyword {
    pub fn lookup(ident: &str) -> Option<Keyword> {
        let upper = ident.to_ascii_uppercase();
        let kw = match upper.as_str() {
            "SELECT" => Self::Select,
            "FROM" => Self::From,
            "WHERE" => Self::Where,
            "INSERT" => Self::Insert,
            "INTO" => Self::Into,
            "VALUES" => Self::Values,
            "UPDATE" => Self::Update,
            "SET" => Self::Set,
            "DELETE" => Self::Delete,
            "CREATE" => Self::Create,
            "TABLE" => Self::Table,
            "DROP" => Self::Drop,
            "ALTER" => Self::Alter,
            "ADD" => Self::Add,
            "PRIMARY" => Self::Primary,
            "KEY" => Self::Key,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "UNIQUE" => Self::Unique,
            "AUTOINCREMENT" => Self::Autoincrement,
            "DEFAULT" => Self::Default,
            "AND" => Self::And,
            "OR" => Self::Or,
            "IN" => Self::In,
            "LIKE" => Self::Like,
            "ORDER" => Self::Order,
            "BY" => Self::By,
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            "LIMIT" => Self::Limit,
            "OFFSET" => Self::Offset,
            "GROUP" => Self::Group,
            "HAVING" => Self::Having,
            "JOIN" => Self::Join,
            "INNER" => Self::Inner,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            "OUTER" => Self::Outer,
            "CROSS" => Self::Cross,
            "AS" => Self::As,
            "ON" => Self::On,
            "IS" => Self::Is,
            "DISTINCT" => Self::Distinct,
            "TRUE" => Self::True,
            "FALSE" => Self::False,
            _ => return None,
        };
        Some(kw)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::Insert => "INSERT",
            Self::Into => "INTO",
            Self::Values => "VALUES",
            Self::Update => "UPDATE",
            Self::Set => "SET",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Table => "TABLE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Add => "ADD",
            Self::Primary => "PRIMARY",
            Self::Key => "KEY",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Unique => "UNIQUE",
            Self::Autoincrement => "AUTOINCREMENT",
            Self::Default => "DEFAULT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::Order => "ORDER",
            Self::By => "BY",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::Group => "GROUP",
            Self::Having => "HAVING",
            Self::Join => "JOIN",
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Outer => "OUTER",
            Self::Cross => "CROSS",
            Self::As => "AS",
            Self::On => "ON",
            Self::Is => "IS",
            Self::Distinct => "DISTINCT",
            Self::True => "TRUE",
            Self::False => "FALSE",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Star,
    Comma,
    LParen,
    RParen,
    Eq,
    /// Both `<>` and `!=` lex to this.
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Plus,
    Minus,
    Slash,
    Semicolon,
    Dot,
}

impl Symbol {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Star => "*",
            Self::Comma => ",",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Slash => "/",
            Self::Semicolon => ";",
            Self::Dot => ".",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Eof,
    Ident(String),
    /// Raw number text; the parser decides between i64 and f64.
    Number(String),
    /// Contents of a single-quoted string, escapes resolved.
    Str(String),
    Symbol(Symbol),
    Keyword(Keyword),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("end of input"),
            Self::Ident(name) => write!(f, "identifier `{name}`"),
            Self::Number(text) => write!(f, "number `{text}`"),
            Self::Str(text) => write!(f, "string '{text}'"),
            Self::Symbol(sym) => write!(f, "`{sym}`"),
            Self::Keyword(kw) => write!(f, "{kw}"),
        }
    }
}
