//! Recursive-descent parser. Each production returns a `Result` and the
//! first error bubbles up; there is no recovery or backtracking beyond
//! single-token peeks.

use crate::ParseError;
use crate::ast::*;
use crate::lexer::tokenize;
use crate::token::{Keyword, Symbol, Token};
use flintdb_types::{ColumnDef, Constraints, DataType, Value};

/// Parse a single SQL statement. A trailing `;` is allowed; anything after
/// it is an error.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.parse_statement()?;
    parser.eat_symbol(Symbol::Semicolon);
    parser.expect_eof()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_owned(),
            found: self.peek().to_string(),
            position: self.position(),
        }
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == keyword)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword.name()))
        }
    }

    fn at_symbol(&self, symbol: Symbol) -> bool {
        matches!(self.peek(), Token::Symbol(s) if *s == symbol)
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.at_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> Result<(), ParseError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(symbol.text()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(_) => match self.advance() {
                Token::Ident(name) => Ok(name),
                _ => unreachable!(),
            },
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            Token::Keyword(Keyword::Select) => self.parse_select().map(Statement::Select),
            Token::Keyword(Keyword::Insert) => self.parse_insert().map(Statement::Insert),
            Token::Keyword(Keyword::Update) => self.parse_update().map(Statement::Update),
            Token::Keyword(Keyword::Delete) => self.parse_delete().map(Statement::Delete),
            Token::Keyword(Keyword::Create) => self.parse_create().map(Statement::CreateTable),
            Token::Keyword(Keyword::Drop) => self.parse_drop().map(Statement::DropTable),
            Token::Keyword(Keyword::Alter) => self.parse_alter().map(Statement::AlterTable),
            other => Err(ParseError::UnsupportedSyntax(format!(
                "statement starting with {other}"
            ))),
        }
    }

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = self.eat_keyword(Keyword::Distinct);
        let columns = self.parse_expr_list()?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;

        let mut joins = Vec::new();
        while let Some(join) = self.parse_join()? {
            joins.push(join);
        }

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let having = if self.eat_keyword(Keyword::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            let mut order = Vec::new();
            loop {
                let expr = self.parse_expr()?;
                let descending = if self.eat_keyword(Keyword::Desc) {
                    true
                } else {
                    self.eat_keyword(Keyword::Asc);
                    false
                };
                order.push(OrderByExpr { expr, descending });
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            order
        } else {
            Vec::new()
        };

        let limit = if self.eat_keyword(Keyword::Limit) {
            Some(self.parse_unsigned()?)
        } else {
            None
        };
        let offset = if self.eat_keyword(Keyword::Offset) {
            Some(self.parse_unsigned()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            columns,
            table,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// One `[modifier] JOIN table [AS alias] [ON expr]` clause, or `None`
    /// when the next token opens no join. A bare `JOIN` is INNER.
    fn parse_join(&mut self) -> Result<Option<JoinClause>, ParseError> {
        let join_type = if self.eat_keyword(Keyword::Inner) {
            JoinType::Inner
        } else if self.eat_keyword(Keyword::Left) {
            self.eat_keyword(Keyword::Outer);
            JoinType::Left
        } else if self.eat_keyword(Keyword::Right) {
            self.eat_keyword(Keyword::Outer);
            JoinType::Right
        } else if self.eat_keyword(Keyword::Cross) {
            JoinType::Cross
        } else if self.at_keyword(Keyword::Join) {
            JoinType::Inner
        } else {
            return Ok(None);
        };
        self.expect_keyword(Keyword::Join)?;
        let table = self.expect_ident()?;
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let on = if self.eat_keyword(Keyword::On) {
            if join_type == JoinType::Cross {
                return Err(ParseError::UnsupportedSyntax("CROSS JOIN with ON".into()));
            }
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Some(JoinClause {
            join_type,
            table,
            alias,
            on,
        }))
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_ident()?;

        let mut columns = Vec::new();
        if self.eat_symbol(Symbol::LParen) {
            loop {
                columns.push(self.expect_ident()?);
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            self.expect_symbol(Symbol::RParen)?;
        }

        self.expect_keyword(Keyword::Values)?;
        let mut values = Vec::new();
        loop {
            self.expect_symbol(Symbol::LParen)?;
            values.push(self.parse_expr_list()?);
            self.expect_symbol(Symbol::RParen)?;
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }

        Ok(InsertStatement {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_ident()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_ident()?;
            self.expect_symbol(Symbol::Eq)?;
            let value = self.parse_expr()?;
            assignments.push((column, value));
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    fn parse_create(&mut self) -> Result<CreateTableStatement, ParseError> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_ident()?;
        self.expect_symbol(Symbol::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        self.expect_symbol(Symbol::RParen)?;
        Ok(CreateTableStatement { table, columns })
    }

    fn parse_drop(&mut self) -> Result<DropTableStatement, ParseError> {
        self.expect_keyword(Keyword::Drop)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_ident()?;
        Ok(DropTableStatement { table })
    }

    fn parse_alter(&mut self) -> Result<AlterTableStatement, ParseError> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_ident()?;
        let action = if self.eat_keyword(Keyword::Add) {
            AlterAction::AddColumn(self.parse_column_def()?)
        } else if self.eat_keyword(Keyword::Drop) {
            AlterAction::DropColumn(self.expect_ident()?)
        } else {
            return Err(self.unexpected("ADD or DROP"));
        };
        Ok(AlterTableStatement { table, action })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_ident()?;
        let type_name = self.expect_ident()?;
        let col_type = data_type_from_name(&type_name)
            .ok_or_else(|| ParseError::InvalidValue(format!("unknown data type `{type_name}`")))?;

        let mut column = ColumnDef::new(name, col_type);
        loop {
            if self.eat_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                column.constraints |= Constraints::PRIMARY_KEY;
            } else if self.eat_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Null)?;
                column.constraints |= Constraints::NOT_NULL;
            } else if self.eat_keyword(Keyword::Unique) {
                column.constraints |= Constraints::UNIQUE;
            } else if self.eat_keyword(Keyword::Autoincrement) {
                column.constraints |= Constraints::AUTO_INC;
            } else if self.eat_keyword(Keyword::Default) {
                let expr = self.parse_primary()?;
                let Expr::Literal(value) = expr else {
                    return Err(ParseError::InvalidValue(
                        "DEFAULT requires a literal value".into(),
                    ));
                };
                column.default_value = Some(value);
            } else {
                break;
            }
        }
        Ok(column)
    }

    fn parse_unsigned(&mut self) -> Result<u64, ParseError> {
        match self.peek().clone() {
            Token::Number(text) => {
                self.advance();
                text.parse::<u64>()
                    .map_err(|_| ParseError::InvalidValue(format!("expected an integer, got `{text}`")))
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat_symbol(Symbol::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    // Precedence, lowest to highest:
    // OR -> AND -> equality/IS NULL -> comparison -> additive -> multiplicative -> primary
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_equality()?;
            left = Expr::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            if self.eat_symbol(Symbol::Eq) {
                let right = self.parse_comparison()?;
                left = Expr::binary(left, BinaryOperator::Eq, right);
            } else if self.eat_symbol(Symbol::NotEq) {
                let right = self.parse_comparison()?;
                left = Expr::binary(left, BinaryOperator::NotEq, right);
            } else if self.eat_keyword(Keyword::Is) {
                let negated = self.eat_keyword(Keyword::Not);
                self.expect_keyword(Keyword::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                };
            } else if self.at_keyword(Keyword::In) {
                return Err(ParseError::UnsupportedSyntax("IN".into()));
            } else if self.at_keyword(Keyword::Like) {
                return Err(ParseError::UnsupportedSyntax("LIKE".into()));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.eat_symbol(Symbol::Lt) {
                BinaryOperator::Lt
            } else if self.eat_symbol(Symbol::Gt) {
                BinaryOperator::Gt
            } else if self.eat_symbol(Symbol::LtEq) {
                BinaryOperator::LtEq
            } else if self.eat_symbol(Symbol::GtEq) {
                BinaryOperator::GtEq
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_symbol(Symbol::Plus) {
                BinaryOperator::Plus
            } else if self.eat_symbol(Symbol::Minus) {
                BinaryOperator::Minus
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;
        loop {
            let op = if self.eat_symbol(Symbol::Star) {
                BinaryOperator::Multiply
            } else if self.eat_symbol(Symbol::Slash) {
                BinaryOperator::Divide
            } else {
                return Ok(left);
            };
            let right = self.parse_primary()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(text) => {
                self.advance();
                number_literal(&text, false)
            }
            Token::Symbol(Symbol::Minus) => {
                self.advance();
                match self.peek().clone() {
                    Token::Number(text) => {
                        self.advance();
                        number_literal(&text, true)
                    }
                    _ => Err(self.unexpected("number")),
                }
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(text)))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Value::Boolean(true)))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Value::Boolean(false)))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Symbol(Symbol::Star) => {
                self.advance();
                Ok(Expr::Wildcard)
            }
            Token::Symbol(Symbol::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(expr)
            }
            Token::Ident(name) => {
                self.advance();
                if self.eat_symbol(Symbol::LParen) {
                    let args = if self.at_symbol(Symbol::RParen) {
                        Vec::new()
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect_symbol(Symbol::RParen)?;
                    Ok(Expr::Function { name, args })
                } else if self.eat_symbol(Symbol::Dot) {
                    let column = self.expect_ident()?;
                    Ok(Expr::Column {
                        table: Some(name),
                        name: column,
                    })
                } else {
                    Ok(Expr::Column { table: None, name })
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

fn number_literal(text: &str, negate: bool) -> Result<Expr, ParseError> {
    if let Ok(int) = text.parse::<i64>() {
        let int = if negate { -int } else { int };
        return Ok(Expr::Literal(Value::Integer(int)));
    }
    match text.parse::<f64>() {
        Ok(float) => {
            let float = if negate { -float } else { float };
            Ok(Expr::Literal(Value::Float(float)))
        }
        Err(_) => Err(ParseError::InvalidValue(format!("bad number `{text}`"))),
    }
}

fn data_type_from_name(name: &str) -> Option<DataType> {
    let upper = name.to_ascii_uppercase();
    let ty = match upper.as_str() {
        "INTEGER" | "INT" => DataType::Integer,
        "FLOAT" | "REAL" => DataType::Float,
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "TEXT" | "STRING" | "VARCHAR" => DataType::Text,
        "BLOB" => DataType::Blob,
        "DATE" => DataType::Date,
        "DATETIME" => DataType::DateTime,
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_select(sql: &str) -> SelectStatement {
        match parse(sql).unwrap() {
            Statement::Select(sel) => sel,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn select_with_where() {
        let sel = parse_select("SELECT id, name, email FROM users WHERE age > 25");
        assert_eq!(sel.table, "users");
        assert_eq!(sel.columns.len(), 3);
        match sel.where_clause.unwrap() {
            Expr::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::Gt);
                assert_eq!(*left, Expr::column("age"));
                assert_eq!(*right, Expr::Literal(Value::Integer(25)));
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn multi_row_insert() {
        let stmt = parse("INSERT INTO users (id, name) VALUES (1,'John'),(2,'Jane'),(3,'Bob')").unwrap();
        let Statement::Insert(ins) = stmt else {
            panic!("expected INSERT");
        };
        assert_eq!(ins.table, "users");
        assert_eq!(ins.columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(ins.values.len(), 3);
        assert_eq!(
            ins.values[1],
            vec![
                Expr::Literal(Value::Integer(2)),
                Expr::Literal(Value::Text("Jane".into()))
            ]
        );
    }

    #[test]
    fn operator_precedence() {
        let sel = parse_select("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3");
        // AND binds tighter than OR.
        let Expr::BinaryOp { op, right, .. } = sel.where_clause.unwrap() else {
            panic!()
        };
        assert_eq!(op, BinaryOperator::Or);
        assert!(matches!(
            *right,
            Expr::BinaryOp {
                op: BinaryOperator::And,
                ..
            }
        ));

        let sel = parse_select("SELECT * FROM t WHERE a + b * c > 4");
        let Expr::BinaryOp { op, left, .. } = sel.where_clause.unwrap() else {
            panic!()
        };
        assert_eq!(op, BinaryOperator::Gt);
        let Expr::BinaryOp { op, right, .. } = *left else { panic!() };
        assert_eq!(op, BinaryOperator::Plus);
        assert!(matches!(
            *right,
            Expr::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn joins() {
        let sel = parse_select(
            "SELECT * FROM orders JOIN users AS u ON orders.user_id = u.id LEFT OUTER JOIN items ON items.order_id = orders.id CROSS JOIN tags",
        );
        assert_eq!(sel.joins.len(), 3);
        assert_eq!(sel.joins[0].join_type, JoinType::Inner);
        assert_eq!(sel.joins[0].alias.as_deref(), Some("u"));
        assert_eq!(sel.joins[1].join_type, JoinType::Left);
        assert_eq!(sel.joins[2].join_type, JoinType::Cross);
        assert!(sel.joins[2].on.is_none());
    }

    #[test]
    fn cross_join_rejects_on() {
        assert_eq!(
            parse("SELECT * FROM a CROSS JOIN b ON a.x = b.x").unwrap_err(),
            ParseError::UnsupportedSyntax("CROSS JOIN with ON".into())
        );
    }

    #[test]
    fn group_order_limit() {
        let sel = parse_select(
            "SELECT age, COUNT(*) FROM users GROUP BY age HAVING COUNT(*) > 1 ORDER BY age DESC, name LIMIT 10 OFFSET 5",
        );
        assert!(!sel.distinct);
        assert_eq!(sel.group_by, vec![Expr::column("age")]);
        assert!(sel.having.is_some());
        assert_eq!(sel.order_by.len(), 2);
        assert!(sel.order_by[0].descending);
        assert!(!sel.order_by[1].descending);
        assert_eq!(sel.limit, Some(10));
        assert_eq!(sel.offset, Some(5));
    }

    #[test]
    fn is_null_and_negation() {
        let sel = parse_select("SELECT * FROM t WHERE a IS NULL AND b IS NOT NULL");
        let Expr::BinaryOp { left, right, .. } = sel.where_clause.unwrap() else {
            panic!()
        };
        assert_eq!(
            *left,
            Expr::IsNull {
                expr: Box::new(Expr::column("a")),
                negated: false
            }
        );
        assert_eq!(
            *right,
            Expr::IsNull {
                expr: Box::new(Expr::column("b")),
                negated: true
            }
        );
    }

    #[test]
    fn create_table_with_constraints() {
        let stmt = parse(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, age INT DEFAULT 0, bio VARCHAR)",
        )
        .unwrap();
        let Statement::CreateTable(create) = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.table, "users");
        assert_eq!(create.columns.len(), 4);
        assert!(create.columns[0].is_primary_key());
        assert!(create.columns[0].is_auto_increment());
        assert!(create.columns[1].is_not_null());
        assert_eq!(create.columns[2].default_value, Some(Value::Integer(0)));
        assert_eq!(create.columns[3].col_type, DataType::Text);
    }

    #[test]
    fn alter_and_drop() {
        assert_eq!(
            parse("ALTER TABLE users ADD email TEXT").unwrap(),
            Statement::AlterTable(AlterTableStatement {
                table: "users".into(),
                action: AlterAction::AddColumn(ColumnDef::new("email", DataType::Text)),
            })
        );
        assert_eq!(
            parse("ALTER TABLE users DROP email").unwrap(),
            Statement::AlterTable(AlterTableStatement {
                table: "users".into(),
                action: AlterAction::DropColumn("email".into()),
            })
        );
        assert_eq!(
            parse("DROP TABLE users;").unwrap(),
            Statement::DropTable(DropTableStatement {
                table: "users".into()
            })
        );
    }

    #[test]
    fn update_and_delete() {
        let Statement::Update(upd) = parse("UPDATE users SET age = age + 1, name = 'x' WHERE id = 3").unwrap()
        else {
            panic!()
        };
        assert_eq!(upd.assignments.len(), 2);
        assert!(upd.where_clause.is_some());

        let Statement::Delete(del) = parse("DELETE FROM users").unwrap() else {
            panic!()
        };
        assert_eq!(del.table, "users");
        assert!(del.where_clause.is_none());
    }

    #[test]
    fn negative_and_float_literals() {
        let Statement::Insert(ins) = parse("INSERT INTO t VALUES (-5, 2.5, TRUE, NULL)").unwrap() else {
            panic!()
        };
        assert_eq!(
            ins.values[0],
            vec![
                Expr::Literal(Value::Integer(-5)),
                Expr::Literal(Value::Float(2.5)),
                Expr::Literal(Value::Boolean(true)),
                Expr::Literal(Value::Null),
            ]
        );
    }

    #[test]
    fn unsupported_and_error_kinds() {
        assert!(matches!(
            parse("SELECT * FROM t WHERE a IN (1,2)").unwrap_err(),
            ParseError::UnsupportedSyntax(_)
        ));
        assert!(matches!(
            parse("SELECT * FROM t WHERE a LIKE 'x%'").unwrap_err(),
            ParseError::UnsupportedSyntax(_)
        ));
        assert!(matches!(
            parse("EXPLAIN SELECT 1").unwrap_err(),
            ParseError::UnsupportedSyntax(_)
        ));
        assert!(matches!(
            parse("SELECT FROM t").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse("CREATE TABLE t (a WIBBLE)").unwrap_err(),
            ParseError::InvalidValue(_)
        ));
        assert!(matches!(
            parse("SELECT * FROM t; SELECT 1").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn distinct_flag() {
        assert!(parse_select("SELECT DISTINCT name FROM users").distinct);
    }
}
