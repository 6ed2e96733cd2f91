//! Statement rendering.
//!
//! Identifiers are always double-quoted and values always bound as `?`
//! parameters. Writes return the affected rows with `RETURNING`.

use trellis_core::{Condition, Criteria, Direction, OrderBy, Tuple};
use trellis_types::{Name, Value};

/// SQL text with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Quotes an identifier, doubling embedded quotes.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(columns: &[Name]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn condition(condition: &Condition, params: &mut Vec<Value>) -> String {
    match condition {
        Condition::Eq(name, value) => {
            params.push(value.clone());
            format!("{} = ?", quote(name))
        }
        Condition::In(_, values) if values.is_empty() => "1 = 0".to_owned(),
        Condition::In(name, values) => {
            params.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            format!("{} IN ({placeholders})", quote(name))
        }
        Condition::IsNull(name) => format!("{} IS NULL", quote(name)),
    }
}

fn where_clause(sql: &mut String, criteria: &[Criteria], params: &mut Vec<Value>) {
    let conditions: Vec<String> = criteria
        .iter()
        .flat_map(Criteria::conditions)
        .map(|c| condition(c, params))
        .collect();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
}

fn returning(sql: &mut String, columns: &[Name]) {
    if !columns.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&column_list(columns));
    }
}

/// `SELECT columns FROM table [WHERE ..] [ORDER BY ..] [LIMIT .. OFFSET ..]`
pub fn select(
    table: &str,
    columns: &[Name],
    criteria: &[Criteria],
    order: &[OrderBy],
    limit: Option<u64>,
    offset: u64,
) -> Statement {
    let mut params = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", column_list(columns), quote(table));
    where_clause(&mut sql, criteria, &mut params);
    if !order.is_empty() {
        let terms: Vec<String> = order
            .iter()
            .map(|term| match term.direction {
                Direction::Asc => format!("{} ASC", quote(&term.attribute)),
                Direction::Desc => format!("{} DESC", quote(&term.attribute)),
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    match (limit, offset) {
        (Some(limit), 0) => sql.push_str(&format!(" LIMIT {limit}")),
        (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (None, 0) => {}
        (None, offset) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
    }
    Statement { sql, params }
}

/// `INSERT INTO table (..) VALUES (..) RETURNING ..`
pub fn insert(table: &str, tuple: &Tuple, returning_columns: &[Name]) -> Statement {
    let mut sql = format!("INSERT INTO {}", quote(table));
    let params: Vec<Value> = tuple.iter().map(|(_, v)| v.clone()).collect();
    if tuple.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let names: Vec<Name> = tuple.names().cloned().collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        sql.push_str(&format!(" ({}) VALUES ({placeholders})", column_list(&names)));
    }
    returning(&mut sql, returning_columns);
    Statement { sql, params }
}

/// `UPDATE table SET .. [WHERE ..] RETURNING ..`
pub fn update(
    table: &str,
    changes: &Tuple,
    criteria: &[Criteria],
    returning_columns: &[Name],
) -> Statement {
    let mut params: Vec<Value> = changes.iter().map(|(_, v)| v.clone()).collect();
    let assignments: Vec<String> = changes
        .names()
        .map(|name| format!("{} = ?", quote(name)))
        .collect();
    let mut sql = format!("UPDATE {} SET {}", quote(table), assignments.join(", "));
    where_clause(&mut sql, criteria, &mut params);
    returning(&mut sql, returning_columns);
    Statement { sql, params }
}

/// `DELETE FROM table [WHERE ..] RETURNING ..`
pub fn delete(table: &str, criteria: &[Criteria], returning_columns: &[Name]) -> Statement {
    let mut params = Vec::new();
    let mut sql = format!("DELETE FROM {}", quote(table));
    where_clause(&mut sql, criteria, &mut params);
    returning(&mut sql, returning_columns);
    Statement { sql, params }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<Name> {
        names.iter().map(|n| Name::from(*n)).collect()
    }

    #[test]
    fn select_with_everything() {
        let stmt = select(
            "users",
            &names(&["id", "name"]),
            &[Criteria::new().eq("name", "Jane"), Criteria::new().any("id", [1, 2])],
            &[OrderBy::desc("id")],
            Some(10),
            5,
        );
        assert_eq!(
            stmt.sql,
            concat!(
                r#"SELECT "id", "name" FROM "users" WHERE "name" = ? AND "id" IN (?, ?) "#,
                r#"ORDER BY "id" DESC LIMIT 10 OFFSET 5"#
            )
        );
        assert_eq!(
            stmt.params,
            [Value::from("Jane"), Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn offset_without_limit_and_empty_in() {
        let stmt = select(
            "tasks",
            &names(&["id"]),
            &[Criteria::new().any("user_id", Vec::<i64>::new()).is_null("title")],
            &[],
            None,
            3,
        );
        assert_eq!(
            stmt.sql,
            r#"SELECT "id" FROM "tasks" WHERE 1 = 0 AND "title" IS NULL LIMIT -1 OFFSET 3"#
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn writes_return_rows() {
        let cols = names(&["id", "name"]);
        let stmt = insert("users", &Tuple::new().with("name", "Jane"), &cols);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("name") VALUES (?) RETURNING "id", "name""#
        );
        let stmt = insert("users", &Tuple::new(), &cols);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" DEFAULT VALUES RETURNING "id", "name""#
        );
        let stmt = update(
            "users",
            &Tuple::new().with("name", "Joe"),
            &[Criteria::new().eq("id", 2)],
            &cols,
        );
        assert_eq!(
            stmt.sql,
            r#"UPDATE "users" SET "name" = ? WHERE "id" = ? RETURNING "id", "name""#
        );
        assert_eq!(stmt.params, [Value::from("Joe"), Value::Integer(2)]);
        let stmt = delete("users", &[], &cols);
        assert_eq!(stmt.sql, r#"DELETE FROM "users" RETURNING "id", "name""#);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }
}
