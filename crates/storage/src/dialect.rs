//! Placeholder dialects.
//!
//! Callers write every query with positional `?` placeholders. Each backend
//! rewrites them into its own syntax before execution.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` is native.
    Sqlite,
    /// `?` becomes `$1`, `$2`, ... in order of appearance.
    Postgres,
}

impl Dialect {
    /// Rewrite `?` placeholders. Question marks inside single-quoted literals
    /// or double-quoted identifiers are left alone.
    pub fn rewrite<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Sqlite => Cow::Borrowed(sql),
            Self::Postgres => {
                if !sql.contains('?') {
                    return Cow::Borrowed(sql);
                }
                Cow::Owned(numbered_placeholders(sql))
            },
        }
    }
}

fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len().saturating_add(16));
    let mut index = 0_usize;
    let mut in_literal = false;
    let mut in_identifier = false;
    for c in sql.chars() {
        match c {
            '\'' if !in_identifier => in_literal = !in_literal,
            '"' if !in_literal => in_identifier = !in_identifier,
            '?' if !in_literal && !in_identifier => {
                index = index.saturating_add(1);
                out.push('$');
                out.push_str(&index.to_string());
                continue;
            },
            _ => {},
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_passes_through() {
        let sql = "SELECT * FROM serials WHERE serial_number = ?";
        assert!(matches!(Dialect::Sqlite.rewrite(sql), Cow::Borrowed(s) if s == sql));
    }

    #[test]
    fn postgres_numbers_in_order() {
        let sql = "INSERT INTO serials (serial_number, source_filename, status) VALUES (?, ?, ?)";
        assert_eq!(
            Dialect::Postgres.rewrite(sql),
            "INSERT INTO serials (serial_number, source_filename, status) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn postgres_skips_quoted_question_marks() {
        let sql = "SELECT '?', \"odd?col\" FROM t WHERE a = ? AND b LIKE 'it''s ?' AND c = ?";
        assert_eq!(
            Dialect::Postgres.rewrite(sql),
            "SELECT '?', \"odd?col\" FROM t WHERE a = $1 AND b LIKE 'it''s ?' AND c = $2"
        );
    }

    #[test]
    fn postgres_handles_double_digit_indexes() {
        let sql = vec!["?"; 11].join(",");
        let rewritten = Dialect::Postgres.rewrite(&sql);
        assert!(rewritten.ends_with("$10,$11"));
    }

    #[test]
    fn postgres_without_placeholders_borrows() {
        assert!(matches!(Dialect::Postgres.rewrite("DELETE FROM serials"), Cow::Borrowed(_)));
    }
}
