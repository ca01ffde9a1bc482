//! SQL identifier quoting.
//!
//! All object names are double-quote-escaped before interpolation into DDL.
//! Definition SQL bodies are interpolated verbatim — operators are trusted
//! to supply safe `SELECT` text.

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualified, quoted object name: `"schema"."name"`.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}
