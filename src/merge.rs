use toml::{Table, Value};

use crate::naming::{self, NamingStyle};

/// Deep-merge `over` on top of `base` and return the result.
///
/// Tables merge key by key; keys only present in `over` are appended after
/// the keys of `base`. Anything else (scalars, arrays, or a table meeting a
/// non-table) is replaced wholesale by the value from `over`. Neither input
/// is modified.
pub fn merge(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Table(base), Value::Table(over)) => Value::Table(merge_tables(base, over)),
        (_, over) => over.clone(),
    }
}

pub fn merge_tables(base: &Table, over: &Table) -> Table {
    let mut merged = base.clone();
    for (key, value) in over {
        let next = match base.get(key) {
            Some(existing) => merge(existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Rewrite every table key in `value`, at every depth, in the given style.
/// Tables nested inside arrays are rewritten too. If two keys of one table
/// collide after conversion, the later one wins.
pub fn normalize_keys(value: Value, style: NamingStyle) -> Value {
    match value {
        Value::Table(table) => Value::Table(normalize_table(table, style)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_keys(item, style))
                .collect(),
        ),
        other => other,
    }
}

pub fn normalize_table(table: Table, style: NamingStyle) -> Table {
    let mut out = Table::new();
    for (key, value) in table {
        out.insert(naming::convert(&key, style), normalize_keys(value, style));
    }
    out
}
