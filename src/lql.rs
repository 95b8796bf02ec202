//! A tiny, side-effect-free expression language used exclusively for column
//! transforms and filters in the mapping engine (spec §4.10).
//!
//! Grammar, informally:
//!   expr       := segment ("|>" segment)*
//!   segment    := IDENT | IDENT "(" args? ")"
//!   args       := arg ("," arg)*
//!   arg        := STRING | NUMBER | expr
//!
//! A piped value becomes the first (prepended) argument of the next segment.
//! Arguments are themselves evaluated as sub-expressions, which is what lets
//! `concat(upper(left(First,1)), ...)` compose function calls inline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use crate::error::{SyncError, SyncResult};

/// Evaluate an LQL expression against a source record.
pub fn evaluate(expr: &str, source: &Value) -> SyncResult<Value> {
    check_balanced(expr)?;

    let mut acc: Option<Value> = None;
    for (i, raw_segment) in split_top_level(expr, "|>").into_iter().enumerate() {
        let segment = raw_segment.trim();
        let piped = if i == 0 { None } else { acc.take() };
        acc = Some(eval_segment(segment, source, piped)?);
    }
    Ok(acc.unwrap_or(Value::Null))
}

fn check_balanced(expr: &str) -> SyncResult<()> {
    let mut depth = 0i32;
    let mut in_single = false;
    let mut in_double = false;
    for c in expr.chars() {
        if in_single {
            if c == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_double {
            if c == '"' {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' => in_single = true,
            '"' => in_double = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(SyncError::Eval(format!("unbalanced parentheses in `{expr}`")));
        }
    }
    if depth != 0 || in_single || in_double {
        return Err(SyncError::Eval(format!("unbalanced expression `{expr}`")));
    }
    Ok(())
}

fn eval_segment(segment: &str, source: &Value, piped: Option<Value>) -> SyncResult<Value> {
    match parse_call(segment) {
        Some((name, raw_args)) => {
            let mut args: Vec<Value> = Vec::with_capacity(raw_args.len() + 1);
            if let Some(p) = piped {
                args.push(p);
            }
            for raw in raw_args {
                args.push(arg_to_value(&raw, source)?);
            }
            Ok(call_function(&name, &args))
        }
        None => {
            // Bare column reference. A piped value here would mean the
            // grammar was misused (pipes only precede function calls); the
            // column lookup still wins since it is the explicit segment.
            Ok(lookup_column(source, segment.trim()).cloned().unwrap_or(Value::Null))
        }
    }
}

/// Splits a function call into `(name, raw_args)`, or `None` if `segment` is
/// a bare column reference rather than a call.
fn parse_call(segment: &str) -> Option<(String, Vec<String>)> {
    let segment = segment.trim();
    let open = segment.find('(')?;
    if !segment.ends_with(')') {
        return None;
    }
    let name = segment[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let inner = &segment[open + 1..segment.len() - 1];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ",")
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect()
    };
    Some((name.to_string(), args))
}

/// Splits `s` on top-level occurrences of `sep`, respecting nested
/// parentheses and quoted strings (spec §4.10 "Argument parsing respects
/// nested parentheses and quoted commas").
fn split_top_level(s: &str, sep: &str) -> Vec<String> {
    let sep_chars: Vec<char> = sep.chars().collect();
    let chars: Vec<char> = s.chars().collect();
    let mut result = Vec::new();
    let mut depth = 0i32;
    let mut in_single = false;
    let mut in_double = false;
    let mut current = String::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            current.push(c);
            if c == '\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        if in_double {
            current.push(c);
            if c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        if c == '\'' {
            in_single = true;
            current.push(c);
            i += 1;
            continue;
        }
        if c == '"' {
            in_double = true;
            current.push(c);
            i += 1;
            continue;
        }
        if c == '(' {
            depth += 1;
            current.push(c);
            i += 1;
            continue;
        }
        if c == ')' {
            depth -= 1;
            current.push(c);
            i += 1;
            continue;
        }
        if depth == 0
            && !sep_chars.is_empty()
            && i + sep_chars.len() <= chars.len()
            && chars[i..i + sep_chars.len()] == sep_chars[..]
        {
            result.push(std::mem::take(&mut current));
            i += sep_chars.len();
            continue;
        }
        current.push(c);
        i += 1;
    }
    result.push(current);
    result
}

/// An argument is a string literal, a numeric literal, a bare column
/// reference, or — as the worked examples in the spec show `concat`
/// composing `upper`/`left`/`substring` inline — a nested sub-expression,
/// evaluated recursively against the same source record.
fn arg_to_value(raw: &str, source: &Value) -> SyncResult<Value> {
    let raw = raw.trim();
    if raw.len() >= 2 {
        let bytes = raw.as_bytes();
        if (bytes[0] == b'\'' && bytes[raw.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[raw.len() - 1] == b'"')
        {
            return Ok(Value::String(raw[1..raw.len() - 1].to_string()));
        }
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Ok(Value::Number(n));
        }
    }
    evaluate(raw, source)
}

/// Column reference: case-sensitive first, then case-insensitive fallback.
fn lookup_column<'a>(source: &'a Value, name: &str) -> Option<&'a Value> {
    let obj = source.as_object()?;
    if let Some(v) = obj.get(name) {
        return Some(v);
    }
    obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v)
}

fn as_str(v: &Value) -> Option<&str> {
    v.as_str()
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn is_empty_value(v: &Value) -> bool {
    matches!(v, Value::Null) || matches!(v, Value::String(s) if s.is_empty())
}

fn value_to_concat_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => crate::hash::canonical_json(other),
    }
}

fn call_function(name: &str, args: &[Value]) -> Value {
    match name.to_ascii_lowercase().as_str() {
        "upper" => args
            .first()
            .and_then(as_str)
            .map(|s| Value::String(s.to_uppercase()))
            .unwrap_or(Value::Null),
        "lower" => args
            .first()
            .and_then(as_str)
            .map(|s| Value::String(s.to_lowercase()))
            .unwrap_or(Value::Null),
        "trim" => args
            .first()
            .and_then(as_str)
            .map(|s| Value::String(s.trim().to_string()))
            .unwrap_or(Value::Null),
        "length" => args
            .first()
            .and_then(as_str)
            .map(|s| Value::Number(Number::from(s.chars().count() as i64)))
            .unwrap_or(Value::Null),
        "concat" => Value::String(args.iter().map(value_to_concat_str).collect()),
        "coalesce" => args
            .iter()
            .find(|v| !is_empty_value(v))
            .cloned()
            .unwrap_or(Value::Null),
        "substring" => substring_fn(args),
        "dateformat" | "dateformatutc" => dateformat_fn(args),
        "replace" => replace_fn(args),
        "left" => side_fn(args, true),
        "right" => side_fn(args, false),
        _ => args.first().cloned().unwrap_or(Value::Null),
    }
}

fn substring_fn(args: &[Value]) -> Value {
    let s = match args.first().and_then(as_str) {
        Some(s) => s,
        None => return Value::Null,
    };
    let start = match args.get(1).and_then(as_i64) {
        Some(n) => n,
        None => return Value::Null,
    };
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len() as i64;
    let start_idx = (start - 1).clamp(0, total);
    let take_len = match args.get(2).and_then(as_i64) {
        Some(n) => n.max(0),
        None => total - start_idx,
    };
    let end_idx = (start_idx + take_len).clamp(0, total);
    Value::String(chars[start_idx as usize..end_idx as usize].iter().collect())
}

fn side_fn(args: &[Value], left: bool) -> Value {
    let s = match args.first().and_then(as_str) {
        Some(s) => s,
        None => return Value::Null,
    };
    let n = match args.get(1).and_then(as_i64) {
        Some(n) => n.max(0),
        None => return Value::Null,
    };
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len() as i64;
    let n = n.clamp(0, total);
    let slice = if left {
        &chars[..n as usize]
    } else {
        &chars[(total - n) as usize..]
    };
    Value::String(slice.iter().collect())
}

fn replace_fn(args: &[Value]) -> Value {
    let s = match args.first().and_then(as_str) {
        Some(s) => s,
        None => return Value::Null,
    };
    let from = args.get(1).and_then(as_str).unwrap_or("");
    let to = args.get(2).and_then(as_str).unwrap_or("");
    Value::String(s.replace(from, to))
}

fn dateformat_fn(args: &[Value]) -> Value {
    let s = match args.first().and_then(as_str) {
        Some(s) => s,
        None => return Value::Null,
    };
    let fmt = match args.get(1).and_then(as_str) {
        Some(s) => s,
        None => return Value::Null,
    };
    match parse_any_datetime(s) {
        Some(dt) => Value::String(dt.format(fmt).to_string()),
        None => Value::Null,
    }
}

/// Accepts RFC 3339 first (round-trips any timezone offset into UTC), then
/// falls back to a couple of common timestamp/date shapes. Fractional
/// seconds are preserved end to end because RFC 3339 parsing keeps
/// sub-second precision and `%.f`-style format specifiers read it back out
/// (spec §9 open question, resolved here).
fn parse_any_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(d.and_hms_opt(0, 0, 0)?, Utc));
    }
    None
}
