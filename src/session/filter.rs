// src/session/filter.rs
//
// Minimal display filter for the in-memory session.
//
// Grammar: empty, or `field op value` terms joined by `&&`.
// Fields: id, bus, len, protocol. Ops: ==, !=. Numbers are decimal or 0x hex.

use super::CaptureRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Id,
    Bus,
    Len,
    Protocol,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Value {
    Number(u64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Term {
    field: Field,
    op: Op,
    value: Value,
}

/// A parsed filter. The empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordFilter {
    terms: Vec<Term>,
}

impl RecordFilter {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        let terms = text
            .split("&&")
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    pub fn matches(&self, record: &CaptureRecord) -> bool {
        self.terms.iter().all(|term| term.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn parse_term(raw: &str) -> Result<Term, String> {
    let raw = raw.trim();
    let (lhs, op, rhs) = if let Some((l, r)) = raw.split_once("==") {
        (l, Op::Eq, r)
    } else if let Some((l, r)) = raw.split_once("!=") {
        (l, Op::Ne, r)
    } else {
        return Err(format!("expected '==' or '!=' in '{}'", raw));
    };

    let field = match lhs.trim() {
        "id" => Field::Id,
        "bus" => Field::Bus,
        "len" => Field::Len,
        "protocol" => Field::Protocol,
        "" => return Err(format!("missing field in '{}'", raw)),
        other => return Err(format!("unknown field '{}'", other)),
    };

    let rhs = rhs.trim();
    if rhs.is_empty() {
        return Err(format!("missing value in '{}'", raw));
    }
    let value = if field == Field::Protocol {
        Value::Text(rhs.trim_matches('"').to_string())
    } else {
        Value::Number(parse_number(rhs)?)
    };

    Ok(Term { field, op, value })
}

fn parse_number(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|_| format!("'{}' is not a number", text))
}

impl Term {
    fn matches(&self, record: &CaptureRecord) -> bool {
        let equal = match (&self.field, &self.value) {
            (Field::Id, Value::Number(n)) => u64::from(record.frame_id) == *n,
            (Field::Bus, Value::Number(n)) => u64::from(record.bus) == *n,
            (Field::Len, Value::Number(n)) => record.bytes.len() as u64 == *n,
            (Field::Protocol, Value::Text(p)) => record.protocol == *p,
            _ => false,
        };
        match self.op {
            Op::Eq => equal,
            Op::Ne => !equal,
        }
    }
}
