//! Server-side list filters

use std::fmt;

/// Comparison operator of a filter term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// `:` (has / contains)
    Has,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Ge => ">=",
            FilterOp::Le => "<=",
            FilterOp::Has => ":",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Compare {
        field: String,
        op: FilterOp,
        value: String,
    },
    Raw(String),
}

/// Filter expression sent with the first page request.
///
/// Terms are AND-combined and rendered as
/// `(name = "web-1") AND (status != "TERMINATED")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    terms: Vec<Term>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter expression passed through verbatim
    pub fn raw(expression: impl Into<String>) -> Self {
        Self::new().and_raw(expression)
    }

    pub fn and(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        self.terms.push(Term::Compare {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn and_eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.and(field, FilterOp::Eq, value)
    }

    pub fn and_raw(mut self, expression: impl Into<String>) -> Self {
        let expression = expression.into();
        if !expression.trim().is_empty() {
            self.terms.push(Term::Raw(expression));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Rendered expression, `None` when there is nothing to filter on
    pub fn render(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl fmt::Display for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // a single raw expression stays untouched
        if let [Term::Raw(expr)] = self.terms.as_slice() {
            return f.write_str(expr);
        }

        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            match term {
                Term::Compare { field, op, value } => {
                    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "({} {} \"{}\")", field, op.as_str(), escaped)?;
                }
                Term::Raw(expr) => write!(f, "({})", expr)?,
            }
        }
        Ok(())
    }
}
