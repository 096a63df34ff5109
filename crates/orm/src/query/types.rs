//! Query Builder Types - ordering terms and rendered clause caches

use std::fmt;

use once_cell::sync::OnceCell;

use super::condition::Queryable;
use crate::sql::NamedArg;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub expr: Queryable,
    pub direction: OrderDirection,
}

/// Bound-mode text of one clause and its bind values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<NamedArg>,
}

impl Rendered {
    pub fn new(sql: impl Into<String>, args: Vec<NamedArg>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// Memoized clause text, cleared by the mutations that can change it
#[derive(Debug, Clone, Default)]
pub(crate) struct ClauseCache {
    pub(crate) select: OnceCell<Rendered>,
    pub(crate) from: OnceCell<Rendered>,
    pub(crate) where_clause: OnceCell<Rendered>,
    pub(crate) options: OnceCell<Rendered>,
}

impl ClauseCache {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
