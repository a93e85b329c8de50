use rusqlite::types::Value;

use crate::engine::query::filter::{NumericRange, TimeRange, ValueFilter};
use crate::engine::store::Tenant;

/// Prefix marking an identity filter value as a team reference.
pub const TEAM_TOKEN_PREFIX: &str = "team_id:";

/// Table holding `(team_id, user_id)` membership rows.
pub const TEAM_MEMBERSHIPS_TABLE: &str = "team_memberships";

/// Table holding polymorphic `(tag_id, item_type, item_id)` rows.
pub const TAG_ITEMS_TABLE: &str = "tag_items";

/// Compiled WHERE clause: SQL fragments AND-ed together plus their bound
/// parameters, kept in textual order.
///
/// Column expressions are always code-owned strings; every value coming from
/// a filter is bound as a parameter. Conflicting filters on the same column
/// are not reconciled, they are simply AND-combined.
#[derive(Debug, Clone)]
pub struct Conditions {
    tenant: Tenant,
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub fn new(tenant: &Tenant) -> Self {
        Self {
            tenant: tenant.clone(),
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// ` WHERE a AND b`, or an empty string without clauses.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Adds a raw clause whose `?` placeholders match `params` in order.
    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) -> &mut Self {
        self.clauses.push(clause.into());
        self.params.extend(params);
        self
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push(format!("{column} = ?"), [value.into()])
    }

    pub fn one_of<T>(&mut self, column: &str, filter: &ValueFilter<T>) -> &mut Self
    where
        T: Clone + Into<Value>,
    {
        if let ValueFilter::OneOf(values) = filter {
            let clause = self.in_list(column, values);
            self.clauses.push(clause);
        }
        self
    }

    /// Excludes the listed values while keeping rows where the column is NULL.
    pub fn none_of<T>(&mut self, column: &str, filter: &ValueFilter<T>) -> &mut Self
    where
        T: Clone + Into<Value>,
    {
        if let ValueFilter::OneOf(values) = filter {
            if !values.is_empty() {
                let inner = self.in_list(column, values);
                self.clauses
                    .push(format!("({column} IS NULL OR NOT ({inner}))"));
            }
        }
        self
    }

    /// Identity inclusion with `team_id:<uuid>` expansion.
    pub fn identity_one_of(&mut self, column: &str, filter: &ValueFilter<String>) -> &mut Self {
        if let ValueFilter::OneOf(values) = filter {
            let clause = self.identity_clause(column, values);
            self.clauses.push(clause);
        }
        self
    }

    /// Identity exclusion with `team_id:<uuid>` expansion; rows without an
    /// identity are kept.
    pub fn identity_none_of(&mut self, column: &str, filter: &ValueFilter<String>) -> &mut Self {
        if let ValueFilter::OneOf(values) = filter {
            if !values.is_empty() {
                let inner = self.identity_clause(column, values);
                self.clauses
                    .push(format!("({column} IS NULL OR NOT ({inner}))"));
            }
        }
        self
    }

    /// Identity inclusion through a link table, e.g. pull requests whose
    /// reviews were written by one of the listed users.
    pub fn identity_through(
        &mut self,
        id_column: &str,
        link_table: &str,
        link_id: &str,
        link_identity: &str,
        filter: &ValueFilter<String>,
    ) -> &mut Self {
        if let ValueFilter::OneOf(values) = filter {
            let inner = self.identity_clause(link_identity, values);
            let table = self.tenant.table(link_table);
            self.clauses.push(format!(
                "{id_column} IN (SELECT {link_id} FROM {table} WHERE {inner})"
            ));
        }
        self
    }

    pub fn time_range(&mut self, column: &str, range: Option<&TimeRange>) -> &mut Self {
        if let Some(range) = range {
            if let Some(start) = range.start {
                self.push(format!("{column} >= ?"), [Value::Integer(start)]);
            }
            if let Some(end) = range.end {
                self.push(format!("{column} < ?"), [Value::Integer(end)]);
            }
        }
        self
    }

    pub fn numeric_range(&mut self, column: &str, range: Option<&NumericRange>) -> &mut Self {
        if let Some(range) = range {
            let bounds = [
                (range.gt, ">"),
                (range.gte, ">="),
                (range.lt, "<"),
                (range.lte, "<="),
            ];
            for (bound, op) in bounds {
                if let Some(value) = bound {
                    self.push(format!("{column} {op} ?"), [Value::Real(value)]);
                }
            }
        }
        self
    }

    /// Restricts to items carrying any of the given tags.
    pub fn tagged(&mut self, id_column: &str, item_type: &str, tag_ids: &ValueFilter<i64>) -> &mut Self {
        if let ValueFilter::OneOf(ids) = tag_ids {
            if ids.is_empty() {
                self.clauses.push("1 = 0".to_string());
                return self;
            }
            let table = self.tenant.table(TAG_ITEMS_TABLE);
            self.params.push(Value::Text(item_type.to_string()));
            let tags = self.in_list("tag_id", ids);
            self.clauses.push(format!(
                "{id_column} IN (SELECT item_id FROM {table} WHERE item_type = ? AND {tags})"
            ));
        }
        self
    }

    fn in_list<T>(&mut self, column: &str, values: &[T]) -> String
    where
        T: Clone + Into<Value>,
    {
        if values.is_empty() {
            return "1 = 0".to_string();
        }
        self.params.extend(values.iter().cloned().map(Into::into));
        format!("{column} IN ({})", placeholders(values.len()))
    }

    fn identity_clause(&mut self, column: &str, values: &[String]) -> String {
        let (teams, users): (Vec<&str>, Vec<&str>) = values
            .iter()
            .map(String::as_str)
            .partition(|v| v.starts_with(TEAM_TOKEN_PREFIX));

        let mut parts = Vec::new();
        if !users.is_empty() {
            self.params
                .extend(users.iter().map(|u| Value::Text(u.to_string())));
            parts.push(format!("{column} IN ({})", placeholders(users.len())));
        }
        if !teams.is_empty() {
            self.params.extend(teams.iter().map(|t| {
                Value::Text(t.trim_start_matches(TEAM_TOKEN_PREFIX).to_string())
            }));
            let table = self.tenant.table(TEAM_MEMBERSHIPS_TABLE);
            parts.push(format!(
                "{column} IN (SELECT user_id FROM {table} WHERE team_id IN ({}))",
                placeholders(teams.len())
            ));
        }

        match parts.len() {
            0 => "1 = 0".to_string(),
            1 => parts.remove(0),
            _ => format!("({})", parts.join(" OR ")),
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
