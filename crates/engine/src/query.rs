//! Dynamic table queries: sort, search and filter compiled into a
//! parameterized descriptor.
//!
//! Raw client input ([`RawTableQuery`]) is parsed into a typed
//! [`TableQuery`] for one table shape ([`ExpenseTable`] or
//! [`PaymentTable`]); unknown tags are rejected there. Compiling yields a
//! [`QueryPlan`]: predicates that only reference named parameters, the
//! parameter values, and the ordering. [`ApplyQueryPlan`] renders a plan onto
//! a sea-orm select, which binds every parameter as a value.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDate;
use sea_orm::{
    Condition, Order, QueryFilter, QueryOrder, Value,
    sea_query::{Alias, Expr, LikeExpr, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine, ranges::parse_iso_date, util::search_key};

mod shapes;

pub use shapes::{
    ExpenseFilterOption, ExpenseSearchColumn, ExpenseSortColumn, ExpenseTable,
    PaymentFilterOption, PaymentSearchColumn, PaymentSortColumn, PaymentTable,
};

const LIKE_ESCAPE: char = '\\';

/// How a filter option interprets its two values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    DateRange,
    NumberRange,
    Text,
}

/// A physical `table.column` reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: &'static str,
    pub column: &'static str,
}

impl ColumnRef {
    fn expr(self) -> Expr {
        Expr::col((Alias::new(self.table), Alias::new(self.column)))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A closed set of client-facing column tags mapped to physical columns.
pub trait TableColumn: Copy + fmt::Debug + Eq + 'static {
    /// Tag used on the wire (e.g. `start_date`).
    fn tag(self) -> &'static str;
    fn column(self) -> ColumnRef;
    fn all() -> &'static [Self];

    /// Parses a wire tag, failing with a validation error on `field`.
    fn parse_tag(raw: &str, field: &str) -> ResultEngine<Self> {
        let raw = raw.trim();
        Self::all()
            .iter()
            .copied()
            .find(|column| column.tag() == raw)
            .ok_or_else(|| EngineError::validation(field, format!("unknown column: {raw}")))
    }
}

pub trait FilterOption: TableColumn {
    fn filter_type(self) -> FilterType;
}

/// Static description of a listable table.
pub trait TableShape {
    type Sort: TableColumn;
    type Filter: FilterOption;
    type Search: TableColumn;

    /// Column pinned by the visibility toggle and the value rows must have
    /// while the toggle is off.
    const TOGGLE_COLUMN: ColumnRef;
    const TOGGLE_VISIBLE_VALUE: bool;
    /// Secondary ordering that keeps equal sort keys stable.
    const TIE_BREAKER: ColumnRef;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EngineError::validation(
                "sort_direction",
                format!("expected asc or desc, got '{other}'"),
            )),
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// One filter as sent by a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilter {
    pub filter_option: String,
    pub value1: Option<String>,
    pub value2: Option<String>,
}

/// Table query as sent by a client, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTableQuery {
    pub sort_column: String,
    pub sort_direction: String,
    pub search_column: Option<String>,
    pub search_value: Option<String>,
    #[serde(default)]
    pub filters: Vec<RawFilter>,
    /// `show_inactive` for expenses, `show_skipped` for payments.
    #[serde(default, alias = "show_inactive", alias = "show_skipped")]
    pub show_hidden: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter<F> {
    pub option: F,
    pub value1: Option<String>,
    pub value2: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Search<C> {
    pub column: C,
    pub value: String,
}

/// Validated table query for the shape `T`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableQuery<T: TableShape> {
    pub sort_column: T::Sort,
    pub sort_direction: SortDirection,
    pub search: Option<Search<T::Search>>,
    pub filters: Vec<Filter<T::Filter>>,
    pub show_hidden: bool,
}

impl<T: TableShape> TableQuery<T> {
    pub fn new(sort_column: T::Sort, sort_direction: SortDirection) -> Self {
        Self {
            sort_column,
            sort_direction,
            search: None,
            filters: Vec::new(),
            show_hidden: false,
        }
    }

    pub fn with_filter(
        mut self,
        option: T::Filter,
        value1: Option<&str>,
        value2: Option<&str>,
    ) -> Self {
        self.filters.push(Filter {
            option,
            value1: value1.map(ToString::to_string),
            value2: value2.map(ToString::to_string),
        });
        self
    }

    pub fn with_search(mut self, column: T::Search, value: &str) -> Self {
        self.search = Some(Search {
            column,
            value: value.to_string(),
        });
        self
    }

    pub fn show_hidden(mut self, show: bool) -> Self {
        self.show_hidden = show;
        self
    }

    /// Validates raw client input. Unknown tags are errors, never ignored.
    pub fn parse(raw: &RawTableQuery) -> ResultEngine<Self> {
        let sort_column = T::Sort::parse_tag(&raw.sort_column, "sort_column")?;
        let sort_direction = if raw.sort_direction.trim().is_empty() {
            SortDirection::default()
        } else {
            raw.sort_direction.parse()?
        };

        let search_column = raw
            .search_column
            .as_deref()
            .filter(|column| !column.trim().is_empty())
            .map(|column| T::Search::parse_tag(column, "search_column"))
            .transpose()?;
        let search_value = raw
            .search_value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let search = match (search_column, search_value) {
            (Some(column), Some(value)) => Some(Search {
                column,
                value: value.to_string(),
            }),
            (None, Some(_)) => {
                return Err(EngineError::validation(
                    "search_column",
                    "search_value requires a search_column",
                ));
            }
            _ => None,
        };

        let filters = raw
            .filters
            .iter()
            .map(|filter| {
                Ok(Filter {
                    option: T::Filter::parse_tag(&filter.filter_option, "filter_option")?,
                    value1: filter.value1.clone(),
                    value2: filter.value2.clone(),
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Self {
            sort_column,
            sort_direction,
            search,
            filters,
            show_hidden: raw.show_hidden,
        })
    }

    /// Compiles the query into a parameterized [`QueryPlan`].
    pub fn compile(&self) -> ResultEngine<QueryPlan> {
        let mut plan = QueryPlan {
            predicates: Vec::new(),
            params: BTreeMap::new(),
            order_by: self.sort_column.column(),
            direction: self.sort_direction,
            tie_breaker: T::TIE_BREAKER,
        };

        for filter in &self.filters {
            let column = filter.option.column();
            let field = filter.option.tag();
            let value1 = non_blank(filter.value1.as_deref());
            let value2 = non_blank(filter.value2.as_deref());
            match filter.option.filter_type() {
                FilterType::DateRange => plan.push_range(column, field, value1, value2, |raw| {
                    parse_iso_date(raw, field).map(QueryParam::Date)
                })?,
                FilterType::NumberRange => plan.push_range(column, field, value1, value2, |raw| {
                    raw.parse::<MoneyCents>()
                        .map(QueryParam::Money)
                        .map_err(|_| EngineError::validation(field, format!("not a number: {raw}")))
                })?,
                FilterType::Text => {
                    let value = value1.ok_or_else(|| {
                        EngineError::validation(field, "text filter requires value1")
                    })?;
                    plan.push_contains(column, value);
                }
            }
        }

        if let Some(search) = &self.search {
            plan.push_contains(search.column.column(), &search.value);
        }

        if !self.show_hidden {
            let param = plan.bind(QueryParam::Flag(T::TOGGLE_VISIBLE_VALUE));
            plan.predicates.push(Predicate::Equals {
                column: T::TOGGLE_COLUMN,
                param,
            });
        }

        tracing::debug!(?plan, "compiled table query");
        Ok(plan)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A bound literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryParam {
    Date(NaiveDate),
    Money(MoneyCents),
    /// Already a folded `LIKE` pattern with wildcards escaped.
    Text(String),
    Flag(bool),
}

impl From<&QueryParam> for Value {
    fn from(param: &QueryParam) -> Self {
        match param {
            QueryParam::Date(date) => (*date).into(),
            QueryParam::Money(amount) => amount.cents().into(),
            QueryParam::Text(pattern) => pattern.clone().into(),
            QueryParam::Flag(flag) => (*flag).into(),
        }
    }
}

/// A predicate over one column. Operands are parameter names in
/// [`QueryPlan::params`], never literal values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Between {
        column: ColumnRef,
        low: String,
        high: String,
    },
    AtLeast {
        column: ColumnRef,
        param: String,
    },
    AtMost {
        column: ColumnRef,
        param: String,
    },
    /// Substring match of the folded value against a search key column.
    ContainsIgnoreCase {
        column: ColumnRef,
        param: String,
    },
    Equals {
        column: ColumnRef,
        param: String,
    },
}

/// Fully parameterized query descriptor. All predicates are AND-ed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    pub predicates: Vec<Predicate>,
    pub params: BTreeMap<String, QueryParam>,
    pub order_by: ColumnRef,
    pub direction: SortDirection,
    pub tie_breaker: ColumnRef,
}

impl QueryPlan {
    fn bind(&mut self, param: QueryParam) -> String {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), param);
        name
    }

    fn push_range<F>(
        &mut self,
        column: ColumnRef,
        field: &str,
        low: Option<&str>,
        high: Option<&str>,
        parse: F,
    ) -> ResultEngine<()>
    where
        F: Fn(&str) -> ResultEngine<QueryParam>,
    {
        let predicate = match (low, high) {
            (Some(low), Some(high)) => {
                let low = self.bind(parse(low)?);
                let high = self.bind(parse(high)?);
                Predicate::Between { column, low, high }
            }
            (Some(low), None) => Predicate::AtLeast {
                column,
                param: self.bind(parse(low)?),
            },
            (None, Some(high)) => Predicate::AtMost {
                column,
                param: self.bind(parse(high)?),
            },
            (None, None) => {
                return Err(EngineError::validation(
                    field,
                    "range filter requires value1 or value2",
                ));
            }
        };
        self.predicates.push(predicate);
        Ok(())
    }

    fn push_contains(&mut self, column: ColumnRef, value: &str) {
        let param = self.bind(QueryParam::Text(contains_pattern(value)));
        self.predicates
            .push(Predicate::ContainsIgnoreCase { column, param });
    }

    fn value(&self, name: &str) -> ResultEngine<Value> {
        self.params
            .get(name)
            .map(Value::from)
            .ok_or_else(|| EngineError::validation("query", format!("unbound parameter {name}")))
    }

    /// Renders the predicates as a sea-query condition with bound values.
    pub fn condition(&self) -> ResultEngine<Condition> {
        let mut condition = Condition::all();
        for predicate in &self.predicates {
            let expr: SimpleExpr = match predicate {
                Predicate::Between { column, low, high } => {
                    column.expr().between(self.value(low)?, self.value(high)?)
                }
                Predicate::AtLeast { column, param } => column.expr().gte(self.value(param)?),
                Predicate::AtMost { column, param } => column.expr().lte(self.value(param)?),
                Predicate::ContainsIgnoreCase { column, param } => {
                    let Some(QueryParam::Text(pattern)) = self.params.get(param) else {
                        return Err(EngineError::validation(
                            "query",
                            format!("parameter {param} is not a text pattern"),
                        ));
                    };
                    column
                        .expr()
                        .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
                }
                Predicate::Equals { column, param } => column.expr().eq(self.value(param)?),
            };
            condition = condition.add(expr);
        }
        Ok(condition)
    }
}

impl QueryPlan {
    /// Adds the condition and the ordering to `select`.
    pub fn apply<S>(&self, select: S) -> ResultEngine<S>
    where
        S: QueryFilter + QueryOrder,
    {
        let order: Order = self.direction.into();
        Ok(select
            .filter(self.condition()?)
            .order_by(SimpleExpr::from(self.order_by.expr()), order)
            .order_by(SimpleExpr::from(self.tie_breaker.expr()), Order::Asc))
    }
}

/// `%value%` folded like the stored search keys, with `LIKE` wildcards in
/// the value escaped.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in search_key(value).chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Applies a [`QueryPlan`] to any sea-orm select.
pub trait ApplyQueryPlan: QueryFilter + QueryOrder + Sized {
    fn apply_plan(self, plan: &QueryPlan) -> ResultEngine<Self>;
}

impl<T> ApplyQueryPlan for T
where
    T: QueryFilter + QueryOrder + Sized,
{
    fn apply_plan(self, plan: &QueryPlan) -> ResultEngine<Self> {
        plan.apply(self)
    }
}
