use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use super::ast::{Expr, FromResource, FromSource, SelectStatement};
use super::eval::{self, EvalContext};
use super::joiner::{InnerJoin, ListIter, Tuple, TupleIter};
use super::parser::Parser;

/// Identifies a resource collection in the cluster API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl From<&FromResource> for Gvk {
    fn from(resource: &FromResource) -> Self {
        Gvk {
            group: resource.group.clone(),
            version: resource.version.clone(),
            kind: resource.kind.clone(),
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Lists the items of one resource collection as JSON-like values.
/// Implemented by the Kubernetes client; tests use in-memory fakes.
pub trait ResourceLister {
    async fn list(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Vec<Value>>;
}

/// Per-query state: the lister and the fetched resource lists, keyed by
/// GVK. One session spans a top-level query and all its subqueries, so
/// every GVK is listed at most once per query.
pub struct Session<'a, L> {
    lister: &'a L,
    resources: HashMap<Gvk, Arc<Vec<Value>>>,
}

impl<'a, L: ResourceLister> Session<'a, L> {
    pub fn new(lister: &'a L) -> Self {
        Session {
            lister,
            resources: HashMap::new(),
        }
    }

    /// Fetch every resource list the statement can reach — its own FROM
    /// clause plus those of FROM subselects and of subqueries in
    /// expression position. Lists missing from the cache are fetched
    /// concurrently; afterwards execution is fully synchronous.
    pub async fn prefetch(
        &mut self,
        statement: &SelectStatement,
        default_namespace: Option<&str>,
    ) -> Result<()> {
        let mut sources = Vec::new();
        collect_sources(statement, default_namespace, &mut sources);

        let mut pending: Vec<(Gvk, Option<String>)> = Vec::new();
        for (gvk, namespace) in sources {
            if self.resources.contains_key(&gvk) || pending.iter().any(|(g, _)| *g == gvk) {
                debug!(%gvk, "resource list already cached");
                continue;
            }
            pending.push((gvk, namespace));
        }

        let lister = self.lister;
        let fetches = pending.iter().map(|(gvk, namespace)| async move {
            let items = lister
                .list(gvk, namespace.as_deref())
                .await
                .with_context(|| format!("listing {gvk}"))?;
            Ok::<_, anyhow::Error>((gvk.clone(), items))
        });

        for fetched in join_all(fetches).await {
            let (gvk, items) = fetched?;
            debug!(%gvk, items = items.len(), "cached resource list");
            self.resources.insert(gvk, Arc::new(items));
        }

        Ok(())
    }

    fn cached(&self, gvk: &Gvk) -> Result<Arc<Vec<Value>>> {
        self.resources
            .get(gvk)
            .cloned()
            .ok_or_else(|| anyhow!("no resource list for {gvk}"))
    }
}

/// Result table of a query: header names and rows of cell values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<Value>,
}

/// Parse and run one top-level query.
pub async fn execute_query<L: ResourceLister>(
    lister: &L,
    query: &str,
    default_namespace: Option<&str>,
) -> Result<Results> {
    let statement = Parser::new(query).parse()?;

    let mut session = Session::new(lister);
    session.prefetch(&statement, default_namespace).await?;

    execute_select(&session, &statement, None)
}

/// Run a statement against prefetched resource lists. `correlated`
/// carries the outer tuple when this is a subquery; the statement's own
/// FROM aliases shadow correlated entries of the same name.
pub fn execute_select<L: ResourceLister>(
    session: &Session<'_, L>,
    statement: &SelectStatement,
    correlated: Option<&Tuple>,
) -> Result<Results> {
    let headers: Vec<String> = statement
        .select
        .expressions
        .iter()
        .map(|e| e.alias.clone().unwrap_or_else(|| "?column?".to_string()))
        .collect();

    let mut children = Vec::new();
    for source in &statement.from.sources {
        let items = match source {
            FromSource::Resource(resource) => session.cached(&Gvk::from(resource))?,
            FromSource::Subselect(sub) => {
                // a derived source runs once, each row becoming one item
                let Results {
                    headers: sub_headers,
                    rows: sub_rows,
                } = execute_select(session, &sub.select, correlated)?;
                let items: Vec<Value> = sub_rows
                    .into_iter()
                    .map(|row| {
                        let map: serde_json::Map<String, Value> =
                            sub_headers.iter().cloned().zip(row.columns).collect();
                        Value::Object(map)
                    })
                    .collect();
                Arc::new(items)
            }
        };
        children.push(ListIter::new(source.alias(), items));
    }

    let subquery = |select: &SelectStatement, tuple: &Tuple| -> Result<Value> {
        let results = execute_select(session, select, Some(tuple))?;
        if results.rows.len() > 1 {
            bail!("more than one row returned by a subquery used as an expression");
        }
        let Some(row) = results.rows.into_iter().next() else {
            return Ok(Value::Null);
        };
        if row.columns.len() > 1 {
            bail!("subquery must return only one column");
        }
        Ok(row.columns.into_iter().next().unwrap_or(Value::Null))
    };
    let ctx = EvalContext {
        subquery: &subquery,
    };

    let mut rows = Vec::new();
    let mut join = InnerJoin::new(children);
    while join.has_next() {
        let mut item = join.next_tuple();
        if let Some(outer) = correlated {
            item.merge_under(outer);
        }

        if let Some(where_clause) = &statement.where_clause {
            if eval::eval_is_empty(&where_clause.condition, &ctx, &item)? {
                continue;
            }
        }

        let mut columns = Vec::with_capacity(statement.select.expressions.len());
        for expression in &statement.select.expressions {
            columns.push(eval::eval(&expression.condition, &ctx, &item)?);
        }
        rows.push(Row { columns });
    }

    Ok(Results { headers, rows })
}

fn collect_sources(
    statement: &SelectStatement,
    default_namespace: Option<&str>,
    out: &mut Vec<(Gvk, Option<String>)>,
) {
    let namespace = statement.from.namespace.as_deref().or(default_namespace);

    for source in &statement.from.sources {
        match source {
            FromSource::Resource(resource) => {
                out.push((Gvk::from(resource), namespace.map(String::from)))
            }
            FromSource::Subselect(sub) => collect_sources(&sub.select, default_namespace, out),
        }
    }

    statement.walk_exprs(&mut |expr| {
        if let Expr::Subselect(select) = expr {
            collect_sources(select, default_namespace, out);
            return false;
        }
        true
    });
}
