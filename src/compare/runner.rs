use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::compare::templates::{QueryInputs, QueryPair, RequestKind};
use crate::db::{GraphExecutor, SqlExecutor};
use crate::error::{DbError, Store};

/// Outcome of comparing two timings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub winner: Store,
    pub loser: Store,
    /// `|t_sql - t_graph|` in seconds.
    pub delta_secs: f64,
    /// `winner / loser * 100 - 100`, never positive.
    pub percent: f64,
    /// `loser / winner * 100 - 100`; `None` when the winner took no
    /// measurable time.
    pub slower_percent: Option<f64>,
}

/// The faster store wins; a tie goes to the graph store.
pub fn compare(sql_secs: f64, graph_secs: f64) -> Verdict {
    let (winner, loser, winner_secs, loser_secs) = if sql_secs < graph_secs {
        (Store::Sql, Store::Graph, sql_secs, graph_secs)
    } else {
        (Store::Graph, Store::Sql, graph_secs, sql_secs)
    };
    let percent = if loser_secs > 0.0 {
        winner_secs / loser_secs * 100.0 - 100.0
    } else {
        0.0
    };
    let slower_percent = if winner_secs > 0.0 {
        Some(loser_secs / winner_secs * 100.0 - 100.0)
    } else if loser_secs == 0.0 {
        Some(0.0)
    } else {
        None
    };
    Verdict {
        winner,
        loser,
        delta_secs: (sql_secs - graph_secs).abs(),
        percent,
        slower_percent,
    }
}

/// One side of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StoreRun {
    pub query: &'static str,
    pub elapsed_secs: f64,
    pub rows: Vec<Value>,
}

/// Everything the result panel shows, kept until the next run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RequestKind,
    pub inputs: QueryInputs,
    pub sql: StoreRun,
    pub graph: StoreRun,
    pub verdict: Verdict,
    #[serde(with = "time::serde::rfc3339")]
    pub ran_at: OffsetDateTime,
}

/// Runs the SQL query, then the graph query, timing each call on its own.
/// The first error is returned as is.
#[instrument(skip_all, fields(kind = %pair.kind))]
pub async fn run_comparison(
    sql: &dyn SqlExecutor,
    graph: &dyn GraphExecutor,
    pair: &QueryPair,
    inputs: QueryInputs,
) -> Result<RunReport, DbError> {
    pair.validate()?;

    let started = Instant::now();
    let sql_rows = sql.fetch_rows(&pair.sql).await?;
    let sql_secs = started.elapsed().as_secs_f64();

    let started = Instant::now();
    let graph_rows = graph.fetch_rows(&pair.graph).await?;
    let graph_secs = started.elapsed().as_secs_f64();

    let verdict = compare(sql_secs, graph_secs);
    info!(
        sql_secs,
        graph_secs,
        sql_rows = sql_rows.len(),
        graph_rows = graph_rows.len(),
        winner = %verdict.winner,
        "comparison done"
    );

    Ok(RunReport {
        kind: pair.kind,
        inputs,
        sql: StoreRun {
            query: pair.sql.text,
            elapsed_secs: sql_secs,
            rows: sql_rows,
        },
        graph: StoreRun {
            query: pair.graph.text,
            elapsed_secs: graph_secs,
            rows: graph_rows,
        },
        verdict,
        ran_at: OffsetDateTime::now_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::templates::build;
    use crate::db::{GraphQuery, SqlQuery};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const EPS: f64 = 1e-9;

    #[test]
    fn faster_store_wins() {
        let v = compare(0.5, 2.0);
        assert_eq!(v.winner, Store::Sql);
        assert_eq!(v.loser, Store::Graph);
        assert!((v.delta_secs - 1.5).abs() < EPS);
        assert!((v.percent - (0.5 / 2.0 * 100.0 - 100.0)).abs() < EPS);
        assert!((v.slower_percent.unwrap() - 300.0).abs() < EPS);

        let v = compare(3.0, 1.0);
        assert_eq!(v.winner, Store::Graph);
        assert!((v.delta_secs - 2.0).abs() < EPS);
        assert!((v.percent - (1.0 / 3.0 * 100.0 - 100.0)).abs() < EPS);
        assert!((v.slower_percent.unwrap() - 200.0).abs() < EPS);
    }

    #[test]
    fn percent_formula_holds_across_values() {
        let samples = [(0.001, 0.002), (0.25, 0.2), (1.0, 1.0001), (7.5, 0.03)];
        for (t_sql, t_graph) in samples {
            let v = compare(t_sql, t_graph);
            let (w, l) = if t_sql < t_graph {
                (t_sql, t_graph)
            } else {
                (t_graph, t_sql)
            };
            assert_eq!(v.winner == Store::Sql, t_sql < t_graph);
            assert!((v.percent - (w / l * 100.0 - 100.0)).abs() < EPS);
            assert!(v.percent <= 0.0);
        }
    }

    #[test]
    fn tie_goes_to_graph_store() {
        let v = compare(1.0, 1.0);
        assert_eq!(v.winner, Store::Graph);
        assert_eq!(v.delta_secs, 0.0);
        assert_eq!(v.percent, 0.0);
        assert_eq!(v.slower_percent, Some(0.0));
    }

    #[test]
    fn zero_timings_do_not_divide_by_zero() {
        let v = compare(0.0, 0.0);
        assert_eq!(v.percent, 0.0);
        assert_eq!(v.slower_percent, Some(0.0));

        let v = compare(0.0, 0.5);
        assert_eq!(v.winner, Store::Sql);
        assert_eq!(v.percent, -100.0);
        assert_eq!(v.slower_percent, None);
    }

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct FakeSql {
        log: Log,
        fail: bool,
    }

    #[async_trait]
    impl SqlExecutor for FakeSql {
        async fn fetch_rows(&self, query: &SqlQuery) -> Result<Vec<Value>, DbError> {
            self.log.lock().unwrap().push("sql");
            if self.fail {
                return Err(DbError::Sql(sqlx::Error::PoolTimedOut));
            }
            Ok(vec![json!({ "limit": query.params[0] })])
        }
    }

    struct FakeGraph {
        log: Log,
    }

    #[async_trait]
    impl GraphExecutor for FakeGraph {
        async fn fetch_rows(&self, query: &GraphQuery) -> Result<Vec<Value>, DbError> {
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push("graph");
            Ok(vec![json!({ "columns": query.columns.len() }); 2])
        }
    }

    struct FailingGraph {
        log: Log,
    }

    #[async_trait]
    impl GraphExecutor for FailingGraph {
        async fn fetch_rows(&self, _query: &GraphQuery) -> Result<Vec<Value>, DbError> {
            self.log.lock().unwrap().push("graph");
            Err(DbError::GraphRow {
                column: "id".into(),
                message: "connection reset".into(),
            })
        }
    }

    #[tokio::test]
    async fn runs_sql_then_graph() {
        let log: Log = Arc::default();
        let sql = FakeSql {
            log: log.clone(),
            fail: false,
        };
        let graph = FakeGraph { log: log.clone() };
        let inputs = QueryInputs {
            count: 5,
            ..QueryInputs::default()
        };
        let pair = build(RequestKind::Follows, &inputs);

        let report = run_comparison(&sql, &graph, &pair, inputs)
            .await
            .expect("report");

        assert_eq!(*log.lock().unwrap(), vec!["sql", "graph"]);
        assert_eq!(report.kind, RequestKind::Follows);
        assert_eq!(report.sql.rows, vec![json!({ "limit": 5 })]);
        assert_eq!(report.graph.rows.len(), 2);
        assert!(report.sql.elapsed_secs >= 0.0);
        assert_eq!(
            report.verdict.winner == Store::Sql,
            report.sql.elapsed_secs < report.graph.elapsed_secs
        );
    }

    #[tokio::test]
    async fn sql_failure_skips_graph_query() {
        let log: Log = Arc::default();
        let sql = FakeSql {
            log: log.clone(),
            fail: true,
        };
        let graph = FakeGraph { log: log.clone() };
        let pair = build(RequestKind::Users, &QueryInputs::default());

        let err = run_comparison(&sql, &graph, &pair, QueryInputs::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Sql(_)));
        assert_eq!(*log.lock().unwrap(), vec!["sql"]);
    }

    #[tokio::test]
    async fn graph_failure_yields_no_report() {
        let log: Log = Arc::default();
        let sql = FakeSql {
            log: log.clone(),
            fail: false,
        };
        let graph = FailingGraph { log: log.clone() };
        let pair = build(RequestKind::Users, &QueryInputs::default());

        let err = run_comparison(&sql, &graph, &pair, QueryInputs::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::GraphRow { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["sql", "graph"]);
    }

    #[tokio::test]
    async fn invalid_pair_runs_nothing() {
        let log: Log = Arc::default();
        let sql = FakeSql {
            log: log.clone(),
            fail: false,
        };
        let graph = FakeGraph { log: log.clone() };
        let mut pair = build(RequestKind::Products, &QueryInputs::default());
        pair.sql.params.clear();

        assert!(run_comparison(&sql, &graph, &pair, QueryInputs::default())
            .await
            .is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
