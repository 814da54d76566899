use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{
    compare::{
        runner::{run_comparison, RunReport},
        templates::{build, QueryInputs, RequestKind},
        view::render_page,
    },
    state::AppState,
};

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/run", post(run))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/last-run", get(last_run))
        .route("/api/templates", get(templates))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunForm {
    pub kind: String,
    pub count: Option<i64>,
    pub min_relations: Option<i64>,
    pub min_purchases: Option<i64>,
}

impl RunForm {
    fn inputs(&self) -> QueryInputs {
        let defaults = QueryInputs::default();
        QueryInputs {
            count: self.count.unwrap_or(defaults.count),
            min_relations: self.min_relations.unwrap_or(defaults.min_relations),
            min_purchases: self.min_purchases.unwrap_or(defaults.min_purchases),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub label: &'static str,
    pub inputs: Vec<&'static str>,
    pub sql: &'static str,
    pub cypher: &'static str,
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, (StatusCode, String)> {
    let last = state.last_run.lock().await;
    let previous = last.as_ref().map(|r| (r.kind, r.inputs));
    let (selected, inputs) = match q.kind {
        Some(label) => {
            let kind = label.parse::<RequestKind>()?;
            let inputs = previous.map(|(_, i)| i).unwrap_or_default();
            (kind, inputs)
        }
        None => previous.unwrap_or((RequestKind::Follows, QueryInputs::default())),
    };
    Ok(Html(render_page(
        selected,
        &inputs,
        last.as_ref(),
        state.config.display_rows,
    )))
}

/// Runs both queries and stores the report. A failed run leaves no result.
#[instrument(skip(state))]
pub async fn run(
    State(state): State<AppState>,
    Form(form): Form<RunForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let kind = form.kind.parse::<RequestKind>()?;
    let inputs = form.inputs();
    inputs.validate(kind)?;
    let pair = build(kind, &inputs);

    let mut last = state.last_run.lock().await;
    *last = None;
    match run_comparison(state.sql.as_ref(), state.graph.as_ref(), &pair, inputs).await {
        Ok(report) => {
            info!(%kind, winner = %report.verdict.winner, "run stored");
            *last = Some(report);
            Ok(Redirect::to("/"))
        }
        Err(e) => {
            error!(error = %e, %kind, "comparison failed");
            Err(e.into())
        }
    }
}

#[instrument(skip(state))]
pub async fn last_run(
    State(state): State<AppState>,
) -> Result<Json<RunReport>, (StatusCode, String)> {
    state
        .last_run
        .lock()
        .await
        .clone()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "No results to display".into()))
}

pub async fn templates() -> Json<Vec<TemplateInfo>> {
    let defaults = QueryInputs::default();
    let items = RequestKind::ALL
        .into_iter()
        .map(|kind| {
            let pair = build(kind, &defaults);
            TemplateInfo {
                label: kind.label(),
                inputs: kind.inputs().iter().map(|i| i.field()).collect(),
                sql: pair.sql.text,
                cypher: pair.graph.text,
            }
        })
        .collect();
    Json(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use crate::db::{GraphExecutor, GraphQuery, SqlExecutor, SqlQuery};
    use crate::error::DbError;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response},
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn body_text(res: Response<Body>) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_run(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/run")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn empty_page_and_health() {
        let app = build_app(AppState::fake());

        let res = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "ok");

        let res = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("No results to display"));

        let res = app.oneshot(get("/api/last-run")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_stores_report_and_redirects() {
        let app = build_app(AppState::fake());

        let res = app
            .clone()
            .oneshot(post_run("kind=Relation&count=5&min_relations=2"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");

        let res = app.clone().oneshot(get("/api/last-run")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let report: Value = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!(report["kind"], "Relation");
        assert_eq!(report["sql"]["rows"][0]["params"], serde_json::json!([2, 5]));
        assert!(report["verdict"]["winner"] == "SQL" || report["verdict"]["winner"] == "NoSQL");

        let res = app.oneshot(get("/")).await.unwrap();
        let html = body_text(res).await;
        assert!(html.contains("wins by"));
        assert!(html.contains("<option value=\"Relation\" selected>"));
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_before_running() {
        let app = build_app(AppState::fake());

        let res = app.clone().oneshot(post_run("kind=Orders&count=5")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(res).await.contains("Orders"));

        let res = app.clone().oneshot(get("/?kind=Orders")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app.oneshot(get("/api/last-run")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn out_of_range_input_is_rejected() {
        let app = build_app(AppState::fake());
        let res = app.oneshot(post_run("kind=Users&count=0")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(res).await.contains("count"));
    }

    #[tokio::test]
    async fn failed_run_clears_previous_result() {
        struct BrokenSql;
        #[async_trait]
        impl SqlExecutor for BrokenSql {
            async fn fetch_rows(&self, _q: &SqlQuery) -> Result<Vec<Value>, DbError> {
                Err(DbError::Sql(sqlx::Error::PoolClosed))
            }
        }

        let healthy = AppState::fake();
        let graph: Arc<dyn GraphExecutor> = healthy.graph.clone();
        let state = AppState::from_parts(healthy.config.clone(), Arc::new(BrokenSql), graph);
        let app = build_app(state.clone());

        // Seed a previous result through the healthy state's executors.
        let previous = build_app(AppState {
            last_run: state.last_run.clone(),
            ..healthy
        });
        let res = previous.oneshot(post_run("kind=Users&count=3")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert!(state.last_run.lock().await.is_some());

        let res = app.clone().oneshot(post_run("kind=Users&count=3")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(res).await.starts_with("sql:"));
        assert!(state.last_run.lock().await.is_none());
    }

    #[tokio::test]
    async fn graph_failure_stores_nothing() {
        struct BrokenGraph;
        #[async_trait]
        impl GraphExecutor for BrokenGraph {
            async fn fetch_rows(&self, _q: &GraphQuery) -> Result<Vec<Value>, DbError> {
                Err(DbError::GraphRow {
                    column: "id".into(),
                    message: "connection reset".into(),
                })
            }
        }

        let healthy = AppState::fake();
        let state = AppState::from_parts(
            healthy.config.clone(),
            healthy.sql.clone(),
            Arc::new(BrokenGraph),
        );
        let app = build_app(state.clone());

        let res = app.oneshot(post_run("kind=Users&count=3")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(res).await.starts_with("graph row column"));
        assert!(state.last_run.lock().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_runs_are_serialized() {
        #[derive(Default)]
        struct SlowSql {
            active: AtomicUsize,
            peak: AtomicUsize,
        }
        #[async_trait]
        impl SqlExecutor for SlowSql {
            async fn fetch_rows(&self, q: &SqlQuery) -> Result<Vec<Value>, DbError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![serde_json::json!({ "params": q.params })])
            }
        }

        let slow = Arc::new(SlowSql::default());
        let healthy = AppState::fake();
        let state =
            AppState::from_parts(healthy.config.clone(), slow.clone(), healthy.graph.clone());
        let app = build_app(state);

        let (first, second) = tokio::join!(
            app.clone().oneshot(post_run("kind=Users&count=3")),
            app.clone().oneshot(post_run("kind=Products&count=4")),
        );
        assert_eq!(first.unwrap().status(), StatusCode::SEE_OTHER);
        assert_eq!(second.unwrap().status(), StatusCode::SEE_OTHER);
        assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn templates_list_every_kind() {
        let app = build_app(AppState::fake());
        let res = app.oneshot(get("/api/templates")).await.unwrap();
        let items: Value = serde_json::from_str(&body_text(res).await).unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items.len(), RequestKind::ALL.len());
        assert_eq!(items[5]["label"], "Activity");
        assert_eq!(
            items[5]["inputs"],
            serde_json::json!(["count", "min_relations", "min_purchases"])
        );
    }
}
