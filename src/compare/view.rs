use serde_json::Value;

use crate::compare::runner::{RunReport, StoreRun};
use crate::compare::templates::{QueryInputs, RequestKind};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; min-height: 100vh; }
aside { width: 280px; padding: 1.5rem; background: #f0f2f6; }
main { flex: 1; padding: 1.5rem 2rem; overflow-x: auto; }
label { display: block; margin-top: 1rem; font-size: 0.9rem; }
select, input { width: 100%; padding: 0.4rem; margin-top: 0.3rem; box-sizing: border-box; }
button { margin-top: 1.5rem; width: 100%; padding: 0.6rem; }
hr { margin: 1.2rem 0; }
.columns { display: flex; gap: 2rem; }
.columns section { flex: 1; min-width: 0; }
pre { background: #f6f8fa; padding: 1rem; overflow: auto; max-height: 70vh; }
.banner { font-size: 1.3rem; font-weight: 600; }
"#;

/// Escapes text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn sidebar(selected: RequestKind, inputs: &QueryInputs) -> String {
    let mut html = String::from(
        "<aside><form method=\"post\" action=\"/run\">\
         <label for=\"kind\">Select type of request</label>\
         <select id=\"kind\" name=\"kind\" \
         onchange=\"window.location='/?kind='+encodeURIComponent(this.value)\">",
    );
    for kind in RequestKind::ALL {
        html.push_str(&format!(
            "<option value=\"{label}\"{selected}>{label}</option>",
            label = kind.label(),
            selected = if kind == selected { " selected" } else { "" },
        ));
    }
    html.push_str("</select><hr>");
    html.push_str(&format!(
        "<p>{} request parameters:</p>",
        escape(selected.label())
    ));
    for input in selected.inputs() {
        let (min, max) = input.bounds();
        html.push_str(&format!(
            "<label>{label}<input type=\"number\" name=\"{field}\" min=\"{min}\" max=\"{max}\" \
             value=\"{value}\" required></label>",
            label = escape(input.label()),
            field = input.field(),
            value = inputs.value(*input),
        ));
    }
    html.push_str("<button type=\"submit\">Run request</button></form></aside>");
    html
}

fn rows_json(rows: &[Value], limit: usize) -> String {
    let shown = &rows[..rows.len().min(limit)];
    serde_json::to_string_pretty(shown).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

fn store_column(title: &str, run: &StoreRun, display_rows: usize) -> String {
    let count = if run.rows.len() > display_rows {
        format!("{} rows, first {display_rows} shown", run.rows.len())
    } else {
        format!("{} rows", run.rows.len())
    };
    format!(
        "<section><h2>{title}</h2>\
         <p>Time taken: {secs} seconds</p>\
         <p>Query: <code>{query}</code></p>\
         <p>Result content ({count}):</p>\
         <pre>{rows}</pre></section>",
        title = escape(title),
        secs = run.elapsed_secs,
        query = escape(run.query),
        rows = escape(&rows_json(&run.rows, display_rows)),
    )
}

fn results(report: &RunReport, display_rows: usize) -> String {
    let v = &report.verdict;
    let slower = match v.slower_percent {
        Some(slower) => format!("<p>{} is {slower:.3}% slower.</p>", v.loser),
        None => format!("<p>{} finished in no measurable time.</p>", v.winner),
    };
    format!(
        "<h1>Results:</h1>\
         <p class=\"banner\">{winner} wins by {delta:.4} seconds !</p>\
         <p>{winner} took {less:.3}% less time than {loser}.</p>\
         {slower}\
         <p><small>{kind} request, run at {ran_at}</small></p>\
         <details open><summary>Show results</summary><div class=\"columns\">\
         {sql}{graph}</div></details>",
        winner = v.winner,
        loser = v.loser,
        delta = v.delta_secs,
        less = -v.percent,
        kind = escape(report.kind.label()),
        ran_at = report.ran_at,
        sql = store_column("SQL results", &report.sql, display_rows),
        graph = store_column("NoSQL results", &report.graph, display_rows),
    )
}

/// The whole page: sidebar form plus the last run, if any.
pub fn render_page(
    selected: RequestKind,
    inputs: &QueryInputs,
    last: Option<&RunReport>,
    display_rows: usize,
) -> String {
    let body = match last {
        Some(report) => results(report, display_rows),
        None => "<p>No results to display</p>".to_string(),
    };
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>SQLvsNOSQL</title><style>{STYLE}</style></head>\
         <body>{}<main>{body}</main></body></html>",
        sidebar(selected, inputs)
    )
}
