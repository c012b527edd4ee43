use std::collections::HashMap;

use crate::server::api::{self, ApiContext, ApiError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(body: String) -> Self {
        Self {
            status_code: 200,
            content_type: "application/json",
            body,
        }
    }
}

/// Dispatch one API request. `path` may still carry a query string; only the
/// part before `?` is matched.
pub fn route_request(
    ctx: &ApiContext,
    method: &str,
    path: &str,
    query: &HashMap<String, String>,
    body: &str,
) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => error_response(500, &err.to_string()),
        },
        ("GET", "/api/records") => match api::records_payload(ctx) {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => error_response(500, &err.to_string()),
        },
        ("GET", "/api/options") => match api::options_payload(ctx, query) {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => error_response(500, &err.to_string()),
        },
        ("POST", "/api/simulate") => match api::simulate_payload(ctx, body) {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => api_error_response(&err),
        },
        ("GET", "/api/report") => match api::report_payload(ctx, query) {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => api_error_response(&err),
        },
        _ => error_response(404, "Route not found"),
    }
}

fn api_error_response(err: &ApiError) -> HttpResponse {
    match err {
        ApiError::Parse(_) | ApiError::Validation(_) => error_response(400, &err.to_string()),
        ApiError::Serialize(_) => error_response(500, &err.to_string()),
    }
}

pub fn error_response(status_code: u16, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}

pub fn index_html() -> &'static str {
    r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Funnel Simulator API</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 900px; margin: 24px auto; padding: 0 12px; }
    label { display:block; margin: 8px 0 4px; font-weight: 600; }
    input, select { width: 100%; padding: 8px; box-sizing: border-box; }
    button { margin-top: 12px; padding: 8px 14px; }
    pre { background: #111; color: #aef2ae; padding: 12px; overflow: auto; border-radius: 6px; min-height: 180px; }
  </style>
</head>
<body>
  <h1>Funnel Simulator</h1>
  <label for="mode">Mode</label>
  <select id="mode"><option>top-down</option><option>bottom-up</option></select>
  <label for="value">Starting candidates / target hires</label>
  <input id="value" type="number" min="0" value="100" />
  <div>
    <button id="options-btn">GET /api/options</button>
    <button id="simulate-btn">POST /api/simulate</button>
    <button id="report-btn">GET /api/report</button>
  </div>
  <pre id="output">Ready.</pre>
  <script>
    const output = document.getElementById('output');
    const mode = () => document.getElementById('mode').value;
    const value = () => Number(document.getElementById('value').value) || 0;
    async function request(path, options) {
      output.textContent = 'Loading…';
      const response = await fetch(path, options);
      output.textContent = 'HTTP ' + response.status + '\n' + await response.text();
    }
    document.getElementById('options-btn').addEventListener('click', () => request('/api/options'));
    document.getElementById('simulate-btn').addEventListener('click', () => request('/api/simulate', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ mode: mode(), value: value() }),
    }));
    document.getElementById('report-btn').addEventListener('click', () =>
      request('/api/report?mode=' + encodeURIComponent(mode()) + '&value=' + value()));
  </script>
</body>
</html>
"#
}
