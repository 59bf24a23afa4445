mod export;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::core::{
    Inputs, Projection, SchedulePoint, SipError, SipResult, Summary, run_projection,
};

pub use export::{SCHEDULE_CSV_FILENAME, ScheduleColumns, format_amount, schedule_csv};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 5_000.0;
const DEFAULT_ANNUAL_RATE: f64 = 12.0;
const DEFAULT_DURATION_YEARS: u32 = 10;
const DEFAULT_INFLATION_RATE: f64 = 6.0;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

#[derive(Debug, Clone, Args)]
pub struct CalculateArgs {
    #[arg(
        long,
        default_value_t = DEFAULT_MONTHLY_CONTRIBUTION,
        help = "Amount invested at the start of every month"
    )]
    pub monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_RATE,
        help = "Expected annual return in percent, e.g. 12"
    )]
    pub annual_rate: f64,
    #[arg(long, default_value_t = DEFAULT_DURATION_YEARS)]
    pub duration_years: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_INFLATION_RATE,
        help = "Annual inflation rate in percent"
    )]
    pub inflation_rate: f64,
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,
    #[arg(long, help = "Add year and estimated-returns columns to CSV output")]
    pub breakdown: bool,
}

impl Default for CalculateArgs {
    fn default() -> Self {
        CalculateArgs {
            monthly_contribution: DEFAULT_MONTHLY_CONTRIBUTION,
            annual_rate: DEFAULT_ANNUAL_RATE,
            duration_years: DEFAULT_DURATION_YEARS,
            inflation_rate: DEFAULT_INFLATION_RATE,
            format: OutputFormat::Summary,
            breakdown: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CalculatePayload {
    monthly_contribution: Option<f64>,
    annual_rate: Option<f64>,
    duration_years: Option<u32>,
    inflation_rate: Option<f64>,
    breakdown: Option<bool>,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: Inputs,
    columns: ScheduleColumns,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateResponse {
    inputs: Inputs,
    summary: Summary,
    months: usize,
    schedule: Vec<ScheduleRow>,
}

/// Schedule point with the breakdown columns filled in, so the page renders
/// exactly what the CSV export writes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRow {
    month: u32,
    year: u32,
    cumulative_invested: f64,
    estimated_returns: f64,
    future_value: f64,
}

impl From<&SchedulePoint> for ScheduleRow {
    fn from(point: &SchedulePoint) -> Self {
        ScheduleRow {
            month: point.month,
            year: point.year(),
            cumulative_invested: point.cumulative_invested,
            estimated_returns: point.estimated_returns(),
            future_value: point.future_value,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_inputs(args: &CalculateArgs) -> SipResult<Inputs> {
    let inputs = Inputs {
        monthly_contribution: args.monthly_contribution,
        annual_rate_pct: args.annual_rate,
        duration_years: args.duration_years,
        inflation_rate_pct: args.inflation_rate,
    };
    inputs.validate()?;
    Ok(inputs)
}

/// Runs one projection for the command line and renders it in the requested
/// format.
pub fn run_calculate(args: &CalculateArgs) -> SipResult<String> {
    let inputs = build_inputs(args)?;
    let projection = run_projection(&inputs);
    tracing::debug!(
        months = projection.schedule.len(),
        future_value = projection.summary.future_value,
        "projection computed"
    );

    match args.format {
        OutputFormat::Summary => Ok(render_summary(&projection.summary)),
        OutputFormat::Json => {
            let response = build_calculate_response(inputs, projection);
            Ok(format!("{}\n", serde_json::to_string_pretty(&response)?))
        }
        OutputFormat::Csv => schedule_csv(
            &projection.schedule,
            ScheduleColumns::from_breakdown(args.breakdown),
        ),
    }
}

fn render_summary(summary: &Summary) -> String {
    format!(
        "Total invested:                     {}\n\
         Future value (nominal):             {}\n\
         Future value (inflation adjusted):  {}\n\
         Lumpsum value (invested upfront):   {}\n",
        format_amount(summary.total_invested),
        format_amount(summary.future_value),
        format_amount(summary.future_value_inflation_adjusted),
        format_amount(summary.lumpsum_equivalent),
    )
}

pub fn build_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .route("/api/schedule.csv", get(schedule_csv_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "SIP calculator listening");
    tracing::info!("Local access: http://127.0.0.1:{}/", addr.port());

    axum::serve(listener, build_router()).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(
    payload: Result<Query<CalculatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => calculate_handler_impl(payload),
        Err(rejection) => sip_error_response(&unreadable_request("query", rejection.body_text())),
    }
}

async fn calculate_post_handler(
    payload: Result<Json<CalculatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => calculate_handler_impl(payload),
        Err(rejection) => sip_error_response(&unreadable_request("body", rejection.body_text())),
    }
}

fn calculate_handler_impl(payload: CalculatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return sip_error_response(&e),
    };

    let projection = run_projection(&request.inputs);
    tracing::info!(
        months = projection.schedule.len(),
        future_value = projection.summary.future_value,
        "projection computed"
    );

    json_response(
        StatusCode::OK,
        build_calculate_response(request.inputs, projection),
    )
}

async fn schedule_csv_handler(
    payload: Result<Query<CalculatePayload>, QueryRejection>,
) -> Response {
    let payload = match payload {
        Ok(Query(payload)) => payload,
        Err(rejection) => {
            return sip_error_response(&unreadable_request("query", rejection.body_text()));
        }
    };
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return sip_error_response(&e),
    };

    let projection = run_projection(&request.inputs);
    match schedule_csv(&projection.schedule, request.columns) {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{SCHEDULE_CSV_FILENAME}\""),
                ),
            ],
            body,
        )),
        Err(e) => sip_error_response(&e),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

/// Extractor rejections are reported like any other invalid input so the page
/// always receives a JSON error.
fn unreadable_request(field: &str, reason: String) -> SipError {
    SipError::InvalidInput {
        field: field.to_string(),
        reason,
    }
}

fn sip_error_response(err: &SipError) -> Response {
    match err {
        SipError::InvalidInput { .. } => {
            tracing::warn!(error = %err, "rejected calculation request");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        SipError::Export(_) | SipError::Serialization(_) => {
            tracing::error!(error = %err, "failed to render projection");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> SipResult<ApiRequest> {
    let payload = serde_json::from_str::<CalculatePayload>(json)?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: CalculatePayload) -> SipResult<ApiRequest> {
    let mut args = CalculateArgs::default();

    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.annual_rate {
        args.annual_rate = v;
    }
    if let Some(v) = payload.duration_years {
        args.duration_years = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }

    let inputs = build_inputs(&args)?;
    let columns = ScheduleColumns::from_breakdown(payload.breakdown.unwrap_or(false));
    Ok(ApiRequest { inputs, columns })
}

fn build_calculate_response(inputs: Inputs, projection: Projection) -> CalculateResponse {
    CalculateResponse {
        inputs,
        summary: projection.summary,
        months: projection.schedule.len(),
        schedule: projection.schedule.iter().map(ScheduleRow::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use clap::Parser;
    use tower::ServiceExt;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
    }

    #[derive(Parser)]
    struct CalculateCli {
        #[command(flatten)]
        args: CalculateArgs,
    }

    async fn assert_json_bad_request(response: Response, needle: &str) {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let value: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("error body is json");
        let message = value["error"].as_str().unwrap_or_default();
        assert!(message.contains(needle), "unexpected error message: {message}");
    }

    async fn send_post(body: &'static str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/api/calculate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        build_router().oneshot(request).await.unwrap()
    }

    async fn send_get(uri: &str) -> Response {
        build_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn build_inputs_uses_calculator_defaults() {
        let inputs = build_inputs(&CalculateArgs::default()).expect("valid inputs");
        assert_approx(inputs.monthly_contribution, 5_000.0);
        assert_approx(inputs.annual_rate_pct, 12.0);
        assert_eq!(inputs.duration_years, 10);
        assert_approx(inputs.inflation_rate_pct, 6.0);
    }

    #[test]
    fn command_line_defaults_match_api_defaults() {
        let parsed = CalculateCli::parse_from(["sip"]).args;
        let defaults = CalculateArgs::default();

        assert_eq!(parsed.monthly_contribution, defaults.monthly_contribution);
        assert_eq!(parsed.annual_rate, defaults.annual_rate);
        assert_eq!(parsed.duration_years, defaults.duration_years);
        assert_eq!(parsed.inflation_rate, defaults.inflation_rate);
        assert_eq!(parsed.format, defaults.format);
        assert_eq!(parsed.breakdown, defaults.breakdown);
    }

    #[test]
    fn build_inputs_rejects_zero_rate() {
        let args = CalculateArgs {
            annual_rate: 0.0,
            ..CalculateArgs::default()
        };
        let err = build_inputs(&args).expect_err("must reject zero rate");
        assert!(err.to_string().contains("annual rate"));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "monthlyContribution": 2500,
          "annualRate": 9.5,
          "durationYears": 15,
          "inflationRate": 4,
          "breakdown": true
        }"#;
        let request = api_request_from_json(json).expect("json should parse");

        assert_approx(request.inputs.monthly_contribution, 2_500.0);
        assert_approx(request.inputs.annual_rate_pct, 9.5);
        assert_eq!(request.inputs.duration_years, 15);
        assert_approx(request.inputs.inflation_rate_pct, 4.0);
        assert_eq!(request.columns, ScheduleColumns::Breakdown);
    }

    #[test]
    fn api_request_from_json_fills_missing_fields_with_defaults() {
        let request =
            api_request_from_json(r#"{"durationYears": 3}"#).expect("json should parse");
        assert_eq!(request.inputs.duration_years, 3);
        assert_approx(request.inputs.monthly_contribution, 5_000.0);
        assert_eq!(request.columns, ScheduleColumns::Basic);
    }

    #[test]
    fn api_request_from_json_rejects_out_of_range_values() {
        let err = api_request_from_json(r#"{"inflationRate": -1}"#)
            .expect_err("negative inflation must be rejected");
        assert!(matches!(
            err,
            SipError::InvalidInput { ref field, .. } if field == "inflation rate"
        ));

        let err = api_request_from_json(r#"{"monthlyContribution": 0}"#)
            .expect_err("zero contribution must be rejected");
        assert!(err.to_string().contains("monthly contribution"));
    }

    #[test]
    fn api_request_from_json_rejects_malformed_payload() {
        let err = api_request_from_json(r#"{"durationYears": "ten"}"#)
            .expect_err("string years must be rejected");
        assert!(matches!(err, SipError::Serialization(_)));
    }

    #[test]
    fn run_calculate_summary_formats_amounts() {
        let output = run_calculate(&CalculateArgs::default()).expect("valid calculation");
        assert!(output.contains("600,000.00"));
        assert!(output.contains("1,161,695.38"));
        assert!(output.contains("648,684.63"));
        assert!(output.contains("1,863,508.93"));
    }

    #[test]
    fn run_calculate_csv_honours_breakdown_flag() {
        let args = CalculateArgs {
            duration_years: 1,
            format: OutputFormat::Csv,
            breakdown: true,
            ..CalculateArgs::default()
        };
        let output = run_calculate(&args).expect("valid calculation");
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("Month,Year,Total Invested,Estimated Returns,Future Value")
        );
        assert_eq!(lines.count(), 12);
    }

    #[test]
    fn calculate_response_serialization_contains_expected_fields() {
        let args = CalculateArgs {
            format: OutputFormat::Json,
            ..CalculateArgs::default()
        };
        let output = run_calculate(&args).expect("valid calculation");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        assert_eq!(value["months"], 120);
        assert_eq!(value["schedule"].as_array().map(Vec::len), Some(120));
        assert_eq!(value["schedule"][0]["month"], 1);
        assert!(value["summary"]["futureValueInflationAdjusted"].is_number());
        assert!(value["summary"]["lumpsumEquivalent"].is_number());
        assert!(value["schedule"][0]["cumulativeInvested"].is_number());
        assert!(value["inputs"]["annualRatePct"].is_number());

        assert_eq!(value["schedule"][0]["year"], 1);
        assert_eq!(value["schedule"][11]["year"], 1);
        assert_eq!(value["schedule"][12]["year"], 2);
        assert_eq!(value["schedule"][119]["year"], 10);
        assert_approx(
            value["schedule"][0]["estimatedReturns"]
                .as_f64()
                .unwrap_or_default(),
            50.0,
        );
        let last = &value["schedule"][119];
        assert_approx(
            last["estimatedReturns"].as_f64().unwrap_or_default(),
            last["futureValue"].as_f64().unwrap_or_default()
                - last["cumulativeInvested"].as_f64().unwrap_or_default(),
        );
    }

    #[tokio::test]
    async fn index_serves_embedded_page() {
        let response = send_get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_string(response).await;
        assert!(body.contains("<html"));
    }

    #[tokio::test]
    async fn assets_have_content_types() {
        let css = send_get("/styles.css").await;
        assert_eq!(css.status(), StatusCode::OK);
        assert_eq!(
            css.headers()[header::CONTENT_TYPE],
            "text/css; charset=utf-8"
        );

        let js = send_get("/app.js").await;
        assert_eq!(js.status(), StatusCode::OK);
        assert_eq!(
            js.headers()[header::CONTENT_TYPE],
            "application/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn calculate_get_returns_projection() {
        let response =
            send_get("/api/calculate?monthlyContribution=1000&annualRate=12&durationYears=1").await;
        assert_eq!(response.status(), StatusCode::OK);

        let value: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("valid json");
        assert_eq!(value["months"], 12);
        assert_eq!(value["schedule"][11]["month"], 12);
        assert_approx(
            value["summary"]["totalInvested"].as_f64().unwrap_or_default(),
            12_000.0,
        );
    }

    #[tokio::test]
    async fn calculate_post_accepts_json_body() {
        let response = send_post(r#"{"monthlyContribution": 5000, "durationYears": 10}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("valid json");
        let first = &value["schedule"][0];
        assert_approx(first["cumulativeInvested"].as_f64().unwrap_or_default(), 5_000.0);
        assert_approx(first["futureValue"].as_f64().unwrap_or_default(), 5_050.0);
    }

    #[tokio::test]
    async fn calculate_rejects_invalid_input_with_bad_request() {
        let response = send_get("/api/calculate?durationYears=0").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("\"error\""));
        assert!(body.contains("duration years"));
    }

    #[tokio::test]
    async fn schedule_csv_is_an_attachment() {
        let response = send_get("/api/schedule.csv?durationYears=2&breakdown=true").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"sip_schedule.csv\""
        );

        let body = body_string(response).await;
        assert!(body.starts_with("Month,Year,Total Invested,Estimated Returns,Future Value\n"));
        assert_eq!(body.lines().count(), 25);
    }

    #[tokio::test]
    async fn unparseable_query_is_a_json_bad_request() {
        let response = send_get("/api/calculate?durationYears=-1").await;
        assert_json_bad_request(response, "invalid query").await;

        let response = send_get("/api/calculate?annualRate=abc").await;
        assert_json_bad_request(response, "invalid query").await;
    }

    #[tokio::test]
    async fn unparseable_csv_query_is_a_json_bad_request() {
        let response = send_get("/api/schedule.csv?annualRate=abc").await;
        assert_json_bad_request(response, "invalid query").await;
    }

    #[tokio::test]
    async fn unparseable_json_body_is_a_json_bad_request() {
        let response = send_post(r#"{"durationYears": 2.5}"#).await;
        assert_json_bad_request(response, "invalid body").await;

        let response = send_post("{not json").await;
        assert_json_bad_request(response, "invalid body").await;
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = send_get("/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
