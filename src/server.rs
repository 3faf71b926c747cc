//! HTTP surface: the router, its handlers and the CORS policy.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::helper::{parse_hex_color, render_png, RenderOptions, Style};
use crate::qrcode::Encoder;
use crate::upi::PaymentRequest;

pub const SERVICE_NAME: &str = "upi-qr-generator";

const ALLOWED_HEADERS: &str = "Content-Type,Authorization";
const ALLOWED_METHODS: &str = "GET,PUT,POST,DELETE,OPTIONS";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

/// Query parameters accepted by `/api/qr`. Every field is optional.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QrQuery {
    pub amount: Option<String>,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub style: Option<String>,
    pub color1: Option<String>,
    pub color2: Option<String>,
}

impl QrQuery {
    /// Parses a raw query string. Unknown keys are ignored and a repeated key keeps its first
    /// value; parsing never fails.
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "amount" => &mut query.amount,
                "name" => &mut query.name,
                "currency" => &mut query.currency,
                "style" => &mut query.style,
                "color1" => &mut query.color1,
                "color2" => &mut query.color2,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

pub fn create_router(config: AppConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/qr", get(generate_qr))
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Answers preflights; the set-header layers above stamp the same policy on plain responses.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Bind and serve until Ctrl+C.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let app = create_router(config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("UPI QR service listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    let styles: Map<String, Value> = Style::ALL
        .iter()
        .map(|s| (s.tag().to_owned(), Value::from(s.description())))
        .collect();

    Json(json!({
        "message": "UPI QR Code Generator API",
        "usage": {
            "without_amount": "/api/qr",
            "with_amount": "/api/qr?amount=100",
            "with_custom_name": "/api/qr?amount=100&name=YourName",
            "with_currency": "/api/qr?amount=100&currency=INR",
            "with_style": "/api/qr?amount=100&style=gradient&color1=FF5733&color2=FFBD33",
        },
        "styles": styles,
        "color_format": "Hex colors without # (e.g., FF5733 for orange)",
        "endpoints": {
            "api": "/api/qr",
            "health_check": "/health",
        },
        "upi_id": state.config.payee_id,
    }))
}

async fn generate_qr(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ServiceError> {
    let query = QrQuery::parse(raw.as_deref().unwrap_or_default());
    let config = state.config;
    let request = payment_request(&config, &query)?;
    let options = render_options(&config, &query)?;
    let payload = request.to_uri();

    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ServiceError> {
        let qr = Encoder::new(config.error_correction)
            .min_version(config.min_version)
            .encode_text(&payload)?;
        debug!(
            %payload,
            version = qr.version().value(),
            style = options.style.tag(),
            "rendering payment QR"
        );
        Ok(render_png(&qr, &options)?)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("render task failed: {e}")))??;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CONTENT_DISPOSITION, "inline; filename=\"upi_qr.png\"")
        .body(Body::from(png))
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

/// The amount is checked before anything else in the query.
fn payment_request(config: &AppConfig, query: &QrQuery) -> Result<PaymentRequest, ServiceError> {
    let name = query.name.as_deref().unwrap_or(&config.default_name);
    let currency = query.currency.as_deref().unwrap_or(&config.default_currency);
    Ok(PaymentRequest::new(
        config.payee_id.as_str(),
        name,
        currency,
        query.amount.as_deref(),
    )?)
}

fn render_options(config: &AppConfig, query: &QrQuery) -> Result<RenderOptions, ServiceError> {
    Ok(RenderOptions {
        box_size: config.box_size,
        quiet_zone: config.quiet_zone,
        border_size: config.border_size,
        style: Style::from_tag(query.style.as_deref().unwrap_or("basic")),
        front: parse_hex_color(query.color1.as_deref().unwrap_or("000000"))?,
        back: parse_hex_color(query.color2.as_deref().unwrap_or("FFFFFF"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use image::GenericImageView;
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> Response {
        create_router(AppConfig::default())
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn fetch(uri: &str) -> Response {
        send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn health_reports_service() {
        let response = fetch("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({ "status": "healthy", "service": "upi-qr-generator" }));
    }

    #[tokio::test]
    async fn index_documents_usage() {
        let response = fetch("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["message"], "UPI QR Code Generator API");
        assert_eq!(body["upi_id"], "satyam84ya@fam");
        assert_eq!(body["endpoints"]["api"], "/api/qr");
        assert_eq!(body["styles"].as_object().unwrap().len(), 6);
        assert_eq!(body["styles"]["gradient_radial"], "Radial gradient");
    }

    #[tokio::test]
    async fn qr_endpoint_returns_png() {
        let response = fetch("/api/qr?amount=100&name=Test&currency=INR").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/png");
        assert!(header_str(&response, header::CONTENT_DISPOSITION).contains("upi_qr.png"));

        let png = body_bytes(response).await;
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
        // Version 6 at level H: (41 + 2 * 2) * 15 + 2 * 40.
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (755, 755));
    }

    #[tokio::test]
    async fn styled_request_succeeds() {
        for style in ["rounded", "circles", "gradient", "gradient_vertical", "gradient_radial", "bogus"] {
            let uri = format!("/api/qr?style={style}&color1=FF5733&color2=FFBD33");
            assert_eq!(fetch(&uri).await.status(), StatusCode::OK, "{style}");
        }
    }

    #[tokio::test]
    async fn invalid_amount_is_rejected() {
        for amount in ["abc", "1.2.3", "-5"] {
            let response = fetch(&format!("/api/qr?amount={amount}")).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_bytes(response).await;
            assert_eq!(body, br#"{"error":"Invalid amount provided"}"#);
        }
    }

    #[tokio::test]
    async fn invalid_color_is_rejected() {
        let response = fetch("/api/qr?color1=zzz").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "Invalid color provided: zzz");
    }

    #[tokio::test]
    async fn repeated_keys_keep_the_first_value() {
        let response = fetch("/api/qr?amount=1&amount=2").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/png");

        let response = fetch("/api/qr?amount=oops&amount=2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "Invalid amount provided");
    }

    #[test]
    fn query_parsing_is_lenient() {
        let query = QrQuery::parse("amount=1&amount=2&name=Satyam+Kumar&style=rounded&x=y&color1");
        assert_eq!(query.amount.as_deref(), Some("1"));
        assert_eq!(query.name.as_deref(), Some("Satyam Kumar"));
        assert_eq!(query.style.as_deref(), Some("rounded"));
        assert_eq!(query.color1.as_deref(), Some(""));
        assert_eq!(query.currency, None);
        assert_eq!(QrQuery::parse(""), QrQuery::default());
        assert_eq!(QrQuery::parse("%zz=&&="), QrQuery::default());
    }

    #[tokio::test]
    async fn amount_is_checked_before_color() {
        let response = fetch("/api/qr?amount=x&color1=zzz").await;
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "Invalid amount provided");
    }

    #[tokio::test]
    async fn every_response_carries_cors_headers() {
        for uri in ["/", "/health", "/api/qr", "/api/qr?amount=bad"] {
            let response = fetch(uri).await;
            assert_eq!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
            assert_eq!(
                header_str(&response, header::ACCESS_CONTROL_ALLOW_HEADERS),
                "Content-Type,Authorization"
            );
            assert_eq!(
                header_str(&response, header::ACCESS_CONTROL_ALLOW_METHODS),
                "GET,PUT,POST,DELETE,OPTIONS"
            );
        }
    }

    #[tokio::test]
    async fn preflight_is_answered() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/qr")
            .header(header::ORIGIN, "https://shop.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert!(response.status().is_success());
        assert_eq!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_METHODS).contains("GET"));
    }

    #[test]
    fn query_defaults_fill_the_request() {
        let config = AppConfig::default();
        let query = QrQuery {
            amount: Some("100".into()),
            name: Some("Test".into()),
            ..QrQuery::default()
        };
        let request = payment_request(&config, &query).unwrap();
        assert_eq!(request.to_uri(), "upi://pay?pa=satyam84ya@fam&pn=Test&cu=INR&am=100");

        let options = render_options(&config, &QrQuery::default()).unwrap();
        assert_eq!(options.style, Style::Basic);
        assert_eq!(options.front, image::Rgb([0, 0, 0]));
        assert_eq!(options.back, image::Rgb([255, 255, 255]));
        assert_eq!(options.box_size, 15);
    }
}
