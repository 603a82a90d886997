use super::fixture::{FakeDesktop, Harness};
use super::init_tracing;
use crate::bookmark::BookmarkStore;
use crate::config::HttpConfig;
use crate::executor::ProcedureExecutor;
use crate::operations::fetch::HttpFetcher;
use crate::operations::OperationRegistry;
use crate::procedure::{OpArg, Operation, ProcedureStore};
use axum::http::{header, HeaderMap};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

const REPORT: &str = "결국 경기 판독";

fn euc_kr(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::EUC_KR.encode(text);
    bytes.into_owned()
}

async fn serve() -> String {
    let app = Router::new()
        .route(
            "/header",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=euc-kr")],
                    euc_kr(&format!("<html><body>{REPORT}</body></html>")),
                )
            }),
        )
        .route(
            "/meta",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html")],
                    euc_kr(&format!(
                        "<html><head><meta charset=\"euc-kr\"></head><body>{REPORT}</body></html>"
                    )),
                )
            }),
        )
        .route(
            "/agent",
            get(|headers: HeaderMap| async move {
                headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&HttpConfig {
        user_agent: "pacs-automation-tests/1.0".to_string(),
        timeout_ms: 5_000,
    })
    .unwrap()
}

#[tokio::test]
async fn legacy_korean_pages_decode_from_header_or_meta() {
    init_tracing();
    let base = serve().await;
    let fetcher = fetcher();

    let from_header = fetcher.fetch_html(&format!("{base}/header")).await.unwrap();
    assert!(from_header.contains(REPORT), "{from_header}");

    let from_meta = fetcher.fetch_html(&format!("{base}/meta")).await.unwrap();
    assert!(from_meta.contains(REPORT), "{from_meta}");
}

#[tokio::test]
async fn configured_user_agent_is_sent() {
    let base = serve().await;
    let agent = fetcher().fetch_html(&format!("{base}/agent")).await.unwrap();
    assert_eq!(agent, "pacs-automation-tests/1.0");
}

#[tokio::test]
async fn get_html_step_previews() {
    init_tracing();
    let base = serve().await;
    let mut harness = Harness::new(FakeDesktop::new());
    harness.services.http = Arc::new(fetcher());
    let mut executor = ProcedureExecutor::new(
        OperationRegistry::with_builtins(),
        harness.services.clone(),
        BookmarkStore::new(),
        ProcedureStore::new(),
    );

    let get_html = |url: String| Operation::new("GetHTML").arg1(OpArg::string(url));
    let report = executor
        .run(&[
            get_html(format!("{base}/header")),
            get_html(format!("{base}/missing")),
            get_html("ftp://pacs.local/report".to_string()),
            get_html("   ".to_string()),
        ])
        .await;

    assert!(report.steps[0].preview.contains(REPORT));
    assert!(report.steps[1].preview.starts_with("(error: "));
    assert_eq!(report.steps[2].preview, "(invalid url)");
    assert_eq!(report.steps[3].preview, "(no url)");
}
