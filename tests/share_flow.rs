mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::Duration;
use common::{read_json, TestApp, OWNER};
use folio::clock::Clock;
use folio::error::ErrorKind;
use folio::models::DocumentType;
use folio::services::documents::CreateDocument;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct ShareResponse {
    document_id: i64,
    token: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct SharedDocument {
    document: SharedBody,
}

#[derive(Deserialize)]
struct SharedBody {
    id: i64,
    title: String,
    content: String,
}

fn report() -> CreateDocument {
    CreateDocument {
        title: "Report".to_string(),
        content: "Quarterly numbers".to_string(),
        doc_type: DocumentType::Word,
        folder_id: None,
        tags: Vec::new(),
    }
}

#[tokio::test]
async fn share_link_resolves_until_it_expires() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let doc = app.state.documents.create(OWNER, report())?;

    let shared = app
        .post_json(
            &format!("/api/documents/{}/share", doc.id),
            &json!({ "expiry_hours": 1 }),
            Some(&token),
        )
        .await?;
    assert_eq!(shared.status(), StatusCode::OK);
    let shared: ShareResponse = read_json(shared).await?;
    assert_eq!(shared.document_id, doc.id);
    assert_eq!(shared.token.len(), 32);
    assert_eq!(
        shared.url.as_deref(),
        Some(format!("https://docs.example.com/api/share/{}", shared.token).as_str())
    );

    // No bearer token needed.
    let resolved = app.get(&format!("/api/share/{}", shared.token), None).await?;
    assert_eq!(resolved.status(), StatusCode::OK);
    let resolved: SharedDocument = read_json(resolved).await?;
    assert_eq!(resolved.document.id, doc.id);
    assert_eq!(resolved.document.title, "Report");
    assert_eq!(resolved.document.content, "Quarterly numbers");
    app.wait_for_views(doc.id, 1).await?;

    app.clock.advance(Duration::hours(2));
    let expired = app.get(&format!("/api/share/{}", shared.token), None).await?;
    assert_eq!(expired.status(), StatusCode::GONE);

    let err = app.state.documents.resolve_share(&shared.token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    Ok(())
}

#[tokio::test]
async fn resharing_rotates_the_token() -> Result<()> {
    let app = TestApp::new().await?;
    let doc = app.state.documents.create(OWNER, report())?;

    let first = app.state.documents.share(OWNER, doc.id, 24)?;
    let second = app.state.documents.share(OWNER, doc.id, 24)?;
    assert_ne!(first.token, second.token);

    let err = app.state.documents.resolve_share(&first.token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(app.state.documents.resolve_share(&second.token)?.summary.id, doc.id);
    Ok(())
}

#[tokio::test]
async fn expiry_hours_must_be_within_a_year() -> Result<()> {
    let app = TestApp::new().await?;
    let doc = app.state.documents.create(OWNER, report())?;

    for hours in [0, -5, 24 * 365 + 1] {
        let err = app.state.documents.share(OWNER, doc.id, hours).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }
    let grant = app.state.documents.share(OWNER, doc.id, 24 * 365)?;
    assert_eq!(
        grant.expires_at,
        app.clock.now_naive() + Duration::hours(24 * 365)
    );
    Ok(())
}

#[tokio::test]
async fn unknown_or_recycled_tokens_do_not_resolve() -> Result<()> {
    let app = TestApp::new().await?;
    let doc = app.state.documents.create(OWNER, report())?;
    let grant = app.state.documents.share(OWNER, doc.id, 24)?;

    let unknown = app.get("/api/share/0123456789abcdef0123456789abcdef", None).await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    app.state.documents.delete(OWNER, doc.id, None)?;
    let recycled = app.get(&format!("/api/share/{}", grant.token), None).await?;
    assert_eq!(recycled.status(), StatusCode::NOT_FOUND);
    Ok(())
}
