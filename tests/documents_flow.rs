mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::Duration;
use common::{read_json, TestApp, OTHER_OWNER, OWNER};
use folio::error::ErrorKind;
use folio::models::{DocumentStatus, DocumentType};
use folio::pagination::PageRequest;
use folio::services::documents::{
    CreateDocument, DocumentChanges, DocumentFilter, MAX_TITLE_LEN,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct DocumentResponse {
    document: DocumentBody,
}

#[derive(Deserialize, Debug)]
struct DocumentBody {
    id: i64,
    title: String,
    content: String,
    #[serde(rename = "type")]
    doc_type: String,
    status: String,
    folder_id: Option<i64>,
    tags: Vec<String>,
    size: i64,
    view_count: i64,
}

#[derive(Deserialize)]
struct PageBody {
    items: Vec<SummaryBody>,
    total: i64,
    page: i64,
    page_size: i64,
    total_pages: i64,
}

#[derive(Deserialize)]
struct SummaryBody {
    id: i64,
    title: String,
}

fn draft(title: &str, doc_type: DocumentType, folder_id: Option<i64>) -> CreateDocument {
    CreateDocument {
        title: title.to_string(),
        content: String::new(),
        doc_type,
        folder_id,
        tags: Vec::new(),
    }
}

#[tokio::test]
async fn create_and_fetch_document_over_http() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let folder = app.state.folders.create(OWNER, "Plans", None)?;

    let created = app
        .post_json(
            "/api/documents",
            &json!({
                "title": "  Roadmap ",
                "content": "héllo",
                "type": "word",
                "folder_id": folder.id,
                "tags": ["q3", " planning ", "q3"],
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: DocumentResponse = read_json(created).await?;
    let doc = created.document;
    assert_eq!(doc.title, "Roadmap");
    assert_eq!(doc.doc_type, "word");
    assert_eq!(doc.status, "draft");
    assert_eq!(doc.folder_id, Some(folder.id));
    assert_eq!(doc.tags, vec!["q3".to_string(), "planning".to_string()]);
    assert_eq!(doc.size, "héllo".len() as i64);
    assert_eq!(doc.view_count, 0);

    let fetched = app
        .get(&format!("/api/documents/{}", doc.id), Some(&token))
        .await?;
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched: DocumentResponse = read_json(fetched).await?;
    assert_eq!(fetched.document.content, "héllo");

    let unknown_type = app
        .post_json(
            "/api/documents",
            &json!({ "title": "Sheet", "type": "spreadsheet" }),
            Some(&token),
        )
        .await?;
    assert!(unknown_type.status().is_client_error());
    Ok(())
}

#[tokio::test]
async fn create_requires_live_owned_folder() -> Result<()> {
    let app = TestApp::new().await?;
    let foreign = app.state.folders.create(OTHER_OWNER, "Theirs", None)?;

    let err = app
        .state
        .documents
        .create(OWNER, draft("Memo", DocumentType::Note, Some(foreign.id)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = app
        .state
        .documents
        .create(OWNER, draft("   ", DocumentType::Note, None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    Ok(())
}

#[tokio::test]
async fn reads_increment_view_count_eventually() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let doc = app
        .state
        .documents
        .create(OWNER, draft("Popular", DocumentType::Note, None))?;

    for _ in 0..3 {
        let response = app
            .get(&format!("/api/documents/{}", doc.id), Some(&token))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    app.wait_for_views(doc.id, 3).await?;
    assert_eq!(app.view_count(doc.id).await?, 3);
    Ok(())
}

#[tokio::test]
async fn update_applies_only_present_fields() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let folder = app.state.folders.create(OWNER, "Desk", None)?;
    let doc = app.state.documents.create(
        OWNER,
        CreateDocument {
            title: "Minutes".to_string(),
            content: "first".to_string(),
            doc_type: DocumentType::Note,
            folder_id: Some(folder.id),
            tags: vec!["team".to_string()],
        },
    )?;

    let patched = app
        .patch_json(
            &format!("/api/documents/{}", doc.id),
            &json!({ "content": "second draft", "status": "published" }),
            Some(&token),
        )
        .await?;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched: DocumentResponse = read_json(patched).await?;
    assert_eq!(patched.document.title, "Minutes");
    assert_eq!(patched.document.content, "second draft");
    assert_eq!(patched.document.size, "second draft".len() as i64);
    assert_eq!(patched.document.status, "published");
    assert_eq!(patched.document.folder_id, Some(folder.id));
    assert_eq!(patched.document.tags, vec!["team".to_string()]);

    // Explicit null files the document at root.
    let to_root = app
        .patch_json(
            &format!("/api/documents/{}", doc.id),
            &json!({ "folder_id": null }),
            Some(&token),
        )
        .await?;
    let to_root: DocumentResponse = read_json(to_root).await?;
    assert_eq!(to_root.document.folder_id, None);

    let empty = app
        .patch_json(&format!("/api/documents/{}", doc.id), &json!({}), Some(&token))
        .await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let err = app
        .state
        .documents
        .update(
            OWNER,
            doc.id,
            DocumentChanges {
                folder_id: Some(Some(31337)),
                ..DocumentChanges::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = app
        .state
        .documents
        .update(
            OTHER_OWNER,
            doc.id,
            DocumentChanges {
                title: Some("Hijacked".to_string()),
                ..DocumentChanges::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn list_filters_and_paginates() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let folder = app.state.folders.create(OWNER, "Finance", None)?;

    let mut ids = Vec::new();
    for (title, doc_type, folder_id) in [
        ("Budget 2025", DocumentType::Excel, Some(folder.id)),
        ("budget notes", DocumentType::Note, None),
        ("Quarterly Budget", DocumentType::Ppt, Some(folder.id)),
        ("Travel", DocumentType::Word, None),
    ] {
        app.clock.advance(Duration::minutes(1));
        ids.push(app.state.documents.create(OWNER, draft(title, doc_type, folder_id))?.id);
    }
    app.state.documents.create(OTHER_OWNER, draft("Budget elsewhere", DocumentType::Excel, None))?;

    // Newest first.
    let all = app.state.documents.list(OWNER, &DocumentFilter::default(), PageRequest::default())?;
    assert_eq!(all.total, 4);
    let listed: Vec<i64> = all.items.iter().map(|doc| doc.id).collect();
    let mut newest_first = ids.clone();
    newest_first.reverse();
    assert_eq!(listed, newest_first);

    // Keyword matching is case-sensitive.
    let keyword = app.get("/api/documents?keyword=Budget", Some(&token)).await?;
    assert_eq!(keyword.status(), StatusCode::OK);
    let keyword: PageBody = read_json(keyword).await?;
    let titles: Vec<&str> = keyword.items.iter().map(|doc| doc.title.as_str()).collect();
    assert_eq!(titles, vec!["Quarterly Budget", "Budget 2025"]);

    let in_folder = app.state.documents.list(
        OWNER,
        &DocumentFilter {
            folder_id: Some(folder.id),
            doc_type: Some(DocumentType::Excel),
            ..DocumentFilter::default()
        },
        PageRequest::default(),
    )?;
    assert_eq!(in_folder.total, 1);
    assert_eq!(in_folder.items[0].id, ids[0]);

    let paged = app
        .get("/api/documents?page=2&page_size=3", Some(&token))
        .await?;
    let paged: PageBody = read_json(paged).await?;
    assert_eq!(paged.total, 4);
    assert_eq!(paged.page, 2);
    assert_eq!(paged.page_size, 3);
    assert_eq!(paged.total_pages, 2);
    assert_eq!(paged.items.len(), 1);
    assert_eq!(paged.items[0].id, ids[0]);

    let by_status = app
        .get("/api/documents?status=published", Some(&token))
        .await?;
    let by_status: PageBody = read_json(by_status).await?;
    assert_eq!(by_status.total, 0);

    let bad_page = app.get("/api/documents?page=0", Some(&token)).await?;
    assert_eq!(bad_page.status(), StatusCode::BAD_REQUEST);

    let huge_page = app
        .get(
            "/api/documents?page=9223372036854775807&page_size=100",
            Some(&token),
        )
        .await?;
    assert_eq!(huge_page.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn copy_creates_an_independent_draft() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;
    let folder = app.state.folders.create(OWNER, "Templates", None)?;
    let source = app.state.documents.create(
        OWNER,
        CreateDocument {
            title: "Letter".to_string(),
            content: "Dear team".to_string(),
            doc_type: DocumentType::Word,
            folder_id: Some(folder.id),
            tags: vec!["template".to_string()],
        },
    )?;
    app.state.documents.update(
        OWNER,
        source.id,
        DocumentChanges {
            status: Some(DocumentStatus::Published),
            ..DocumentChanges::default()
        },
    )?;
    app.state.documents.share(OWNER, source.id, 24)?;

    let copied = app
        .post_empty(&format!("/api/documents/{}/copy", source.id), Some(&token))
        .await?;
    assert_eq!(copied.status(), StatusCode::CREATED);
    let copied: DocumentResponse = read_json(copied).await?;
    let copy = copied.document;

    assert_ne!(copy.id, source.id);
    assert_eq!(copy.title, "Letter - Copy");
    assert_eq!(copy.content, "Dear team");
    assert_eq!(copy.doc_type, "word");
    assert_eq!(copy.status, "draft");
    assert_eq!(copy.folder_id, Some(folder.id));
    assert_eq!(copy.tags, vec!["template".to_string()]);
    assert_eq!(copy.view_count, 0);

    let copy_row = app.state.documents.get(OWNER, copy.id)?;
    assert!(!copy_row.summary.is_shared);
    assert!(copy_row.summary.share_expiry.is_none());
    Ok(())
}

#[tokio::test]
async fn copying_a_maximal_title_keeps_it_updatable() -> Result<()> {
    let app = TestApp::new().await?;
    let source = app.state.documents.create(
        OWNER,
        draft(&"t".repeat(MAX_TITLE_LEN), DocumentType::Note, None),
    )?;

    let copy = app.state.documents.copy(OWNER, source.id)?;
    assert_eq!(copy.title.chars().count(), MAX_TITLE_LEN);
    assert!(copy.title.ends_with(" - Copy"));

    app.state.documents.update(
        OWNER,
        copy.id,
        DocumentChanges {
            title: Some(copy.title.clone()),
            ..DocumentChanges::default()
        },
    )?;
    Ok(())
}

#[tokio::test]
async fn workspace_stats_count_live_documents_and_recycle_items() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token_for(OWNER)?;

    let a = app.state.documents.create(OWNER, draft("A", DocumentType::Note, None))?;
    let b = app.state.documents.create(OWNER, draft("B", DocumentType::Note, None))?;
    app.state.documents.create(OWNER, draft("C", DocumentType::Note, None))?;
    app.state.documents.update(
        OWNER,
        a.id,
        DocumentChanges {
            status: Some(DocumentStatus::Archived),
            ..DocumentChanges::default()
        },
    )?;
    app.state.documents.delete(OWNER, b.id, None)?;

    let stats = app.get("/api/workspace/stats", Some(&token)).await?;
    assert_eq!(stats.status(), StatusCode::OK);
    let stats: serde_json::Value = read_json(stats).await?;
    assert_eq!(stats["total_documents"], 2);
    assert_eq!(stats["draft_documents"], 1);
    assert_eq!(stats["archived_documents"], 1);
    assert_eq!(stats["published_documents"], 0);
    assert_eq!(stats["recycle_items"], 1);
    Ok(())
}

#[tokio::test]
async fn mutations_are_recorded_in_the_activity_log() -> Result<()> {
    let app = TestApp::new().await?;
    let doc = app
        .state
        .documents
        .create(OWNER, draft("Logged", DocumentType::Note, None))?;
    app.state.documents.share(OWNER, doc.id, 1)?;
    app.state.documents.delete(OWNER, doc.id, None)?;

    let mut actions = Vec::new();
    for _ in 0..100 {
        actions = app.activity_actions(OWNER).await?;
        if actions.len() >= 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    actions.sort();
    assert_eq!(actions, vec!["create", "delete", "share"]);
    Ok(())
}
