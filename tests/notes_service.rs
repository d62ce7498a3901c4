//! Note operations end to end against a mock Notion server.

use chrono::{FixedOffset, TimeZone};
use notion_reminder::channels::commands::reply_for;
use notion_reminder::config::{NotesConfig, RecurringTemplate};
use notion_reminder::notion::DatePoint;
use notion_reminder::{NoteRecord, NotesService};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY_PATH: &str = "/v1/databases/db1/query";

fn config(server: &MockServer) -> NotesConfig {
    let mut config = NotesConfig::default();
    config.notion.token = "secret_test".to_owned();
    config.notion.database_id = "db1".to_owned();
    config.notion.base_url = server.uri();
    config.notion.utc_offset = "+03:00".to_owned();
    config
}

fn service(server: &MockServer) -> NotesService {
    NotesService::from_config(&config(server)).expect("service")
}

fn at(h: u32, m: u32) -> DatePoint {
    FixedOffset::east_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 5, h, m, 0)
        .unwrap()
}

fn row(id: &str, title: &str, start: &str, importance: &str) -> Value {
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Title": {"id": "title", "type": "title", "title": [
                {"type": "text", "text": {"content": title}, "plain_text": title}
            ]},
            "Remind": {"id": "r", "type": "multi_select", "multi_select": [{"id": "1", "name": "t08:00"}]},
            "Date": {"id": "d", "type": "date", "date": {"start": start, "end": null, "time_zone": null}},
            "Importance": {"id": "i", "type": "select", "select": {"id": "2", "name": importance}},
            "Progress": {"id": "p", "type": "select", "select": {"id": "3", "name": "Not started"}},
            "Category": {"id": "c", "type": "multi_select", "multi_select": []}
        }
    })
}

fn results(rows: Vec<Value>) -> Value {
    json!({"object": "list", "results": rows, "has_more": false, "next_cursor": null})
}

async fn query_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("recording enabled")
        .into_iter()
        .filter(|r| r.url.path() == QUERY_PATH)
        .map(|r| serde_json::from_slice(&r.body).expect("json body"))
        .collect()
}

fn template() -> RecurringTemplate {
    RecurringTemplate {
        title: "Stretch".to_owned(),
        importance: "Important".to_owned(),
        category: vec!["Home".to_owned()],
    }
}

#[tokio::test]
async fn test_today_notes_filters_local_day_and_unfinished() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![row(
            "p1",
            "Pay rent",
            "2024-01-05T09:00:00.000+03:00",
            "Urgent",
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let notes = service(&server).today_notes(&at(8, 0), true).await.expect("today");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].render(&at(8, 0)), "🔥 [09:00] Pay rent");

    let bodies = query_bodies(&server).await;
    assert_eq!(
        bodies[0],
        json!({
            "page_size": 100,
            "filter": {"and": [
                {"property": "Date", "date": {"on_or_after": "2024-01-05"}},
                {"property": "Date", "date": {"on_or_before": "2024-01-05T23:59:59+03:00"}},
                {"property": "Progress", "select": {"does_not_equal": "Done"}}
            ]},
            "sorts": [{"property": "Date", "direction": "ascending"}]
        })
    );
}

#[tokio::test]
async fn test_next_week_sorts_by_date_then_importance() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(body_partial_json(json!({
            "filter": {"property": "Date", "date": {"next_week": {}}},
            "sorts": [
                {"property": "Date", "direction": "ascending"},
                {"property": "Importance", "direction": "descending"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let notes = service(&server).next_week_notes().await.expect("week");
    assert!(notes.is_empty());
}

#[tokio::test]
async fn test_recurring_note_is_skipped_when_present_today() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![row(
            "p1",
            "Stretch",
            "2024-01-05",
            "Important",
        )])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new"})))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = service(&server)
        .create_recurring_today(&[template()], &at(7, 0))
        .await
        .expect("recurring");
    assert!(outcome.created.is_empty());
    assert_eq!(outcome.skipped, ["Stretch"]);

    let bodies = query_bodies(&server).await;
    assert_eq!(
        bodies[0]["filter"]["and"][0],
        json!({"property": "Title", "title": {"equals": "Stretch"}})
    );
}

#[tokio::test]
async fn test_recurring_note_is_created_once_when_missing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .and(body_partial_json(json!({
            "parent": {"database_id": "db1"},
            "properties": {
                "Title": {"title": [{"type": "text", "text": {"content": "Stretch"}}]},
                "Remind": {"multi_select": [{"name": "t07:00"}]},
                "Date": {"date": {"start": "2024-01-05"}},
                "Importance": {"select": {"name": "Important"}},
                "Progress": {"select": {"name": "Not started"}},
                "Category": {"multi_select": [{"name": "Home"}]}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "page", "id": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = service(&server)
        .create_recurring_today(&[template()], &at(7, 0))
        .await
        .expect("recurring");
    assert_eq!(outcome.created, ["Stretch"]);
    assert!(outcome.skipped.is_empty());
}

#[tokio::test]
async fn test_create_note_rejects_incomplete_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new"})))
        .expect(0)
        .mount(&server)
        .await;

    let note = NoteRecord::new().with_title("Only a title");
    let result = service(&server).create_note(&note).await;
    assert!(matches!(
        result,
        Err(notion_reminder::NotesError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_today_command_lists_notes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![
            row("p1", "Pay rent", "2024-01-05T09:00:00.000+03:00", "Urgent"),
            row("p2", "Laundry", "2024-01-05", "Unimportant"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let reply = reply_for(&service(&server), "/today", &at(8, 0))
        .await
        .expect("reply");
    assert_eq!(reply, "Notes for today:\n🔥 [09:00] Pay rent\n⚪ Laundry");
}

#[tokio::test]
async fn test_week_command_without_notes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(results(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let reply = reply_for(&service(&server), "/week", &at(8, 0))
        .await
        .expect("reply");
    assert_eq!(reply, "No notes for next week!");
}

#[tokio::test]
async fn test_command_failure_surfaces_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let result = reply_for(&service(&server), "/today", &at(8, 0)).await;
    assert_eq!(result.expect_err("500 must fail").status(), Some(500));
}
