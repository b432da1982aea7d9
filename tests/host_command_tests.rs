//! Integration tests for the line-oriented command host.

mod common;

use std::sync::Arc;

use common::{PAGE_URL, engine, script};
use inspectmaker::config::TriggerMode;
use inspectmaker::host::{CommandHost, event_value};
use inspectmaker::scripting::{ExecutionResult, TriggerEvent};
use serde_json::{Value, json};
use tokio::io::BufReader;

fn host_for(scripts: Vec<inspectmaker::config::ScriptDefinition>) -> (CommandHost, common::Engine) {
    let engine = engine(PAGE_URL, scripts);
    (CommandHost::new(Arc::clone(&engine.manager)), engine)
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (host, _engine) = host_for(Vec::new());

    let reply = host
        .handle_line(r#"{"action": "removeInjection", "scriptId": 9, "requestId": "r-1"}"#)
        .await;

    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["requestId"], json!("r-1"));
    assert_eq!(reply["message"], json!("Script 9 was not injected"));
}

#[tokio::test]
async fn test_malformed_line_gets_error_reply() {
    let (host, _engine) = host_for(Vec::new());

    let reply = host.handle_line("{not json").await;

    assert_eq!(reply["success"], json!(false));
    assert!(
        reply["error"]
            .as_str()
            .is_some_and(|e| e.starts_with("Malformed command")),
        "{reply}"
    );
}

#[tokio::test]
async fn test_execute_script_over_the_wire() {
    let (host, _engine) = host_for(Vec::new());

    let reply = host
        .handle_line(r#"{"action": "executeScript", "script": {"id": 1, "code": "1+1"}}"#)
        .await;

    assert_eq!(reply, json!({"success": true, "output": "2"}));
}

#[tokio::test]
async fn test_page_dispatch_reaches_armed_listener() {
    let (host, engine) = host_for(Vec::new());
    engine
        .manager
        .inject_script(&script(2, "1", TriggerMode::event("click")));

    let reply = host
        .handle_command(json!({"action": "page.dispatchEvent", "event": "click"}))
        .await;
    assert_eq!(reply.message.as_deref(), Some("Dispatched to 1 listener(s)"));

    let window = host
        .handle_command(json!({"action": "page.dispatchEvent", "event": "click", "target": "window"}))
        .await;
    assert_eq!(window.message.as_deref(), Some("Dispatched to 0 listener(s)"));
}

#[tokio::test]
async fn test_page_navigation_actions() {
    let (host, engine) = host_for(Vec::new());

    let pushed = host
        .handle_command(json!({"action": "page.pushState", "state": {"n": 1}, "url": "/orders"}))
        .await;
    assert_eq!(
        pushed.message.as_deref(),
        Some("Location is https://shop.example.com/orders")
    );

    let back = host.handle_command(json!({"action": "page.back"})).await;
    assert_eq!(back.message.as_deref(), Some(format!("Location is {PAGE_URL}").as_str()));

    let no_more = host.handle_command(json!({"action": "page.back"})).await;
    assert_eq!(no_more.error.as_deref(), Some("No previous history entry"));

    host.handle_command(json!({"action": "page.navigate", "url": "#reviews"}))
        .await;
    assert_eq!(engine.page.url(), "https://shop.example.com/cart#reviews");
}

#[tokio::test]
async fn test_page_request_and_append_html() {
    let (host, _engine) = host_for(Vec::new());

    let request = host
        .handle_command(json!({"action": "page.request", "url": "https://shop.example.com/api/cart"}))
        .await;
    assert_eq!(
        request.message.as_deref(),
        Some("GET https://shop.example.com/api/cart completed with 200")
    );

    let append = host
        .handle_command(json!({"action": "page.appendHtml", "html": "<div></div>"}))
        .await;
    assert_eq!(append.message.as_deref(), Some("Notified 0 observer(s)"));

    let invalid = host
        .handle_command(json!({"action": "page.appendHtml"}))
        .await;
    assert!(!invalid.success);
}

#[tokio::test]
async fn test_page_actions_fail_after_unload() {
    let (host, engine) = host_for(Vec::new());

    let unload = host.handle_command(json!({"action": "page.unload"})).await;
    assert_eq!(unload.message.as_deref(), Some("Page unloaded"));
    assert!(engine.page.is_discarded());

    let after = host
        .handle_command(json!({"action": "page.navigate", "url": "/"}))
        .await;
    assert_eq!(after.error.as_deref(), Some("Page has been unloaded"));
}

#[tokio::test]
async fn test_serve_answers_every_line() {
    let (host, _engine) = host_for(vec![script(5, "1", TriggerMode::event("click"))]);
    let input = concat!(
        r#"{"action": "initializeScripts", "requestId": 1}"#,
        "\n",
        "\n",
        r#"{"action": "bogus", "requestId": 2}"#,
        "\n",
        r#"{"action": "executeScript", "script": {"id": 6, "code": "'hi'"}, "requestId": 3}"#,
        "\n",
    );
    let mut output = Vec::new();

    host.serve(BufReader::new(input.as_bytes()), &mut output, None)
        .await
        .expect("serve should finish at end of input");

    let replies: Vec<Value> = String::from_utf8(output)
        .expect("output should be UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    assert_eq!(replies.len(), 3, "blank lines get no reply");

    let by_id = |id: i64| {
        replies
            .iter()
            .find(|r| r["requestId"] == json!(id))
            .unwrap_or_else(|| panic!("missing reply {id}"))
    };
    assert_eq!(by_id(1)["success"], json!(true));
    assert_eq!(by_id(2)["error"], json!("Unknown action: bogus"));
    assert_eq!(by_id(3)["output"], json!("hi"));
    assert!(host.manager().scheduler().is_armed(5));
}

#[test]
fn test_event_wire_format() {
    let fired = event_value(&TriggerEvent::Fired {
        script_id: 3,
        kind: inspectmaker::config::TriggerKind::AjaxInterceptor,
    });
    assert_eq!(
        fired,
        json!({"event": "fired", "scriptId": 3, "kind": "ajaxInterceptor"})
    );

    let executed = event_value(&TriggerEvent::Executed {
        script_id: 3,
        result: ExecutionResult::failure("boom"),
    });
    assert_eq!(
        executed,
        json!({"event": "executed", "scriptId": 3, "success": false, "error": "boom"})
    );
}
