//! Integration tests for the execution bridge: each method end to end
//! against a page's main world.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{PAGE_URL, page_at, script};
use inspectmaker::config::{BridgeMethod, BrowserKind, TriggerMode};
use inspectmaker::page::{NativeApi, Page};
use inspectmaker::scripting::{BRIDGE_SCRIPT, ExecutionBridge, ExecutionRequest, ExecutionResult};
use serde_json::json;

const RESOURCE_URL: &str = "inspectmaker://bridge.js";

fn bridge(page: &Page) -> ExecutionBridge {
    ExecutionBridge::new(page.clone(), BrowserKind::Chrome, RESOURCE_URL)
}

fn page_with_bridge() -> Page {
    Page::builder(PAGE_URL)
        .resource(RESOURCE_URL, BRIDGE_SCRIPT)
        .build()
}

#[tokio::test]
async fn test_standard_bridge_returns_completion_value() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    let result = bridge
        .execute(&script(1, "1+1", TriggerMode::Instantaneous), None)
        .await;

    assert_eq!(result, ExecutionResult::ok(Some("2".to_string())));
}

#[tokio::test]
async fn test_standard_bridge_reports_thrown_error() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    let result = bridge
        .execute(
            &script(2, "throw new Error('x')", TriggerMode::Instantaneous),
            None,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("x"));
    assert_eq!(result.output, None);
}

#[tokio::test]
async fn test_undefined_completion_has_no_output() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    let result = bridge
        .execute(&script(3, "var unused = 1;", TriggerMode::Instantaneous), None)
        .await;

    assert_eq!(result, ExecutionResult::ok(None));
}

#[tokio::test]
async fn test_standard_bridge_cleans_up_after_itself() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    bridge
        .execute(&script(4, "'done'", TriggerMode::Instantaneous), None)
        .await;

    let stats = page.stats();
    assert_eq!(stats.script_elements, 0, "bridge element should be removed");
    assert_eq!(bridge.channel().pending_count(), 0);
    assert!(!bridge.channel().is_listening(), "listener should be removed");
    assert_eq!(stats.message_listeners, 0);
}

#[tokio::test]
async fn test_context_is_visible_to_code() {
    let page = page_with_bridge();
    let bridge = bridge(&page);
    let request = ExecutionRequest::new(5, "context.url + ' ' + context.status")
        .with_context(Some(json!({"url": "/api/cart", "status": 200})));

    let output = bridge
        .run(&request, BridgeMethod::Standard)
        .await
        .expect("execution should succeed");

    assert_eq!(output.as_deref(), Some("/api/cart 200"));
}

#[tokio::test]
async fn test_missing_bridge_resource_fails_the_call() {
    let page = Page::new(PAGE_URL);
    let bridge = bridge(&page);

    let result = bridge
        .execute(&script(6, "1", TriggerMode::Instantaneous), None)
        .await;

    assert!(!result.success);
    let error = result.error.expect("load failure should carry an error");
    assert!(error.starts_with("Failed to load bridge script"), "{error}");
    assert_eq!(page.stats().script_elements, 0);
    assert_eq!(bridge.channel().pending_count(), 0);
}

#[tokio::test]
async fn test_eval_injection_runs_inline_and_removes_element() {
    let page = Page::new(PAGE_URL);
    let bridge = bridge(&page);
    let mut script = script(7, "[1, 2, 3].length", TriggerMode::Instantaneous);
    script
        .browser_specific_injection
        .insert(BrowserKind::Chrome, BridgeMethod::EvalInjection);

    let result = bridge.execute(&script, None).await;

    assert_eq!(result, ExecutionResult::ok(Some("3".to_string())));
    assert_eq!(page.stats().script_elements, 0);
}

#[tokio::test]
async fn test_eval_injection_reports_errors() {
    let page = Page::new(PAGE_URL);
    let bridge = bridge(&page);
    let request = ExecutionRequest::new(8, "missingFunction()");

    let err = bridge
        .run(&request, BridgeMethod::EvalInjection)
        .await
        .expect_err("calling an undefined function should fail");

    assert!(err.to_string().contains("missingFunction"), "{err}");
}

#[tokio::test]
async fn test_eval_injection_code_cannot_replace_the_reply() {
    let page = Page::new(PAGE_URL);
    let bridge = bridge(&page);
    let request = ExecutionRequest::new(17, "var reply = null; var __reply = null; 'kept'");

    let output = tokio::time::timeout(
        Duration::from_secs(10),
        bridge.run(&request, BridgeMethod::EvalInjection),
    )
    .await
    .expect("reply should arrive")
    .expect("execution should succeed");

    assert_eq!(output.as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_browser_api_uses_native_call_on_chrome() {
    let page = Page::builder(PAGE_URL)
        .native_api(NativeApi::Callback { tab_id: Some(7) })
        .build();
    let bridge = bridge(&page);

    // No bridge resource on this page: only the native path can succeed.
    let output = bridge
        .run(&ExecutionRequest::new(9, "6 * 7"), BridgeMethod::BrowserApi)
        .await
        .expect("native execution should succeed");

    assert_eq!(output.as_deref(), Some("42"));
    assert_eq!(page.stats().script_elements, 0);
}

#[tokio::test]
async fn test_browser_api_falls_back_without_tab() {
    let page = Page::builder(PAGE_URL)
        .resource(RESOURCE_URL, BRIDGE_SCRIPT)
        .native_api(NativeApi::Callback { tab_id: None })
        .build();
    let bridge = bridge(&page);

    let output = bridge
        .run(&ExecutionRequest::new(10, "'fallback'"), BridgeMethod::BrowserApi)
        .await
        .expect("standard fallback should succeed");

    assert_eq!(output.as_deref(), Some("fallback"));
}

#[tokio::test]
async fn test_browser_api_falls_back_without_native_api() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    let output = bridge
        .run(&ExecutionRequest::new(11, "1+1"), BridgeMethod::BrowserApi)
        .await
        .expect("standard fallback should succeed");

    assert_eq!(output.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_firefox_native_call_uses_promise_api() {
    let page = Page::builder(PAGE_URL)
        .native_api(NativeApi::Promise)
        .build();
    let bridge = ExecutionBridge::new(page.clone(), BrowserKind::Firefox, RESOURCE_URL);
    let mut script = script(12, "'from firefox'", TriggerMode::Instantaneous);
    script
        .browser_specific_injection
        .insert(BrowserKind::Firefox, BridgeMethod::BrowserApi);

    let result = bridge.execute(&script, None).await;

    assert_eq!(result, ExecutionResult::ok(Some("from firefox".to_string())));
}

#[tokio::test]
async fn test_method_preference_is_per_browser() {
    let page = page_with_bridge();
    let bridge = bridge(&page);
    let mut script = script(13, "'standard'", TriggerMode::Instantaneous);
    // A Firefox preference does not apply on Chrome.
    script
        .browser_specific_injection
        .insert(BrowserKind::Firefox, BridgeMethod::EvalInjection);

    assert_eq!(script.bridge_method(BrowserKind::Chrome), BridgeMethod::Standard);
    let result = bridge.execute(&script, None).await;
    assert_eq!(result, ExecutionResult::ok(Some("standard".to_string())));
}

#[tokio::test]
async fn test_concurrent_calls_for_one_script_are_correlated() {
    let page = page_with_bridge();
    let bridge = bridge(&page);

    let first = ExecutionRequest::new(14, "'first'");
    let second = ExecutionRequest::new(14, "'second'");
    let (a, b) = tokio::join!(
        bridge.run(&first, BridgeMethod::Standard),
        bridge.run(&second, BridgeMethod::Standard),
    );

    assert_eq!(a.expect("first call").as_deref(), Some("first"));
    assert_eq!(b.expect("second call").as_deref(), Some("second"));
    assert_eq!(bridge.channel().pending_count(), 0);
}

#[tokio::test]
async fn test_foreign_result_messages_are_ignored() {
    let page = page_with_bridge();
    let bridge = bridge(&page);
    let pending = bridge.channel().open(15);

    page.post_foreign_message(json!({
        "action": "result",
        "scriptId": 15,
        "callId": pending.call_id(),
        "success": true,
        "result": "spoofed",
    }))
    .expect("page is live");
    page.post_message(json!({
        "action": "result",
        "scriptId": 15,
        "callId": pending.call_id(),
        "success": true,
        "result": "genuine",
    }))
    .expect("page is live");

    let output = pending.wait().await.expect("reply should arrive");
    assert_eq!(output.as_deref(), Some("genuine"));
}

#[tokio::test]
async fn test_discarded_page_fails_fast() {
    let page = page_at(PAGE_URL);
    let bridge = ExecutionBridge::new(
        page.clone(),
        BrowserKind::Chrome,
        inspectmaker::config::EngineSettings::default().bridge_resource_url,
    );
    page.unload();

    let result = bridge
        .execute(&script(16, "1", TriggerMode::Instantaneous), None)
        .await;

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_unload_during_call_fails_instead_of_hanging() {
    let page = page_with_bridge();
    let bridge = Arc::new(bridge(&page));
    // The reply is swallowed, so only the unload can end the call.
    let script = script(18, "window.postMessage = function () {}; 1", TriggerMode::Instantaneous);

    let call = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.execute(&script, None).await })
    };
    tokio::time::timeout(Duration::from_secs(10), async {
        while bridge.channel().pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call should open");

    page.unload();

    let result = tokio::time::timeout(Duration::from_secs(10), call)
        .await
        .expect("call should finish after unload")
        .expect("call task should not panic");
    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(bridge.channel().pending_count(), 0);
}
