//! Runs code in the page's main world from the isolated world.
//!
//! Three transports are available, chosen per script and browser:
//!
//! - **standard**: load the bridge script through `<script src>`, then post an
//!   `execute` message; the bridge evaluates the code and posts a `result`.
//! - **eval-injection**: inline the code into a `<script>` element that
//!   evaluates it and posts the same `result` message. Useful when the bridge
//!   resource cannot be exposed. The element is removed once the reply lands.
//! - **browser-api**: the browser's native execute-in-page call. Firefox
//!   offers a promise-based call, Chrome and Edge a callback-based one keyed
//!   by tab id. Falls back to standard whenever the call is unavailable or
//!   fails.

use inspectmaker_config::{BridgeMethod, BrowserKind, ScriptDefinition};
use inspectmaker_page::{Evaluation, NativeApi, Page, ScriptElement};
use serde_json::Value;

use crate::channel::ResultChannel;
use crate::error::BridgeError;
use crate::protocol::{BridgeMessage, ExecutionRequest, ExecutionResult};

/// Source of the bridge script the page must expose at the bridge resource URL.
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Executes code in one page's main world.
pub struct ExecutionBridge {
    page: Page,
    channel: ResultChannel,
    browser: BrowserKind,
    resource_url: String,
}

impl ExecutionBridge {
    pub fn new(page: Page, browser: BrowserKind, resource_url: impl Into<String>) -> Self {
        Self {
            channel: ResultChannel::new(page.clone()),
            page,
            browser,
            resource_url: resource_url.into(),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn channel(&self) -> &ResultChannel {
        &self.channel
    }

    /// Run `script` once with the method it prefers on this browser.
    ///
    /// Never fails: every error becomes `{success: false, error}`.
    pub async fn execute(
        &self,
        script: &ScriptDefinition,
        context: Option<Value>,
    ) -> ExecutionResult {
        let method = script.bridge_method(self.browser);
        let request = ExecutionRequest::new(script.id, script.code.clone()).with_context(context);
        match self.run(&request, method).await {
            Ok(output) => ExecutionResult::ok(output),
            Err(e) => {
                log::warn!("Script {} failed: {}", script.id, e);
                ExecutionResult::failure(e.to_string())
            }
        }
    }

    /// Run one request. Resolves exactly once with the completion value
    /// (`None` for `undefined`) or the reason there is none.
    pub async fn run(
        &self,
        request: &ExecutionRequest,
        method: BridgeMethod,
    ) -> Result<Option<String>, BridgeError> {
        log::debug!(
            "Executing script {} via {} on {}",
            request.script_id,
            method,
            self.browser
        );
        match method {
            BridgeMethod::BrowserApi => match self.run_native(request).await {
                Some(outcome) => outcome,
                None => self.run_standard(request).await,
            },
            BridgeMethod::EvalInjection => self.run_eval_injection(request).await,
            BridgeMethod::Standard => self.run_standard(request).await,
        }
    }

    /// `None` means the native call is unusable here and the caller should
    /// fall back to the standard bridge.
    async fn run_native(
        &self,
        request: &ExecutionRequest,
    ) -> Option<Result<Option<String>, BridgeError>> {
        let usable = match (self.browser, self.page.native_api()) {
            (BrowserKind::Firefox, Some(NativeApi::Promise)) => true,
            (BrowserKind::Chrome | BrowserKind::Edge, Some(NativeApi::Callback { .. })) => true,
            _ => false,
        };
        if !usable {
            log::debug!(
                "Native execution API unavailable on {}, using standard bridge",
                self.browser
            );
            return None;
        }

        match self
            .page
            .execute_native(&request.code, request.context.as_ref())
            .await
        {
            Ok(evaluation) => Some(evaluation_output(evaluation)),
            Err(e) => {
                log::warn!(
                    "Native execution failed for script {}: {}; falling back to standard bridge",
                    request.script_id,
                    e
                );
                None
            }
        }
    }

    async fn run_standard(&self, request: &ExecutionRequest) -> Result<Option<String>, BridgeError> {
        let pending = self.channel.open(request.script_id);

        let load = self.page.insert_script(ScriptElement::External {
            src: self.resource_url.clone(),
        });
        let element = load.id();
        let loaded = load.loaded().await;
        self.page.remove_script(element);
        loaded.map_err(BridgeError::LoadFailed)?;

        let message = BridgeMessage::Execute {
            script_id: request.script_id,
            call_id: pending.call_id().to_string(),
            code: request.code.clone(),
            context: request.context.clone(),
        };
        self.page.post_message(serde_json::to_value(&message)?)?;
        pending.wait().await
    }

    async fn run_eval_injection(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Option<String>, BridgeError> {
        let pending = self.channel.open(request.script_id);
        let text = eval_injection_source(request, pending.call_id())?;

        let load = self.page.insert_script(ScriptElement::Inline { text });
        let element = load.id();
        if let Err(e) = load.loaded().await {
            self.page.remove_script(element);
            return Err(BridgeError::LoadFailed(e));
        }

        let outcome = pending.wait().await;
        self.page.remove_script(element);
        outcome
    }
}

fn evaluation_output(evaluation: Evaluation) -> Result<Option<String>, BridgeError> {
    if evaluation.success {
        Ok(evaluation.result)
    } else {
        Err(BridgeError::Execution(
            evaluation
                .error
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

/// Inline script that evaluates the request and posts a `result` message.
fn eval_injection_source(request: &ExecutionRequest, call_id: &str) -> Result<String, BridgeError> {
    let code = serde_json::to_string(&request.code)?;
    let context = request
        .context
        .as_ref()
        .map_or_else(|| "undefined".to_string(), Value::to_string);
    let reply = serde_json::json!({
        "action": "result",
        "scriptId": request.script_id,
        "callId": call_id,
    });
    // The code runs in an inner function of its own: its declarations stay
    // local to it and cannot replace the reply object.
    Ok(format!(
        "(function (reply) {{
  try {{
    var value = (function (__code, context) {{
      return eval(__code);
    }})({code}, {context});
    reply.success = true;
    if (value !== undefined) {{
      reply.result = String(value);
    }}
  }} catch (e) {{
    reply.success = false;
    reply.error = e instanceof Error ? e.message : String(e);
  }}
  window.postMessage(reply, '*');
}})({reply});
"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_injection_source_embeds_request() {
        let request = ExecutionRequest::new(9, "document.title = \"a\";");
        let source = eval_injection_source(&request, "call-1").unwrap();
        assert!(source.contains(r#""callId":"call-1""#));
        assert!(source.contains(r#""scriptId":9"#));
        assert!(source.contains(r#"("document.title = \"a\";", undefined)"#));
    }
}
