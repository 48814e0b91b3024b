//! Tool dispatcher: validate arguments, run the handler, normalize the result.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    envelope::{ErrorKind, RequestEnvelope, ResponseEnvelope},
    mail::{MailError, MailSender},
    registry::{FIELD_BODY, FIELD_RECIPIENT, FIELD_SUBJECT, InputSchema, ToolKind, ToolRegistry},
    templates::{HALLOWEEN_INVITATION, SYSTEM_ALERT, Template},
};

/// Failure before the mail sender is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rejection {
    kind: ErrorKind,
    message: String,
}

impl Rejection {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidArguments,
            message: message.into(),
        }
    }
}

/// The message a handler resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outbound {
    to: String,
    subject: String,
    body: String,
}

/// Routes tool calls to their handlers.
///
/// `dispatch` never fails: every outcome, including a panicking sender,
/// becomes a [`ResponseEnvelope`].
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    sender: Arc<dyn MailSender>,
}

impl ToolDispatcher {
    /// Create a dispatcher over a registry and a mail sender.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, sender: Arc<dyn MailSender>) -> Self {
        Self { registry, sender }
    }

    /// The tool catalog this dispatcher serves.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Sender identity of the underlying mail sender.
    #[must_use]
    pub fn sender_identity(&self) -> &str {
        self.sender.sender_identity()
    }

    /// Dispatch one tool call.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let RequestEnvelope {
            request_id,
            session_id,
            tool_name,
            arguments,
        } = request;

        let outbound = match self.resolve(&tool_name, &arguments) {
            Ok(outbound) => outbound,
            Err(rejection) => {
                tracing::warn!(
                    %session_id,
                    ?request_id,
                    tool = %tool_name,
                    kind = %rejection.kind,
                    "Tool call rejected: {}",
                    rejection.message
                );
                return ResponseEnvelope::error(request_id, rejection.kind, rejection.message);
            }
        };

        tracing::info!(
            %session_id,
            ?request_id,
            tool = %tool_name,
            to = %outbound.to,
            "Sending email"
        );

        match self.send_blocking(outbound.clone()).await {
            Ok(()) => {
                tracing::info!(%session_id, ?request_id, to = %outbound.to, "Email sent");
                ResponseEnvelope::success(request_id, format!("Email sent to {}", outbound.to))
            }
            Err(e) => {
                tracing::error!(
                    %session_id,
                    ?request_id,
                    tool = %tool_name,
                    kind = %e.kind,
                    "Email send failed: {}",
                    e.detail
                );
                ResponseEnvelope::from_mail_error(request_id, &e)
            }
        }
    }

    fn resolve(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Outbound, Rejection> {
        let tool = self.registry.lookup(tool_name).map_err(|e| Rejection {
            kind: ErrorKind::UnknownTool,
            message: e.to_string(),
        })?;

        validate(&tool.input_schema, arguments)?;

        let to = string_arg(arguments, FIELD_RECIPIENT)?;
        if to.trim().is_empty() {
            return Err(Rejection::invalid(format!("field `{FIELD_RECIPIENT}` must not be empty")));
        }

        let outbound = match tool.kind {
            ToolKind::SendEmail => Outbound {
                to,
                subject: string_arg(arguments, FIELD_SUBJECT)?,
                body: string_arg(arguments, FIELD_BODY)?,
            },
            ToolKind::HalloweenInvitation => templated(to, HALLOWEEN_INVITATION),
            ToolKind::SystemAlert => templated(to, SYSTEM_ALERT),
        };
        Ok(outbound)
    }

    /// Run the blocking relay call on the blocking pool so it cannot stall
    /// the executor thread servicing other sessions.
    async fn send_blocking(&self, outbound: Outbound) -> Result<(), MailError> {
        let sender = Arc::clone(&self.sender);
        tokio::task::spawn_blocking(move || {
            sender.send(&outbound.to, &outbound.subject, &outbound.body)
        })
        .await
        .unwrap_or_else(|e| Err(MailError::unknown(format!("mail worker failed: {e}"))))
    }
}

fn templated(to: String, template: Template) -> Outbound {
    Outbound {
        to,
        subject: template.subject.to_string(),
        body: template.body.to_string(),
    }
}

/// Check required fields and types. Fields outside the schema are ignored.
fn validate(schema: &InputSchema, arguments: &Map<String, Value>) -> Result<(), Rejection> {
    for field in &schema.fields {
        match arguments.get(field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(Rejection::invalid(format!(
                    "missing required field `{}`",
                    field.name
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) if !field.field_type.accepts(value) => {
                return Err(Rejection::invalid(format!(
                    "field `{}` must be a string",
                    field.name
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn string_arg(arguments: &Map<String, Value>, name: &str) -> Result<String, Rejection> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Rejection::invalid(format!("missing required field `{name}`")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::{
        envelope::ResponsePayload,
        registry::{TOOL_HALLOWEEN_INVITATION, TOOL_SEND_EMAIL, TOOL_SYSTEM_ALERT},
    };

    /// Records every send; optionally fails.
    #[derive(Default)]
    struct FakeSender {
        calls: Mutex<Vec<(String, String, String)>>,
        fail_with: Option<MailError>,
    }

    impl MailSender for FakeSender {
        fn sender_identity(&self) -> &str {
            "bot@example.com"
        }

        fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            self.calls
                .lock()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            self.fail_with.clone().map_or(Ok(()), Err)
        }
    }

    struct PanickingSender;

    impl MailSender for PanickingSender {
        fn sender_identity(&self) -> &str {
            "bot@example.com"
        }

        fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            panic!("relay exploded");
        }
    }

    fn dispatcher(sender: Arc<FakeSender>) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(ToolRegistry::builtin().unwrap()), sender)
    }

    fn call(tool: &str, args: Value) -> RequestEnvelope {
        let Value::Object(arguments) = args else {
            panic!("arguments must be an object");
        };
        RequestEnvelope::new(1, Uuid::new_v4(), tool, arguments)
    }

    fn full_args() -> Value {
        json!({"recipient": "a@b.com", "subject": "S", "body": "B"})
    }

    #[tokio::test]
    async fn test_send_email_passes_arguments_through() {
        let sender = Arc::new(FakeSender::default());
        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call(TOOL_SEND_EMAIL, full_args()))
            .await;

        assert_eq!(
            resp.payload,
            ResponsePayload::Success {
                message: "Email sent to a@b.com".into()
            }
        );
        assert_eq!(resp.request_id, json!(1));
        assert_eq!(
            *sender.calls.lock(),
            vec![("a@b.com".into(), "S".into(), "B".into())]
        );
    }

    #[tokio::test]
    async fn test_send_email_missing_field_names_it() {
        for missing in ["recipient", "subject", "body"] {
            let sender = Arc::new(FakeSender::default());
            let mut args = full_args();
            args.as_object_mut().unwrap().remove(missing);

            let resp = dispatcher(Arc::clone(&sender))
                .dispatch(call(TOOL_SEND_EMAIL, args))
                .await;

            let ResponsePayload::Error { kind, message } = resp.payload else {
                panic!("expected error for missing {missing}");
            };
            assert_eq!(kind, ErrorKind::InvalidArguments);
            assert!(message.contains(missing), "{message}");
            assert!(sender.calls.lock().is_empty());
        }
    }

    #[tokio::test]
    async fn test_type_mismatch_is_invalid_arguments() {
        let sender = Arc::new(FakeSender::default());
        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call(
                TOOL_SEND_EMAIL,
                json!({"recipient": "a@b.com", "subject": 42, "body": "B"}),
            ))
            .await;

        let ResponsePayload::Error { kind, message } = resp.payload else {
            panic!("expected error");
        };
        assert_eq!(kind, ErrorKind::InvalidArguments);
        assert!(message.contains("subject"));
    }

    #[tokio::test]
    async fn test_empty_subject_and_body_are_allowed() {
        let sender = Arc::new(FakeSender::default());
        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call(
                TOOL_SEND_EMAIL,
                json!({"recipient": "a@b.com", "subject": "", "body": ""}),
            ))
            .await;
        assert!(!resp.is_error());

        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call(
                TOOL_SEND_EMAIL,
                json!({"recipient": "  ", "subject": "S", "body": "B"}),
            ))
            .await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::InvalidArguments));
        assert_eq!(sender.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_sends() {
        let sender = Arc::new(FakeSender::default());
        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call("send_everything", full_args()))
            .await;

        assert_eq!(resp.error_kind(), Some(ErrorKind::UnknownTool));
        assert!(sender.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_templated_tools_ignore_caller_subject_and_body() {
        let cases = [
            (TOOL_HALLOWEEN_INVITATION, HALLOWEEN_INVITATION),
            (TOOL_SYSTEM_ALERT, SYSTEM_ALERT),
        ];
        for (tool, template) in cases {
            let sender = Arc::new(FakeSender::default());
            let resp = dispatcher(Arc::clone(&sender))
                .dispatch(call(
                    tool,
                    json!({"recipient": "a@b.com", "subject": "pwned", "body": "click here"}),
                ))
                .await;

            assert!(!resp.is_error(), "{tool}: {resp:?}");
            assert_eq!(
                *sender.calls.lock(),
                vec![(
                    "a@b.com".to_string(),
                    template.subject.to_string(),
                    template.body.to_string()
                )]
            );
        }
    }

    #[tokio::test]
    async fn test_valid_calls_never_fail_validation() {
        let registry = ToolRegistry::builtin().unwrap();
        for tool in registry.list() {
            let sender = Arc::new(FakeSender::default());
            let resp = dispatcher(Arc::clone(&sender))
                .dispatch(call(tool.name, full_args()))
                .await;
            assert!(
                !matches!(
                    resp.error_kind(),
                    Some(ErrorKind::UnknownTool | ErrorKind::InvalidArguments)
                ),
                "{}: {resp:?}",
                tool.name
            );
        }
    }

    #[tokio::test]
    async fn test_mail_errors_keep_their_kind() {
        let sender = Arc::new(FakeSender {
            fail_with: Some(MailError::auth("535 5.7.8 Username and Password not accepted")),
            ..FakeSender::default()
        });
        let resp = dispatcher(Arc::clone(&sender))
            .dispatch(call(TOOL_SEND_EMAIL, full_args()))
            .await;

        assert_eq!(
            resp.payload,
            ResponsePayload::Error {
                kind: ErrorKind::AuthFailure,
                message: "535 5.7.8 Username and Password not accepted".into()
            }
        );
        assert_eq!(sender.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_sender_becomes_unknown_error() {
        let dispatcher = ToolDispatcher::new(
            Arc::new(ToolRegistry::builtin().unwrap()),
            Arc::new(PanickingSender),
        );
        let resp = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.dispatch(call(TOOL_SEND_EMAIL, full_args())),
        )
        .await
        .unwrap();
        assert_eq!(resp.error_kind(), Some(ErrorKind::Unknown));
    }
}
