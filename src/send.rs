//! Two-phase message send flow: insert the user message, then invoke the
//! server-side response-generation action, compensating with a bot-authored
//! fallback message whenever the user would otherwise see no reply.

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::models::{ActionReply, Message};

/// Fixed reply inserted when response generation fails after a successful
/// user-message insert.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble connecting to the AI service right now. Please try again later.";

/// Phases of the send flow, in transition order. `Compensating` is entered
/// from either of the two fallible phases; `Failed` is terminal only when
/// the user message itself was never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Inserting,
    Invoking,
    Compensating,
    Done,
    Failed,
}

/// Gateway operations the send flow depends on. Single-threaded wasm, so
/// the futures are not `Send`.
#[async_trait(?Send)]
pub trait SendOps {
    async fn insert_message(
        &self,
        chat_id: &str,
        content: &str,
        is_bot: bool,
    ) -> Result<Message, GatewayError>;

    async fn generate_response(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<ActionReply, GatewayError>;
}

/// How one send attempt ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// User message stored and the action reported success.
    Delivered,
    /// User message stored, but response generation failed; the apology
    /// fallback was attempted so the thread still shows a reply.
    Degraded { reason: String },
    /// The user message itself could not be stored. The action was never
    /// invoked.
    InsertFailed { error: String },
}

/// Outcome plus the phase trace the flow went through.
#[derive(Debug)]
pub struct SendReport {
    pub outcome: SendOutcome,
    pub phases: Vec<SendPhase>,
}

/// Drive one send to completion. The insert is always awaited before the
/// action is invoked; fallback inserts are best-effort and their own
/// failures are only logged.
pub async fn run_send<O: SendOps + ?Sized>(ops: &O, chat_id: &str, content: &str) -> SendReport {
    let mut phases = vec![SendPhase::Idle, SendPhase::Inserting];

    if let Err(e) = ops.insert_message(chat_id, content, false).await {
        phases.push(SendPhase::Compensating);
        let note = format!("Error: {e}. Your message could not be delivered.");
        if let Err(fallback_err) = ops.insert_message(chat_id, &note, true).await {
            log::error!("Fallback message insert failed: {fallback_err}");
        }
        phases.push(SendPhase::Failed);
        return SendReport {
            outcome: SendOutcome::InsertFailed { error: e.to_string() },
            phases,
        };
    }

    phases.push(SendPhase::Invoking);
    let failure = match ops.generate_response(chat_id, content).await {
        Ok(reply) if reply.success => None,
        Ok(reply) => Some(
            reply
                .message
                .unwrap_or_else(|| "response generation reported failure".to_string()),
        ),
        Err(e) => Some(e.to_string()),
    };

    match failure {
        None => {
            phases.push(SendPhase::Done);
            SendReport { outcome: SendOutcome::Delivered, phases }
        }
        Some(reason) => {
            phases.push(SendPhase::Compensating);
            if let Err(fallback_err) = ops.insert_message(chat_id, FALLBACK_REPLY, true).await {
                log::error!("Fallback message insert failed: {fallback_err}");
            }
            phases.push(SendPhase::Done);
            SendReport { outcome: SendOutcome::Degraded { reason }, phases }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::RefCell;

    #[derive(Clone, Debug, PartialEq)]
    struct InsertCall {
        chat_id: String,
        content: String,
        is_bot: bool,
    }

    #[derive(Default)]
    struct MockOps {
        inserts: RefCell<Vec<InsertCall>>,
        action_calls: RefCell<u32>,
        fail_user_insert: bool,
        fail_bot_insert: bool,
        action_result: Option<Result<ActionReply, GatewayError>>,
    }

    impl MockOps {
        fn action_ok(success: bool, message: Option<&str>) -> Self {
            Self {
                action_result: Some(Ok(ActionReply {
                    success,
                    message: message.map(str::to_string),
                    response: None,
                })),
                ..Self::default()
            }
        }

        fn user_inserts(&self) -> Vec<InsertCall> {
            self.inserts.borrow().iter().filter(|c| !c.is_bot).cloned().collect()
        }

        fn bot_inserts(&self) -> Vec<InsertCall> {
            self.inserts.borrow().iter().filter(|c| c.is_bot).cloned().collect()
        }
    }

    #[async_trait(?Send)]
    impl SendOps for MockOps {
        async fn insert_message(
            &self,
            chat_id: &str,
            content: &str,
            is_bot: bool,
        ) -> Result<Message, GatewayError> {
            if (is_bot && self.fail_bot_insert) || (!is_bot && self.fail_user_insert) {
                return Err(GatewayError::Network("insert refused".into()));
            }
            self.inserts.borrow_mut().push(InsertCall {
                chat_id: chat_id.to_string(),
                content: content.to_string(),
                is_bot,
            });
            Ok(Message {
                id: format!("m{}", self.inserts.borrow().len()),
                content: content.to_string(),
                is_bot,
                created_at: String::new(),
            })
        }

        async fn generate_response(
            &self,
            _chat_id: &str,
            _content: &str,
        ) -> Result<ActionReply, GatewayError> {
            *self.action_calls.borrow_mut() += 1;
            self.action_result
                .clone()
                .unwrap_or(Err(GatewayError::Network("no action configured".into())))
        }
    }

    #[test]
    fn delivered_inserts_exactly_one_user_message() {
        let ops = MockOps::action_ok(true, None);
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert_eq!(report.outcome, SendOutcome::Delivered);
        assert_eq!(
            report.phases,
            vec![SendPhase::Idle, SendPhase::Inserting, SendPhase::Invoking, SendPhase::Done]
        );
        assert_eq!(ops.user_inserts().len(), 1);
        assert_eq!(ops.user_inserts()[0].content, "Hello");
        assert!(ops.bot_inserts().is_empty());
        assert_eq!(*ops.action_calls.borrow(), 1);
    }

    #[test]
    fn action_reporting_failure_triggers_apology_fallback() {
        let ops = MockOps::action_ok(false, Some("down"));
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert_eq!(report.outcome, SendOutcome::Degraded { reason: "down".into() });
        assert_eq!(
            report.phases,
            vec![
                SendPhase::Idle,
                SendPhase::Inserting,
                SendPhase::Invoking,
                SendPhase::Compensating,
                SendPhase::Done,
            ]
        );
        assert_eq!(ops.user_inserts().len(), 1);
        let bots = ops.bot_inserts();
        assert_eq!(bots.len(), 1);
        assert_eq!(bots[0].content, FALLBACK_REPLY);
    }

    #[test]
    fn action_error_triggers_apology_fallback() {
        let ops = MockOps {
            action_result: Some(Err(GatewayError::Status(502))),
            ..MockOps::default()
        };
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert!(matches!(report.outcome, SendOutcome::Degraded { .. }));
        assert_eq!(ops.bot_inserts().len(), 1);
        assert_eq!(ops.bot_inserts()[0].content, FALLBACK_REPLY);
    }

    #[test]
    fn failed_insert_never_invokes_the_action() {
        let ops = MockOps { fail_user_insert: true, ..MockOps::default() };
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert!(matches!(report.outcome, SendOutcome::InsertFailed { .. }));
        assert_eq!(*report.phases.last().unwrap(), SendPhase::Failed);
        assert_eq!(*ops.action_calls.borrow(), 0);
        // The error-describing bot message was attempted.
        let bots = ops.bot_inserts();
        assert_eq!(bots.len(), 1);
        assert!(bots[0].content.starts_with("Error: "));
    }

    #[test]
    fn fallback_failure_does_not_mask_the_outcome() {
        let ops = MockOps {
            fail_user_insert: true,
            fail_bot_insert: true,
            ..MockOps::default()
        };
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert!(matches!(report.outcome, SendOutcome::InsertFailed { .. }));
        assert!(ops.inserts.borrow().is_empty());
        assert_eq!(*ops.action_calls.borrow(), 0);
    }

    #[test]
    fn degraded_fallback_failure_keeps_degraded_outcome() {
        let ops = MockOps {
            fail_bot_insert: true,
            action_result: Some(Ok(ActionReply { success: false, message: None, response: None })),
            ..MockOps::default()
        };
        let report = block_on(run_send(&ops, "c1", "Hello"));

        assert!(matches!(report.outcome, SendOutcome::Degraded { .. }));
        assert_eq!(ops.user_inserts().len(), 1);
        assert!(ops.bot_inserts().is_empty());
    }
}
