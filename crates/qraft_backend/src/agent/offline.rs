use qraft_domain::{AgentEvent, truncate_message};

use super::runner::{AgentRunner, ExecuteParams, ExecutionControl, ExecutionHandle};
use crate::event_channel::event_channel;

const ECHO_MAX_CHARS: usize = 200;

/// Stand-in runner used when no agent backend is configured. Echoes the
/// prompt back so the queue and its consumers stay exercisable.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineAgentRunner;

impl AgentRunner for OfflineAgentRunner {
    fn execute(&self, params: ExecuteParams) -> ExecutionHandle {
        let (events, rx) = event_channel();
        let control = ExecutionControl::default();
        let observed = control.clone();
        let work = async move {
            if observed.is_cancelled() {
                events.push(AgentEvent::Completed {
                    success: false,
                    error: None,
                    last_assistant_message: None,
                });
                events.close();
                return;
            }
            events.push(AgentEvent::activity("Running without an agent backend..."));
            let echo = format!("Echo: {}", truncate_message(&params.prompt, ECHO_MAX_CHARS));
            events.push(AgentEvent::assistant_message(echo.clone()));
            events.push(AgentEvent::Completed {
                success: true,
                error: None,
                last_assistant_message: Some(echo),
            });
            events.close();
        };
        ExecutionHandle::new(rx, work, control)
    }
}
