//! Scripted runner for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{CommandOutput, CommandRunner, GitCommand};
use crate::error::{GitError, Result};

/// Answers each command (keyed by its space-joined args) with canned
/// output and records every invocation. Unknown commands print nothing
/// and exit 0.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    failures: Mutex<HashMap<String, GitError>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, args: &str, text: &str) {
        self.respond_with(args, text, 0);
    }

    pub fn respond_with(&self, args: &str, text: &str, exit_code: i32) {
        self.responses.lock().unwrap().insert(
            args.to_string(),
            CommandOutput {
                text: text.to_string(),
                exit_code,
            },
        );
    }

    /// Make `args` fail as if the process could not run
    pub fn fail(&self, args: &str, error: GitError) {
        self.failures
            .lock()
            .unwrap()
            .insert(args.to_string(), error);
    }

    /// Block the next call of `args` until a permit is added to the
    /// returned semaphore
    ///
    /// The blocked call's output is the response configured when the call
    /// started.
    pub fn hold(&self, args: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(args.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput> {
        let key = command.args().join(" ");
        self.calls.lock().unwrap().push(key.clone());

        let failure = self.failures.lock().unwrap().get(&key).cloned();
        let response = self.responses.lock().unwrap().get(&key).cloned();

        let gate = self.gates.lock().unwrap().remove(&key);
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        if let Some(error) = failure {
            return Err(error.into());
        }
        Ok(response.unwrap_or(CommandOutput {
            text: String::new(),
            exit_code: 0,
        }))
    }
}
