//! Scripted [`CloudCli`] fake for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::CloudCli;
use crate::error::ProviderError;

enum Scripted {
    Json(Value),
    Stderr(String),
}

/// Canned responses keyed by command-line prefix, first match wins.
/// Records every invocation so tests can assert on call order and routing.
pub struct FakeCli {
    responses: Mutex<Vec<(String, Scripted)>>,
    log: Mutex<Vec<String>>,
}

impl FakeCli {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Script a successful JSON response for commands starting with `prefix`.
    pub fn respond(self, prefix: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), Scripted::Json(value)));
        self
    }

    /// Script a non-zero exit with the given stderr for commands starting
    /// with `prefix`.
    pub fn fail(self, prefix: &str, stderr: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), Scripted::Stderr(stderr.to_string())));
        self
    }

    /// Every command line invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudCli for FakeCli {
    async fn invoke(&self, args: &[&str]) -> Result<Value, ProviderError> {
        let command = args.join(" ");
        self.log.lock().unwrap().push(command.clone());

        let responses = self.responses.lock().unwrap();
        for (prefix, scripted) in responses.iter() {
            if command.starts_with(prefix.as_str()) {
                return match scripted {
                    Scripted::Json(value) => Ok(value.clone()),
                    Scripted::Stderr(stderr) => Err(ProviderError::CommandFailed {
                        command,
                        stderr: stderr.clone(),
                    }),
                };
            }
        }

        Err(ProviderError::CommandFailed {
            command,
            stderr: "no scripted response".to_string(),
        })
    }
}
