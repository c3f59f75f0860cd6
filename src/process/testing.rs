use std::path::Path;
use std::sync::Mutex;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use super::runner::{Invocation, ProcessOutput, ProcessRunner};

type Script = Box<dyn Fn(&Invocation) -> ProcessOutput + Send + Sync>;

/// Runner whose behaviour is a closure over the invocation. Records every call.
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&Invocation) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn exit(code: i32) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        ..Default::default()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation, _cancel: &CancellationToken) -> Result<ProcessOutput, FuzzchainError> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.script)(invocation))
    }

    fn add_search_path(&self, _dir: &Path) {}
}
