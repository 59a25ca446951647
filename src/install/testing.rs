//! Scripted command runner shared by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use super::process::{CommandOutput, CommandRunner, Invocation};

type Responder = Box<dyn Fn(&Invocation) -> Option<CommandOutput>>;

/// Records every invocation; answers from per-program queues, then from
/// responders, then with success.
#[derive(Default)]
pub(crate) struct FakeRunner {
    pub calls: RefCell<Vec<Invocation>>,
    scripted: RefCell<Vec<(String, VecDeque<CommandOutput>)>>,
    responders: Vec<Responder>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outputs for invocations whose rendered command line contains `needle`
    pub fn script(self, needle: &str, outputs: impl IntoIterator<Item = CommandOutput>) -> Self {
        self.scripted
            .borrow_mut()
            .push((needle.to_string(), outputs.into_iter().collect()));
        self
    }

    pub fn respond(mut self, f: impl Fn(&Invocation) -> Option<CommandOutput> + 'static) -> Self {
        self.responders.push(Box::new(f));
        self
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.to_string().contains(needle))
            .cloned()
            .collect()
    }

    fn answer(&self, invocation: &Invocation) -> CommandOutput {
        self.calls.borrow_mut().push(invocation.clone());
        let line = invocation.to_string();

        for (needle, queue) in self.scripted.borrow_mut().iter_mut() {
            if line.contains(needle.as_str()) {
                if let Some(output) = queue.pop_front() {
                    return output;
                }
            }
        }
        for responder in &self.responders {
            if let Some(output) = responder(invocation) {
                return output;
            }
        }
        ok("")
    }
}

impl CommandRunner for FakeRunner {
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        Ok(self.answer(invocation))
    }

    fn attach(&self, invocation: &Invocation) -> io::Result<Option<i32>> {
        Ok(self.answer(invocation).code)
    }
}

pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub(crate) fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
