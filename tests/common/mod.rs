#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use sybase_rust::{LastErrorSource, NativeExtension, NativeFunction, NativeValue};

#[derive(Default)]
struct ErrorState {
    message: Option<String>,
    clears: usize,
}

/// In-memory last-error slot shared between a test and its fake native layer.
#[derive(Clone, Default)]
pub struct FakeErrors(Rc<RefCell<ErrorState>>);

impl FakeErrors {
    pub fn set(&self, message: &str) {
        self.0.borrow_mut().message = Some(message.to_string());
    }

    pub fn clears(&self) -> usize {
        self.0.borrow().clears
    }
}

impl LastErrorSource for FakeErrors {
    fn clear(&self) {
        let mut state = self.0.borrow_mut();
        state.message = None;
        state.clears += 1;
    }

    fn last_message(&self) -> Option<String> {
        self.0.borrow().message.clone()
    }
}

pub enum Reply {
    Value(NativeValue),
    /// Records the message in the error slot, then returns `false`.
    Fail(&'static str),
    /// Returns `false` without recording anything.
    SilentFail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: NativeFunction,
    pub args: Vec<NativeValue>,
    /// Error slot contents at the moment the native function ran.
    pub slot_at_call: Option<String>,
}

/// Native layer that answers from a script and records every call.
pub struct FakeNative {
    errors: FakeErrors,
    script: VecDeque<Reply>,
    pub calls: Vec<Call>,
}

impl FakeNative {
    pub fn new(errors: &FakeErrors) -> Self {
        FakeNative {
            errors: errors.clone(),
            script: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.script.push_back(reply);
        self
    }

    pub fn returning(self, value: impl Into<NativeValue>) -> Self {
        self.reply(Reply::Value(value.into()))
    }
}

impl NativeExtension for FakeNative {
    fn call(&mut self, function: NativeFunction, args: &[NativeValue]) -> NativeValue {
        self.calls.push(Call {
            function,
            args: args.to_vec(),
            slot_at_call: self.errors.last_message(),
        });
        match self.script.pop_front() {
            Some(Reply::Value(value)) => value,
            Some(Reply::Fail(message)) => {
                self.errors.set(message);
                NativeValue::Bool(false)
            }
            Some(Reply::SilentFail) => NativeValue::Bool(false),
            None => NativeValue::Bool(true),
        }
    }
}
