// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Minimal stack machine gating spends.
//!
//! A spend runs the spending transaction's `unlock` script followed by the
//! spent transaction's `lock` script on one shared stack. The spend passes
//! iff both scripts run to completion and exactly one truthy element is
//! left. Any malformed script fails.

mod opcodes;
mod script;
mod sig_verification;

pub use opcodes::*;
pub use script::*;
pub use sig_verification::*;

use crate::primitives::{Hash256, Transaction};

const SCRIPT_HASH_KEY: &str = "script";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScriptErr {
    InvalidOpcode(u8),
    ScriptTooLong,
    PushPastEnd,
    ElementTooLarge,
    StackUnderflow,
    StackOverflow,
    OpLimitExceeded,
    VerifyFailed,
    EarlyReturn,

    /// Execution finished without exactly one truthy element on the stack
    Falsy,
}

/// Transactions a script is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    /// Output being spent, owner of the lock script
    pub spent: &'a Transaction,

    /// Transaction spending it, owner of the unlock script
    pub spending: &'a Transaction,
}

/// Runs `spending.unlock` then `spent.lock`.
pub fn verify_spend(spent: &Transaction, spending: &Transaction) -> Result<(), ScriptErr> {
    let ctx = ScriptContext { spent, spending };
    let mut vm = Vm::new(ctx);
    vm.run(&spending.unlock)?;
    vm.run(&spent.lock)?;

    match vm.stack.as_slice() {
        [top] if is_truthy(top) => Ok(()),
        _ => Err(ScriptErr::Falsy),
    }
}

#[must_use]
pub fn is_truthy(element: &[u8]) -> bool {
    element.iter().any(|b| *b != 0)
}

struct Vm<'a> {
    stack: Vec<Vec<u8>>,
    ctx: ScriptContext<'a>,
}

impl<'a> Vm<'a> {
    fn new(ctx: ScriptContext<'a>) -> Self {
        Self {
            stack: Vec::new(),
            ctx,
        }
    }

    fn run(&mut self, script: &[u8]) -> Result<(), ScriptErr> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptErr::ScriptTooLong);
        }

        let mut pc = 0;
        let mut ops = 0;

        while pc < script.len() {
            let op = script[pc];
            pc += 1;

            match op {
                OP_0 => self.push(Vec::new())?,

                0x01..=OP_PUSHBYTES_MAX => {
                    let data = read(script, &mut pc, op as usize)?;
                    self.push(data)?;
                }

                OP_PUSHDATA1 => {
                    let len = read(script, &mut pc, 1)?[0] as usize;
                    let data = read(script, &mut pc, len)?;
                    self.push(data)?;
                }

                _ => {
                    ops += 1;
                    if ops > MAX_OPS_PER_SCRIPT {
                        return Err(ScriptErr::OpLimitExceeded);
                    }

                    self.exec(op)?;
                }
            }
        }

        Ok(())
    }

    fn exec(&mut self, op: u8) -> Result<(), ScriptErr> {
        match op {
            OP_TRUE => self.push(vec![1]),
            OP_NOP => Ok(()),
            OP_RETURN => Err(ScriptErr::EarlyReturn),

            OP_VERIFY => {
                let top = self.pop()?;
                if is_truthy(&top) {
                    Ok(())
                } else {
                    Err(ScriptErr::VerifyFailed)
                }
            }

            OP_DROP => self.pop().map(|_| ()),

            OP_DUP => {
                let top = self.stack.last().ok_or(ScriptErr::StackUnderflow)?.clone();
                self.push(top)
            }

            OP_EQUAL | OP_EQUALVERIFY => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push_bool(a == b)?;

                if op == OP_EQUALVERIFY {
                    self.exec(OP_VERIFY)?;
                }

                Ok(())
            }

            OP_HASH256 => {
                let top = self.pop()?;
                let hash = Hash256::hash_from_slice(top, SCRIPT_HASH_KEY);
                self.push(hash.0.to_vec())
            }

            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let pub_key = self.pop()?;
                let signature = self.pop()?;
                let message = self.ctx.spending.sighash();
                let valid =
                    verify_single_ed25519(&pub_key, &signature, message.as_bytes()).is_ok();
                self.push_bool(valid)?;

                if op == OP_CHECKSIGVERIFY {
                    self.exec(OP_VERIFY)?;
                }

                Ok(())
            }

            other => Err(ScriptErr::InvalidOpcode(other)),
        }
    }

    fn push(&mut self, element: Vec<u8>) -> Result<(), ScriptErr> {
        if element.len() > MAX_ELEMENT_SIZE {
            return Err(ScriptErr::ElementTooLarge);
        }

        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(ScriptErr::StackOverflow);
        }

        self.stack.push(element);
        Ok(())
    }

    fn push_bool(&mut self, value: bool) -> Result<(), ScriptErr> {
        self.push(if value { vec![1] } else { Vec::new() })
    }

    fn pop(&mut self) -> Result<Vec<u8>, ScriptErr> {
        self.stack.pop().ok_or(ScriptErr::StackUnderflow)
    }
}

fn read(script: &[u8], pc: &mut usize, len: usize) -> Result<Vec<u8>, ScriptErr> {
    let end = pc.checked_add(len).ok_or(ScriptErr::PushPastEnd)?;
    let data = script.get(*pc..end).ok_or(ScriptErr::PushPastEnd)?;
    *pc = end;
    Ok(data.to_vec())
}
