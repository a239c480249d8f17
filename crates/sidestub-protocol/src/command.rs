//! Side-stub command types

use bytes::Bytes;

use crate::encoder;

/// A command sent to the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// vTR<symbol>
    TracepointGetRegisters { symbol: String },

    /// vTM<addr>,<length>
    TracepointGetMemory { addr: u64, length: u64 },

    /// vTA<function>
    TracepointGetArguments { function: String },

    /// Any other packet body, sent as-is
    Raw { command: String, payload: String },
}

impl Command {
    pub fn tracepoint_get_registers(symbol: impl Into<String>) -> Self {
        Command::TracepointGetRegisters {
            symbol: symbol.into(),
        }
    }

    pub fn tracepoint_get_memory(addr: u64, length: u64) -> Self {
        Command::TracepointGetMemory { addr, length }
    }

    pub fn tracepoint_get_arguments(function: impl Into<String>) -> Self {
        Command::TracepointGetArguments {
            function: function.into(),
        }
    }

    pub fn raw(command: impl Into<String>, payload: impl Into<String>) -> Self {
        Command::Raw {
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// Wire mnemonic that starts the packet body
    pub fn mnemonic(&self) -> &str {
        match self {
            Command::TracepointGetRegisters { .. } => "vTR",
            Command::TracepointGetMemory { .. } => "vTM",
            Command::TracepointGetArguments { .. } => "vTA",
            Command::Raw { command, .. } => command,
        }
    }

    /// Arguments following the mnemonic
    pub fn payload(&self) -> String {
        match self {
            Command::TracepointGetRegisters { symbol } => symbol.clone(),
            Command::TracepointGetMemory { addr, length } => format!("{:x},{:x}", addr, length),
            Command::TracepointGetArguments { function } => function.clone(),
            Command::Raw { payload, .. } => payload.clone(),
        }
    }

    /// Encode with framing and checksum
    pub fn encode(&self) -> Bytes {
        encoder::encode(self.mnemonic(), &self.payload())
    }
}
