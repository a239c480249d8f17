//! REPL command parsing

use sidestub_protocol::{ProtocolError, ProtocolResult};

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// target remote <address>
    Connect { address: String },
    /// tracepoint-then-get-registers <symbol>
    Registers { symbol: String },
    /// tracepoint-then-get-memory <addr> <length>
    Memory { addr: u64, length: u64 },
    /// tracepoint-then-get-arguments <function>
    Arguments { function: String },
    /// send <packet-body>
    Send { body: String },
    Stats,
    Disconnect,
    Help,
    Clear,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> ProtocolResult<Self> {
        let mut tokens = Tokenizer::new(line.trim());
        let cmd = tokens
            .next()
            .ok_or_else(|| ProtocolError::InvalidCommand("Empty command".into()))?;

        // Underscore spellings are accepted as aliases
        let command = match cmd.to_lowercase().replace('_', "-").as_str() {
            "target" => Self::parse_target(&mut tokens)?,
            "tracepoint-then-get-registers" | "regs" => ReplCommand::Registers {
                symbol: required(&mut tokens, "symbol")?,
            },
            "tracepoint-then-get-memory" | "mem" => {
                let addr = parse_int(&required(&mut tokens, "address")?)?;
                let length = parse_int(&required(&mut tokens, "length")?)?;
                ReplCommand::Memory { addr, length }
            }
            "tracepoint-then-get-arguments" | "args" => ReplCommand::Arguments {
                function: required(&mut tokens, "function name")?,
            },
            "send" => ReplCommand::Send {
                body: tokens
                    .rest()
                    .ok_or_else(|| ProtocolError::MissingArgument("packet body".into()))?,
            },
            "stats" => ReplCommand::Stats,
            "disconnect" => ReplCommand::Disconnect,
            "help" => ReplCommand::Help,
            "clear" => ReplCommand::Clear,
            "quit" | "exit" => ReplCommand::Quit,
            _ => return Err(ProtocolError::InvalidCommand(format!("Unknown command: {}", cmd))),
        };

        if let Some(extra) = tokens.next() {
            return Err(ProtocolError::InvalidArgument(format!("Unexpected argument: {}", extra)));
        }
        Ok(command)
    }

    fn parse_target(tokens: &mut Tokenizer) -> ProtocolResult<Self> {
        match tokens.next() {
            Some(kind) if kind.eq_ignore_ascii_case("remote") => Ok(ReplCommand::Connect {
                address: required(tokens, "address")?,
            }),
            Some(kind) => Err(ProtocolError::InvalidArgument(format!(
                "Unknown target type: {}",
                kind
            ))),
            None => Err(ProtocolError::MissingArgument("remote".into())),
        }
    }
}

fn required(tokens: &mut Tokenizer, name: &str) -> ProtocolResult<String> {
    tokens
        .next()
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::MissingArgument(name.into()))
}

/// Parse a decimal or `0x`-prefixed hex integer
pub fn parse_int(s: &str) -> ProtocolResult<u64> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|_| ProtocolError::InvalidArgument(format!("Invalid number: {}", s)))
}

/// Whitespace tokenizer that keeps quoted strings together
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.input[self.pos..].trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn next(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        if let Some(quoted) = remaining.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                self.pos += end + 2;
                return Some(&quoted[..end]);
            }
        }

        let end = remaining.find(char::is_whitespace).unwrap_or(remaining.len());
        self.pos += end;
        Some(&remaining[..end])
    }

    fn rest(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = self.input[self.pos..].to_string();
        self.pos = self.input.len();
        Some(remaining)
    }
}
