//! IRC protocol handling logic.
//!
//! Pure state machine: each inbound [`Message`] yields the commands to send
//! back and the [`IrcEvent`]s to forward to the bridge. Registration uses
//! SASL PLAIN negotiated by hand (`CAP REQ :sasl`, `AUTHENTICATE`).

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use irc::client::prelude::{Command, Message, Prefix, Response};
use irc::proto::CapSubCommand;
use tracing::{debug, error, info, warn};

use crate::common::error::IrcError;
use crate::common::types::IrcSource;
use crate::common::IrcEvent;

const CTCP_DELIM: char = '\x01';
const NICK_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

/// Progress of SASL registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslState {
    /// `CAP REQ :sasl` sent.
    Requested,
    /// `AUTHENTICATE PLAIN` sent.
    Mechanism,
    /// Credentials sent.
    Credentials,
    Done,
    Failed,
}

/// What a single inbound message produced.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub replies: Vec<Command>,
    pub events: Vec<IrcEvent>,
}

impl HandlerOutput {
    fn reply(mut self, command: Command) -> Self {
        self.replies.push(command);
        self
    }

    fn event(mut self, event: IrcEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// IRC protocol handler state.
pub struct IrcHandler {
    nick: String,
    password: String,
    sasl: SaslState,
    /// NAMES replies collected until RPL_ENDOFNAMES, keyed by lowercase channel.
    pending_names: HashMap<String, Vec<String>>,
}

impl IrcHandler {
    pub fn new(nick: &str, password: &str) -> Self {
        Self {
            nick: nick.to_string(),
            password: password.to_string(),
            sasl: SaslState::Requested,
            pending_names: HashMap::new(),
        }
    }

    pub fn sasl_state(&self) -> SaslState {
        self.sasl
    }

    /// Commands that open registration.
    pub fn start(&mut self) -> Vec<Command> {
        self.sasl = SaslState::Requested;
        vec![
            Command::CAP(None, CapSubCommand::REQ, None, Some("sasl".to_string())),
            Command::NICK(self.nick.clone()),
            Command::USER(self.nick.clone(), "0".to_string(), self.nick.clone()),
        ]
    }

    /// Handle one inbound message.
    pub fn handle(&mut self, message: &Message) -> HandlerOutput {
        let raw = message.to_string().trim_end().to_string();
        let output = HandlerOutput::default().event(IrcEvent::Raw { line: raw });
        let source = source_of(message);

        match &message.command {
            Command::CAP(_, CapSubCommand::ACK, field, trailing) => {
                if mentions_sasl(field, trailing) && self.sasl == SaslState::Requested {
                    debug!("Server acknowledged sasl capability");
                    self.sasl = SaslState::Mechanism;
                    return output.reply(Command::AUTHENTICATE("PLAIN".to_string()));
                }
                output
            }
            Command::CAP(_, CapSubCommand::NAK, field, trailing) => {
                if mentions_sasl(field, trailing) {
                    return self.fail(output, "server refused the sasl capability");
                }
                output
            }
            Command::AUTHENTICATE(data) if data == "+" && self.sasl == SaslState::Mechanism => {
                self.sasl = SaslState::Credentials;
                output.reply(Command::AUTHENTICATE(self.sasl_plain_payload()))
            }
            Command::Response(Response::RPL_SASLSUCCESS, _) => {
                info!("SASL authentication succeeded as {}", self.nick);
                self.sasl = SaslState::Done;
                output
                    .reply(Command::CAP(None, CapSubCommand::END, None, None))
                    .event(IrcEvent::Registered)
            }
            Command::Response(
                resp @ (Response::ERR_SASLFAIL
                | Response::ERR_SASLTOOLONG
                | Response::ERR_SASLABORT
                | Response::ERR_NICKLOCKED),
                args,
            ) => {
                let reason = args.last().cloned().unwrap_or_else(|| format!("{:?}", resp));
                self.fail(output, &reason)
            }
            Command::Response(Response::RPL_NAMREPLY, args) => {
                // [me, symbol, channel, names]
                if let (Some(channel), Some(names)) = (args.get(2), args.get(3)) {
                    self.pending_names
                        .entry(channel.to_ascii_lowercase())
                        .or_default()
                        .extend(names.split_whitespace().map(strip_nick_prefix));
                }
                output
            }
            Command::Response(Response::RPL_ENDOFNAMES, args) => {
                // [me, channel, text]
                let Some(channel) = args.get(1) else {
                    return output;
                };
                let names = self
                    .pending_names
                    .remove(&channel.to_ascii_lowercase())
                    .unwrap_or_default();
                output.event(IrcEvent::Names {
                    channel: channel.clone(),
                    names,
                })
            }
            Command::PRIVMSG(target, text) => match ctcp_action(text) {
                Some(action) => output.event(IrcEvent::Action {
                    source,
                    target: target.clone(),
                    text: action.to_string(),
                }),
                None if text.starts_with(CTCP_DELIM) => output,
                None => output.event(IrcEvent::Privmsg {
                    source,
                    target: target.clone(),
                    text: text.clone(),
                }),
            },
            Command::JOIN(channel, _, _) => output.event(IrcEvent::Join {
                source,
                channel: channel.clone(),
            }),
            Command::PART(channel, reason) => output.event(IrcEvent::Part {
                source,
                channel: channel.clone(),
                reason: reason.clone().filter(|r| !r.is_empty()),
            }),
            Command::QUIT(reason) => output.event(IrcEvent::Quit {
                source,
                reason: reason.clone().filter(|r| !r.is_empty()),
            }),
            Command::NICK(new_nick) => {
                if source.as_ref().is_some_and(|s| s.is(&self.nick)) {
                    self.nick = new_nick.clone();
                }
                output.event(IrcEvent::Nick {
                    source,
                    new_nick: new_nick.clone(),
                })
            }
            _ => output,
        }
    }

    fn sasl_plain_payload(&self) -> String {
        let plain = format!("{}\0{}\0{}", self.nick, self.nick, self.password);
        STANDARD.encode(plain.as_bytes())
    }

    fn fail(&mut self, output: HandlerOutput, reason: &str) -> HandlerOutput {
        if self.sasl == SaslState::Done {
            warn!("Ignoring late SASL failure: {}", reason);
            return output;
        }
        let err = IrcError::SaslFailed {
            reason: reason.to_string(),
        };
        error!("{}", err);
        self.sasl = SaslState::Failed;
        output.reply(Command::CAP(None, CapSubCommand::END, None, None))
    }
}

fn source_of(message: &Message) -> Option<IrcSource> {
    match &message.prefix {
        Some(Prefix::Nickname(nick, user, host)) => Some(IrcSource {
            nick: nick.clone(),
            user: Some(user.clone()).filter(|u| !u.is_empty()),
            host: Some(host.clone()).filter(|h| !h.is_empty()),
        }),
        _ => None,
    }
}

fn mentions_sasl(field: &Option<String>, trailing: &Option<String>) -> bool {
    [field, trailing]
        .into_iter()
        .flatten()
        .any(|caps| caps.split_whitespace().any(|cap| cap.eq_ignore_ascii_case("sasl")))
}

/// Body of a `\x01ACTION ...\x01` CTCP, if that is what `text` is.
fn ctcp_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    inner.strip_prefix("ACTION ").or_else(|| (inner == "ACTION").then_some(""))
}

fn strip_nick_prefix(name: &str) -> String {
    name.trim_start_matches(NICK_PREFIXES).to_string()
}
