// ── Scripted interactive sessions ──
//
// Legacy switch CLIs have no exec mode: the only way in is a PTY shell
// that prints a prompt, takes a line, and prints the prompt again.
// `PromptScript` is the explicit state machine for that exchange; it is
// pure (text in, action out) so it can be tested without a network.
// `run_script` drives it over a `ShellChannel` with a bounded wait per
// state.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Error;
use crate::transport::{ShellChannel, Target};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|[=>])").expect("valid ANSI regex"));

/// `switch-a [standalone: master] >`, `leaf01 [mlag: master] (config) #`, `sw1 >`
const ONYX_PROMPT: &str =
    r"^(?P<host>[A-Za-z0-9][A-Za-z0-9_.-]*)(?: \[[^\]]*\])?(?: \([^)]*\))? ?[>#]$";
const PASSWORD_PROMPT: &str = r"(?i)password:$";
const PAGER_PROMPT: &str = r"(?i)^(?:--more--|lines \d+-\d+.*)$";
const ACCESS_DENIED: &str = r"(?i)(?:access denied|permission denied|authentication failed)";

// ── Session state ───────────────────────────────────────────────────

/// Where an interactive exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Shell opened; either a `Password:` prompt or the CLI prompt comes next.
    AwaitingPassword,
    /// Password sent; waiting for the CLI prompt.
    AwaitingPrompt,
    /// Command line written; waiting for its echo.
    CommandSent,
    /// Output is streaming; waiting for the prompt to reappear.
    AwaitingCompletion,
    Done,
}

/// Patterns describing one CLI family's prompts.
///
/// All patterns are matched against the *last line* of received text,
/// after ANSI escapes and carriage returns are stripped and trailing
/// whitespace is trimmed.
#[derive(Debug, Clone)]
pub struct PromptProfile {
    prompt: Regex,
    password: Regex,
    pager: Regex,
    denied: Regex,
    /// Lines starting with this marker are CLI error messages.
    error_marker: &'static str,
}

impl PromptProfile {
    /// Build a profile from a custom CLI prompt pattern.
    ///
    /// A named `host` capture group, if present, is reported as the
    /// device hostname.
    pub fn new(prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            prompt: Regex::new(prompt)?,
            password: Regex::new(PASSWORD_PROMPT)?,
            pager: Regex::new(PAGER_PROMPT)?,
            denied: Regex::new(ACCESS_DENIED)?,
            error_marker: "%",
        })
    }

    /// Prompt profile for Onyx / MLNX-OS switches.
    pub fn onyx() -> Self {
        static ONYX: LazyLock<PromptProfile> =
            LazyLock::new(|| PromptProfile::new(ONYX_PROMPT).expect("valid Onyx prompt regex"));
        ONYX.clone()
    }

    /// `Some(hostname)` if `line` is a CLI prompt. The inner option is
    /// empty when the pattern has no `host` group.
    fn match_prompt(&self, line: &str) -> Option<Option<String>> {
        self.prompt
            .captures(line)
            .map(|caps| caps.name("host").map(|m| m.as_str().to_owned()))
    }
}

// ── Script ──────────────────────────────────────────────────────────

/// What the driver should do after feeding a chunk of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Wait,
    Send(String),
    Finished(Transcript),
}

/// Everything captured for one interactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub command: String,
    /// Normalized text from the command echo through the closing prompt.
    pub raw: String,
    /// Hostname taken from the CLI prompt, when the profile exposes one.
    pub hostname: Option<String>,
}

/// Reasons a script cannot continue, independent of the device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFault {
    AuthRejected(String),
    CommandFailed(String),
}

/// State machine for one interactive command.
#[derive(Debug)]
pub struct PromptScript {
    profile: PromptProfile,
    command: String,
    password: Option<SecretString>,
    state: SessionState,
    buffer: String,
    hostname: Option<String>,
}

impl PromptScript {
    pub fn new(profile: PromptProfile, command: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            profile,
            command: command.into(),
            password,
            state: SessionState::AwaitingPassword,
            buffer: String::new(),
            hostname: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Human-readable description of the pattern the current state waits for.
    pub fn expecting(&self) -> &'static str {
        match self.state {
            SessionState::AwaitingPassword => "password or CLI prompt",
            SessionState::AwaitingPrompt => "CLI prompt",
            SessionState::CommandSent => "command echo",
            SessionState::AwaitingCompletion => "CLI prompt after output",
            SessionState::Done => "nothing",
        }
    }

    /// Feed the next chunk of received text.
    pub fn advance(&mut self, chunk: &str) -> Result<ScriptAction, ScriptFault> {
        self.buffer.push_str(&normalize(chunk));

        match self.state {
            SessionState::AwaitingPassword | SessionState::AwaitingPrompt => self.login_step(),
            SessionState::CommandSent => {
                if self.buffer.trim().is_empty() {
                    return Ok(ScriptAction::Wait);
                }
                self.state = SessionState::AwaitingCompletion;
                self.completion_step()
            }
            SessionState::AwaitingCompletion => self.completion_step(),
            SessionState::Done => Ok(ScriptAction::Wait),
        }
    }

    fn login_step(&mut self) -> Result<ScriptAction, ScriptFault> {
        // The buffer is cleared when the password goes out, so only the
        // device's reply to it is checked. Pre-login banners are not.
        if self.state == SessionState::AwaitingPrompt {
            if let Some(m) = self.profile.denied.find(&self.buffer) {
                return Err(ScriptFault::AuthRejected(m.as_str().to_owned()));
            }
        }

        let tail = last_line(&self.buffer);

        if self.profile.password.is_match(tail) {
            if self.state == SessionState::AwaitingPrompt {
                return Err(ScriptFault::AuthRejected(
                    "password prompt repeated after sending password".into(),
                ));
            }
            let Some(password) = self.password.as_ref() else {
                return Err(ScriptFault::AuthRejected(
                    "password prompt shown but no password credential configured".into(),
                ));
            };
            let reply = format!("{}\n", password.expose_secret());
            self.buffer.clear();
            self.state = SessionState::AwaitingPrompt;
            trace!("answered password prompt");
            return Ok(ScriptAction::Send(reply));
        }

        if let Some(hostname) = self.profile.match_prompt(tail) {
            self.hostname = hostname;
            self.buffer.clear();
            self.state = SessionState::CommandSent;
            trace!(command = %self.command, "CLI prompt seen, sending command");
            return Ok(ScriptAction::Send(format!("{}\n", self.command)));
        }

        Ok(ScriptAction::Wait)
    }

    fn completion_step(&mut self) -> Result<ScriptAction, ScriptFault> {
        let tail = last_line(&self.buffer).to_owned();

        if self.profile.pager.is_match(&tail) {
            let keep = self.buffer.trim_end().len() - tail.len();
            self.buffer.truncate(keep);
            return Ok(ScriptAction::Send(" ".into()));
        }

        if self.profile.match_prompt(&tail).is_none() {
            return Ok(ScriptAction::Wait);
        }

        // A prompt on the very first line is the echo-less prompt of an
        // empty reply; require at least the echo line before it.
        if !self.buffer.contains('\n') {
            return Ok(ScriptAction::Wait);
        }

        if let Some(line) = self
            .buffer
            .lines()
            .skip(1)
            .map(str::trim)
            .find(|l| l.starts_with(self.profile.error_marker))
        {
            self.state = SessionState::Done;
            return Err(ScriptFault::CommandFailed(line.to_owned()));
        }

        self.state = SessionState::Done;
        Ok(ScriptAction::Finished(Transcript {
            command: self.command.clone(),
            raw: std::mem::take(&mut self.buffer),
            hostname: self.hostname.clone(),
        }))
    }
}

/// Strip ANSI escape sequences and carriage returns.
fn normalize(chunk: &str) -> String {
    ANSI_ESCAPE.replace_all(chunk, "").replace('\r', "")
}

/// The last line of `buffer` with trailing whitespace removed.
fn last_line(buffer: &str) -> &str {
    let trimmed = buffer.trim_end_matches([' ', '\t']);
    trimmed.rsplit('\n').next().unwrap_or("").trim_end()
}

// ── Driver ──────────────────────────────────────────────────────────

/// Drive `script` over `channel` until it finishes or a wait expires.
///
/// Every state gets its own `wait` budget; the budget restarts only on a
/// state transition, so a device streaming output that never reaches a
/// prompt still times out.
pub async fn run_script(
    channel: &mut dyn ShellChannel,
    mut script: PromptScript,
    target: &Target,
    wait: Duration,
) -> Result<Transcript, Error> {
    let host = target.host.as_str();
    let mut state = script.state();
    let mut deadline = Instant::now() + wait;

    loop {
        let received = tokio::time::timeout_at(deadline, channel.recv()).await;
        let chunk = match received {
            Err(_) => {
                debug!(host, %state, "prompt wait expired");
                return Err(Error::PromptTimeout {
                    host: host.to_owned(),
                    state: state.to_string(),
                    expected: script.expecting().to_owned(),
                    waited_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                });
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(None)) => {
                return Err(Error::CommandError {
                    host: host.to_owned(),
                    command: script.command().to_owned(),
                    exit_status: None,
                    detail: format!("session closed while in state {state}"),
                });
            }
            Ok(Ok(Some(bytes))) => bytes,
        };

        let action = script
            .advance(&String::from_utf8_lossy(&chunk))
            .map_err(|fault| fault_to_error(fault, target, script.command()))?;

        match action {
            ScriptAction::Wait => {}
            ScriptAction::Send(text) => channel.send(text.as_bytes()).await?,
            ScriptAction::Finished(transcript) => return Ok(transcript),
        }

        if script.state() != state {
            state = script.state();
            deadline = Instant::now() + wait;
        }
    }
}

fn fault_to_error(fault: ScriptFault, target: &Target, command: &str) -> Error {
    match fault {
        ScriptFault::AuthRejected(reason) => Error::AuthFailed {
            host: target.host.clone(),
            username: target.credentials.username.clone(),
            reason,
        },
        ScriptFault::CommandFailed(detail) => Error::CommandError {
            host: target.host.clone(),
            command: command.to_owned(),
            exit_status: None,
            detail,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn script(password: Option<&str>) -> PromptScript {
        PromptScript::new(
            PromptProfile::onyx(),
            "show mac-address-table",
            password.map(|p| SecretString::from(p.to_owned())),
        )
    }

    #[test]
    fn onyx_prompt_variants_match() {
        let profile = PromptProfile::onyx();
        assert_eq!(
            profile.match_prompt("switch-a [standalone: master] >"),
            Some(Some("switch-a".into()))
        );
        assert_eq!(
            profile.match_prompt("leaf01 [mlag-domain: master] (config) #"),
            Some(Some("leaf01".into()))
        );
        assert_eq!(profile.match_prompt("sw1 >"), Some(Some("sw1".into())));
        assert_eq!(profile.match_prompt("1    00:02:C9:5E:A2:46   Dynamic   Eth1/1"), None);
    }

    #[test]
    fn password_then_prompt_then_output() {
        let mut s = script(Some("secret"));

        let action = s.advance("Mellanox Onyx Switch Management\r\nPassword: ").unwrap();
        assert_eq!(action, ScriptAction::Send("secret\n".into()));
        assert_eq!(s.state(), SessionState::AwaitingPrompt);

        let action = s.advance("\r\nLast login: today\r\nsw-a [standalone: master] > ").unwrap();
        assert_eq!(action, ScriptAction::Send("show mac-address-table\n".into()));
        assert_eq!(s.state(), SessionState::CommandSent);

        assert_eq!(s.advance("show mac-address-table\r\n").unwrap(), ScriptAction::Wait);
        assert_eq!(s.state(), SessionState::AwaitingCompletion);

        let action = s
            .advance("Vlan  Mac Address  Type  Port\r\n\r\nsw-a [standalone: master] > ")
            .unwrap();
        let ScriptAction::Finished(transcript) = action else {
            panic!("expected Finished, got {action:?}");
        };
        assert_eq!(transcript.hostname.as_deref(), Some("sw-a"));
        assert!(transcript.raw.starts_with("show mac-address-table\n"));
        assert!(transcript.raw.trim_end().ends_with('>'));
        assert_eq!(s.state(), SessionState::Done);
    }

    #[test]
    fn prompt_without_password_skips_login() {
        let mut s = script(None);
        let action = s.advance("sw-b [standalone: master] > ").unwrap();
        assert_eq!(action, ScriptAction::Send("show mac-address-table\n".into()));
    }

    #[test]
    fn repeated_password_prompt_is_auth_failure() {
        let mut s = script(Some("wrong"));
        s.advance("Password: ").unwrap();
        let err = s.advance("\r\nPassword: ").unwrap_err();
        assert!(matches!(err, ScriptFault::AuthRejected(_)));
    }

    #[test]
    fn access_denied_after_password_is_auth_failure() {
        let mut s = script(Some("wrong"));
        s.advance("Password: ").unwrap();
        let err = s.advance("\r\nAccess denied\r\n").unwrap_err();
        assert_eq!(err, ScriptFault::AuthRejected("Access denied".into()));
    }

    #[test]
    fn denial_wording_in_login_banner_is_not_auth_failure() {
        let mut s = script(Some("secret"));
        let action = s
            .advance("Unauthorized use is prohibited. Permission denied to guests.\r\nPassword: ")
            .unwrap();
        assert_eq!(action, ScriptAction::Send("secret\n".into()));

        let action = s.advance("\r\nsw-a [standalone: master] > ").unwrap();
        assert_eq!(action, ScriptAction::Send("show mac-address-table\n".into()));
    }

    #[test]
    fn denial_wording_in_banner_before_prompt_is_ignored() {
        let mut s = script(None);
        let action = s
            .advance("*** access denied to unauthorized users ***\r\nsw1 > ")
            .unwrap();
        assert_eq!(action, ScriptAction::Send("show mac-address-table\n".into()));
    }

    #[test]
    fn password_prompt_without_password_credential_fails() {
        let mut s = script(None);
        assert!(matches!(
            s.advance("Password:"),
            Err(ScriptFault::AuthRejected(_))
        ));
    }

    #[test]
    fn pager_is_answered_and_removed() {
        let mut s = script(None);
        s.advance("sw1 > ").unwrap();
        s.advance("show mac-address-table\r\nrow one\r\n").unwrap();
        let action = s.advance("lines 1-23 ").unwrap();
        assert_eq!(action, ScriptAction::Send(" ".into()));

        let action = s.advance("row two\r\nsw1 > ").unwrap();
        let ScriptAction::Finished(t) = action else {
            panic!("expected Finished");
        };
        assert!(!t.raw.contains("lines 1-23"));
        assert!(t.raw.contains("row one"));
        assert!(t.raw.contains("row two"));
    }

    #[test]
    fn cli_error_line_fails_command() {
        let mut s = script(None);
        s.advance("sw1 > ").unwrap();
        let err = s
            .advance("show mac-address-table\r\n% Unrecognized command \"show\".\r\nsw1 > ")
            .unwrap_err();
        assert!(matches!(err, ScriptFault::CommandFailed(line) if line.starts_with('%')));
    }

    #[test]
    fn ansi_sequences_are_stripped() {
        let mut s = script(None);
        let action = s.advance("\x1b[?1h\x1b=sw1 [standalone: master] > ").unwrap();
        assert_eq!(action, ScriptAction::Send("show mac-address-table\n".into()));
    }
}
