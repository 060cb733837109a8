//! Steps and procedures.
//!
//! A [`Procedure`] is a named, ordered list of [`Step`]s. Each step
//! optionally sends one line, then waits for one of its candidate patterns.
//! Procedures are plain data built from a [`PlatformDefinition`]; they hold
//! no session state and can be run any number of times.
//!
//! ```rust
//! use std::time::Duration;
//! use poststage::channel::PatternSet;
//! use poststage::driver::{Input, Procedure, Step};
//!
//! let done = PatternSet::new([r"TFTP to Flash Done"]).unwrap();
//! let procedure = Procedure::new("copy-bootrom").step(
//!     Step::send("copy-bootrom", Input::line("copy tftp flash 10.0.0.1 kxz10101.bin bootrom"))
//!         .expect(done)
//!         .with_timeout(Duration::from_secs(120)),
//! );
//! assert_eq!(procedure.steps().len(), 1);
//! ```

use std::time::Duration;

use crate::channel::PatternSet;
use crate::error::FailureKind;
use crate::platform::PlatformDefinition;
use crate::transport::TransportKind;

/// What a step sends.
///
/// Credentials are placeholders resolved when the procedure runs, so a
/// procedure never carries a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A literal command line.
    Line(String),
    /// The session username.
    Username,
    /// The session password (never logged, masked in transcripts).
    Password,
}

impl Input {
    pub fn line(text: impl Into<String>) -> Self {
        Input::Line(text.into())
    }

    /// Whether the input must be hidden from logs and transcripts.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Input::Password)
    }

    /// Loggable rendering.
    pub fn describe(&self) -> &str {
        match self {
            Input::Line(text) => text,
            Input::Username => "<username>",
            Input::Password => "<password>",
        }
    }
}

/// One send/expect unit.
#[derive(Debug, Clone)]
pub struct Step {
    /// Label used in logs and failure reports.
    pub label: String,

    /// Line to send first, if any.
    pub send: Option<Input>,

    /// Candidate patterns, in precedence order. Empty for send-only steps.
    pub expect: PatternSet,

    /// Timeout override; `None` uses the session default.
    pub timeout: Option<Duration>,

    /// How an expired timeout on this step is classified.
    pub on_no_match: FailureKind,
}

impl Step {
    /// A step that only waits.
    pub fn wait(label: impl Into<String>, patterns: PatternSet) -> Self {
        Self {
            label: label.into(),
            send: None,
            expect: patterns,
            timeout: None,
            on_no_match: FailureKind::Timeout,
        }
    }

    /// A step that sends `input`. Chain [`Step::expect`] to wait afterwards.
    pub fn send(label: impl Into<String>, input: Input) -> Self {
        Self {
            label: label.into(),
            send: Some(input),
            expect: PatternSet::none(),
            timeout: None,
            on_no_match: FailureKind::Timeout,
        }
    }

    /// Set the patterns to wait for.
    pub fn expect(mut self, patterns: PatternSet) -> Self {
        self.expect = patterns;
        self
    }

    /// Set a custom timeout for this step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the classification of a timeout on this step.
    pub fn on_no_match(mut self, kind: FailureKind) -> Self {
        self.on_no_match = kind;
        self
    }

    pub fn is_send_only(&self) -> bool {
        self.expect.is_empty()
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Procedure {
    name: String,
    steps: Vec<Step>,
    /// Pause after the last step, for device-side processing.
    settle: Option<Duration>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            settle: None,
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append all steps of `other` (its settle delay wins if set).
    pub fn then(mut self, other: Procedure) -> Self {
        self.steps.extend(other.steps);
        if other.settle.is_some() {
            self.settle = other.settle;
        }
        self
    }

    /// Pause for `delay` after the last step.
    pub fn with_settle(mut self, delay: Duration) -> Self {
        self.settle = Some(delay);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn settle(&self) -> Option<Duration> {
        self.settle
    }

    /// Log in and reach the privileged prompt.
    ///
    /// Over SSH the transport has already authenticated, so only the
    /// prompt is awaited.
    pub fn login(platform: &PlatformDefinition, kind: TransportKind) -> Self {
        let prompts = &platform.prompts;
        let privileged = PatternSet::single(prompts.privileged.clone());

        match kind {
            TransportKind::Telnet => Procedure::new("login")
                .step(Step::wait(
                    "login-prompt",
                    PatternSet::single(prompts.login.clone()),
                ))
                .step(
                    Step::send("username", Input::Username)
                        .expect(PatternSet::single(prompts.password.clone())),
                )
                .step(Step::send("password", Input::Password).expect(privileged)),
            TransportKind::Ssh => {
                Procedure::new("login").step(Step::wait("privileged-prompt", privileged))
            }
        }
    }

    /// Zeroize and regenerate the SSH host key.
    ///
    /// Either "created" or "already exists" counts as success, which makes
    /// the procedure safe to repeat.
    pub fn generate_ssh_key(platform: &PlatformDefinition) -> Self {
        let prompts = &platform.prompts;
        let messages = &platform.messages;
        let commands = &platform.commands;
        let config = PatternSet::single(prompts.config.clone());

        Procedure::new("generate-ssh-key")
            .step(
                Step::send("enter-config", Input::line(&commands.enter_config))
                    .expect(config.clone()),
            )
            .step(
                Step::send("zeroize-key", Input::line(&commands.zeroize_key))
                    .expect(config.clone()),
            )
            .step(
                Step::send("generate-key", Input::line(&commands.generate_key)).expect(
                    PatternSet::from_regexes(vec![
                        messages.key_created.clone(),
                        messages.key_exists.clone(),
                    ]),
                ),
            )
            .step(Step::wait("key-ready", config))
            .step(
                Step::send("exit-config", Input::line(&commands.exit_config))
                    .expect(PatternSet::single(prompts.privileged.clone())),
            )
            .with_settle(platform.timings.settle)
    }

    /// Download a bootrom image from a TFTP server into flash.
    pub fn copy_bootrom(platform: &PlatformDefinition, tftp_server: &str, bootrom: &str) -> Self {
        Procedure::new("copy-bootrom").step(
            Step::send(
                "copy-bootrom",
                Input::line(platform.copy_bootrom_command(tftp_server, bootrom)),
            )
            .expect(PatternSet::single(platform.messages.tftp_done.clone()))
            .with_timeout(platform.timings.bootrom_copy),
        )
    }

    /// Persist the running configuration.
    pub fn save_config(platform: &PlatformDefinition) -> Self {
        Procedure::new("save-config").step(
            Step::send("write-memory", Input::line(&platform.commands.save_config))
                .expect(PatternSet::single(platform.prompts.privileged.clone())),
        )
    }

    /// Copy the primary flash image to secondary, then save the config.
    pub fn copy_flash_to_secondary(platform: &PlatformDefinition) -> Self {
        Procedure::new("copy-flash-to-secondary")
            .step(
                Step::send(
                    "copy-flash",
                    Input::line(&platform.commands.copy_flash_secondary),
                )
                .expect(PatternSet::single(platform.messages.flash_done.clone()))
                .with_timeout(platform.timings.flash_copy),
            )
            .step(Step::wait(
                "flash-prompt",
                PatternSet::single(platform.prompts.privileged.clone()),
            ))
            .then(Self::save_config(platform))
            .with_settle(platform.timings.settle)
    }

    /// End the session. Nothing is awaited; the device drops the line.
    pub fn logout(platform: &PlatformDefinition) -> Self {
        Procedure::new("logout").step(Step::send(
            "logout",
            Input::line(&platform.commands.logout),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fastiron;

    fn labels(procedure: &Procedure) -> Vec<&str> {
        procedure.steps().iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn test_telnet_login() {
        let platform = fastiron::platform().unwrap();
        let login = Procedure::login(&platform, TransportKind::Telnet);

        assert_eq!(labels(&login), vec!["login-prompt", "username", "password"]);
        assert!(login.steps()[0].send.is_none());
        assert!(login.steps()[0].timeout.is_none());
        assert_eq!(login.steps()[1].send, Some(Input::Username));
        assert!(login.steps()[2].send.as_ref().unwrap().is_hidden());
        assert!(login.settle().is_none());
    }

    #[test]
    fn test_ssh_login_only_waits_for_prompt() {
        let platform = fastiron::platform().unwrap();
        let login = Procedure::login(&platform, TransportKind::Ssh);
        assert_eq!(labels(&login), vec!["privileged-prompt"]);
    }

    #[test]
    fn test_generate_ssh_key() {
        let platform = fastiron::platform().unwrap();
        let keygen = Procedure::generate_ssh_key(&platform);

        assert_eq!(
            labels(&keygen),
            vec!["enter-config", "zeroize-key", "generate-key", "key-ready", "exit-config"]
        );
        assert_eq!(keygen.steps()[2].expect.len(), 2);
        assert!(keygen.steps()[3].send.is_none());
        assert_eq!(keygen.settle(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_copy_bootrom() {
        let platform = fastiron::platform().unwrap();
        let copy = Procedure::copy_bootrom(&platform, "192.168.1.151", "grz10100.bin");

        let step = &copy.steps()[0];
        assert_eq!(
            step.send,
            Some(Input::line("copy tftp flash 192.168.1.151 grz10100.bin bootrom"))
        );
        assert_eq!(step.timeout, Some(Duration::from_secs(120)));
        assert!(copy.settle().is_none());
    }

    #[test]
    fn test_copy_flash_includes_save_config() {
        let platform = fastiron::platform().unwrap();
        let flash = Procedure::copy_flash_to_secondary(&platform);

        assert_eq!(labels(&flash), vec!["copy-flash", "flash-prompt", "write-memory"]);
        assert_eq!(flash.steps()[0].timeout, Some(Duration::from_secs(300)));
        assert_eq!(flash.steps()[2].send, Some(Input::line("write mem")));
        assert_eq!(flash.settle(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_logout_is_send_only() {
        let platform = fastiron::platform().unwrap();
        let logout = Procedure::logout(&platform);
        assert_eq!(logout.steps().len(), 1);
        assert!(logout.steps()[0].is_send_only());
    }

    #[test]
    fn test_step_defaults() {
        let step = Step::send("x", Input::line("show version"));
        assert_eq!(step.on_no_match, FailureKind::Timeout);
        assert!(step.is_send_only());
        assert_eq!(Input::Password.describe(), "<password>");
    }
}
