//! Run a command or a script against many displays at once
//!
//! Every [Target] owns its connection. Targets run concurrently on the current
//! task; steps of one target run strictly in order, each retried until it
//! succeeds or the retry budget is spent.

use std::{fmt, time::Duration};

use futures::future::join_all;
use tokio::time;
use tracing::{debug, info, warn};

use crate::{
    client::MDCConnection,
    command::Command,
    fields::{ParseMode, Value},
    Error,
};

/// A display addressed through one connection
#[derive(Debug)]
pub struct Target {
    /// Display id sent in every request
    pub display_id: u8,
    /// Connection used for every step of this target
    pub connection: MDCConnection
}

impl Target {
    /// New target, connection is opened by the first command
    pub fn new(display_id: u8, connection: MDCConnection) -> Self {
        Self { display_id, connection }
    }

    /// `DISPLAY_ID@TARGET`, as printed in reports
    pub fn label(&self) -> String {
        format!("{}@{}", self.display_id, self.connection.target())
    }
}

/// One line of a script
#[derive(Debug, Clone)]
pub enum Step {
    /// Invoke a command
    Command {
        /// Descriptor to invoke
        command: &'static Command,
        /// Arguments, empty for GET
        args: Vec<Value>
    },
    /// Pause the target
    Sleep(Duration),
    /// Close the connection, the next command reconnects
    Disconnect
}

impl Step {
    /// Step name as written in scripts
    pub fn name(&self) -> &'static str {
        match self {
            Step::Command { command, .. } => command.name,
            Step::Sleep(_) => "sleep",
            Step::Disconnect => "disconnect"
        }
    }

    fn is_sleep(&self) -> bool {
        matches!(self, Step::Sleep(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Step::Command { args, .. } => args.iter().try_for_each(|arg| write!(f, " {arg}")),
            Step::Sleep(duration) => write!(f, " {}", duration.as_secs_f64()),
            Step::Disconnect => Ok(())
        }
    }
}

/// Ordered steps run for every target
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Steps in execution order
    pub steps: Vec<Step>
}

impl Script {
    /// Script made of a single command invocation
    pub fn single(command: &'static Command, args: Vec<Value>) -> Self {
        Self { steps: vec![Step::Command { command, args }] }
    }
}

/// Pacing and retry policy of a script
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Pause between consecutive commands, not applied next to a sleep step
    pub sleep: Duration,
    /// How many times a failed step is retried
    pub retry_command: usize,
    /// Pause before a step retry, `sleep` when zero
    pub retry_command_sleep: Duration,
    /// How many times the whole script is retried after a step gave up
    pub retry_script: usize,
    /// Pause before a script retry, `sleep` when zero
    pub retry_script_sleep: Duration,
    /// Treat NAK as a completed step
    pub ignore_nak: bool,
    /// Enumeration parsing of responses
    pub parse_mode: ParseMode
}

impl ScriptOptions {
    fn command_retry_sleep(&self) -> Duration {
        if self.retry_command_sleep.is_zero() { self.sleep } else { self.retry_command_sleep }
    }

    fn script_retry_sleep(&self) -> Duration {
        if self.retry_script_sleep.is_zero() { self.sleep } else { self.retry_script_sleep }
    }
}

/// Outcome of one target
#[derive(Debug)]
pub struct TargetReport {
    /// `DISPLAY_ID@TARGET`
    pub label: String,
    /// Values returned by each command step of the successful attempt,
    /// or the error that made the last attempt give up
    pub result: Result<Vec<Vec<Value>>, Error>
}

impl TargetReport {
    /// Whether the script completed
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Called after every step attempt with the target label
pub type StepCallback<'a> = &'a dyn Fn(&str, &Step, &Result<Vec<Value>, Error>);

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        time::sleep(duration).await;
    }
}

async fn run_step(target: &mut Target, step: &Step, mode: ParseMode) -> Result<Vec<Value>, Error> {
    match step {
        Step::Command { command, args } => {
            command.invoke_with_mode(&mut target.connection, target.display_id, args, mode).await
        }
        Step::Sleep(duration) => {
            time::sleep(*duration).await;
            Ok(Vec::new())
        }
        Step::Disconnect => {
            target.connection.close().await?;
            Ok(Vec::new())
        }
    }
}

async fn run_once(
    target: &mut Target,
    script: &Script,
    options: &ScriptOptions,
    on_step: StepCallback<'_>
) -> Result<Vec<Vec<Value>>, Error> {
    let label = target.label();
    let mut outputs = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        if index > 0 && !step.is_sleep() && !script.steps[index - 1].is_sleep() {
            pause(options.sleep).await;
        }

        let mut attempt = 0;
        let values = loop {
            debug!(target = %label, step = index, attempt, "{step}");
            let result = run_step(target, step, options.parse_mode).await;
            on_step(&label, step, &result);
            match result {
                Ok(values) => break values,
                Err(e) if options.ignore_nak && e.is_nak() => {
                    debug!(target = %label, "Ignoring {e}");
                    break Vec::new();
                }
                Err(e) if attempt < options.retry_command => {
                    attempt += 1;
                    warn!(target = %label, "{} failed ({e}), retry {attempt}/{}", step.name(), options.retry_command);
                    pause(options.command_retry_sleep()).await;
                }
                Err(e) => return Err(e)
            }
        };
        if let Step::Command { .. } = step {
            outputs.push(values);
        }
    }
    Ok(outputs)
}

/// Run `script` on one target, retrying the whole script per `options`
pub async fn run_script(
    target: &mut Target,
    script: &Script,
    options: &ScriptOptions,
    on_step: StepCallback<'_>
) -> Result<Vec<Vec<Value>>, Error> {
    let mut attempt = 0;
    loop {
        match run_once(target, script, options, on_step).await {
            Ok(outputs) => return Ok(outputs),
            Err(e) if attempt < options.retry_script => {
                attempt += 1;
                warn!(target = %target.label(), "Script failed ({e}), retry {attempt}/{}", options.retry_script);
                pause(options.script_retry_sleep()).await;
            }
            Err(e) => return Err(e)
        }
    }
}

/// Run `script` on every target concurrently, then close what is left open.
///
/// One target failing never stops the others; reports keep the target order.
pub async fn run_all(
    targets: &mut [Target],
    script: &Script,
    options: &ScriptOptions,
    on_step: StepCallback<'_>
) -> Vec<TargetReport> {
    let reports = join_all(targets.iter_mut().map(|target| async move {
        let result = run_script(target, script, options, on_step).await;
        if let Err(e) = &result {
            warn!(target = %target.label(), "Script failed indefinitely: {e}");
        }
        TargetReport { label: target.label(), result }
    }))
    .await;

    close_all(targets).await;
    info!("{} of {} targets failed", reports.iter().filter(|r| !r.is_ok()).count(), reports.len());
    reports
}

/// Close every open connection concurrently
pub async fn close_all(targets: &mut [Target]) {
    join_all(targets.iter_mut()
        .filter(|target| target.connection.is_open())
        .map(|target| async move {
            if let Err(e) = target.connection.close().await {
                warn!(target = %target.label(), "Close failed: {e}");
            }
        }))
    .await;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{client::ConnectionConfig, commands};

    #[test]
    pub fn should_default_retry_sleeps_to_sleep(){
        let options = ScriptOptions { sleep: Duration::from_secs(2), ..Default::default() };
        assert_eq!(options.command_retry_sleep(), Duration::from_secs(2));
        assert_eq!(options.script_retry_sleep(), Duration::from_secs(2));

        let options = ScriptOptions {
            sleep: Duration::from_secs(2),
            retry_command_sleep: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(options.command_retry_sleep(), Duration::from_millis(100));
        assert_eq!(options.script_retry_sleep(), Duration::from_secs(2));
    }

    #[test]
    pub fn should_render_steps(){
        let on = commands::POWER_STATE.member_named("ON").map(Value::from);
        let step = Step::Command { command: &commands::POWER, args: on.into_iter().collect() };
        assert_eq!(step.to_string(), "power <POWER_STATE.ON:1>");
        assert_eq!(Step::Sleep(Duration::from_millis(1500)).to_string(), "sleep 1.5");
        assert_eq!(Step::Disconnect.to_string(), "disconnect");
    }

    #[test]
    pub fn should_label_targets(){
        let target = Target::new(1, MDCConnection::new("10.0.0.5:1515", ConnectionConfig::default()));
        assert_eq!(target.label(), "1@10.0.0.5:1515");
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_sleep_and_disconnect_without_io(){
        let mut targets = vec![Target::new(0, MDCConnection::new("192.0.2.1", ConnectionConfig::default()))];
        let script = Script { steps: vec![Step::Sleep(Duration::from_secs(3)), Step::Disconnect] };
        let start = time::Instant::now();
        let reports = run_all(&mut targets, &script, &ScriptOptions::default(), &|_, _, _| {}).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].result.as_ref().map(Vec::len).ok(), Some(0));
    }
}
