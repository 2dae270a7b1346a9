//! Headless host for `.nabu` scripts.
//!
//! ```text
//! nabu-studio [--no-watch] [script.nabu]
//! ```
//!
//! Commands go to stdout as JSON lines. Input events are read from stdin,
//! one JSON object per line:
//!
//! ```text
//! {"widget_id": "save_btn", "handler_name": "handle_button_click", "params": {"event": "click"}}
//! ```
//!
//! `:reload` forces a reload, `:status` prints the reload state to stderr,
//! and `:quit` (or end of input) exits.

mod sink;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use nabu_runtime::{InputEvent, ReloadStatus, RuntimeConfig, ScriptHost, init_logging};

use crate::sink::JsonLinesSink;

const DEFAULT_SCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/ui/demo.nabu");

struct Args {
    script: PathBuf,
    watch: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut script = None;
    let mut watch = true;
    for arg in args {
        match arg.as_str() {
            "--no-watch" => watch = false,
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`"),
            _ if script.is_some() => bail!("expected one script path, got another: `{arg}`"),
            _ => script = Some(PathBuf::from(arg)),
        }
    }
    Ok(Args { script: script.unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT)), watch })
}

/// Describe the reload state. A failure counts as seen once shown, so the
/// status returns to idle.
fn status_line(status: &ReloadStatus) -> String {
    let snap = status.snapshot();
    let line = match &snap.last_error {
        Some(err) => format!("{:?} (last error: {err})", snap.state),
        None => format!("{:?}", snap.state),
    };
    status.acknowledge(Instant::now());
    line
}

fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    init_logging(config.logging.clone());

    let args = parse_args(std::env::args().skip(1))?;
    log::info!("nabu-studio: {}", args.script.display());

    let host = ScriptHost::new(&args.script)
        .config(config)
        .watch(args.watch)
        .sink(JsonLinesSink::new(io::stdout()))
        .start()
        .with_context(|| format!("starting host for {}", args.script.display()))?;

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        match line.trim() {
            "" => {}
            ":quit" => break,
            ":reload" => {
                host.reload_now();
            }
            ":status" => eprintln!("{}", status_line(host.status())),
            event => match InputEvent::from_json(event) {
                Ok(event) => {
                    host.dispatch(event);
                }
                Err(e) => log::warn!("{e}"),
            },
        }
    }

    match host.join() {
        Some(pipeline) => log::info!("shut down with {} live widget(s)", pipeline.live().len()),
        None => bail!("pipeline thread panicked"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_to_bundled_demo() {
        let a = args(&[]).unwrap();
        assert!(a.watch);
        assert!(a.script.ends_with("ui/demo.nabu"));
        assert!(a.script.exists());
    }

    #[test]
    fn flags_and_path() {
        let a = args(&["--no-watch", "app.nabu"]).unwrap();
        assert!(!a.watch);
        assert_eq!(a.script, PathBuf::from("app.nabu"));
        assert!(args(&["--fast"]).is_err());
        assert!(args(&["a.nabu", "b.nabu"]).is_err());
    }

    #[test]
    fn showing_a_failure_acknowledges_it() {
        use nabu_runtime::{Pipeline, RecordingSink, ReloadState};

        let status = ReloadStatus::default();
        let mut pipeline = Pipeline::new(RecordingSink::new(), &RuntimeConfig::default(), status.clone());
        assert!(pipeline.reload("window(id: \"w\") do").is_err());
        assert_eq!(status.state(), ReloadState::Failed);

        let line = status_line(&status);
        assert!(line.starts_with("Failed (last error:"), "{line}");
        assert_eq!(status.state(), ReloadState::Idle);
        assert!(status_line(&status).starts_with("Idle (last error:"));
    }

    #[test]
    fn bundled_demo_loads_cleanly() {
        use nabu_runtime::{Pipeline, RecordingSink};

        let src = std::fs::read_to_string(DEFAULT_SCRIPT).unwrap();
        let sink = RecordingSink::new();
        let mut pipeline = Pipeline::new(sink.clone(), &RuntimeConfig::default(), ReloadStatus::default());
        pipeline.reload(&src).unwrap();
        assert_eq!(pipeline.live().roots(), ["main_window", "dialog"]);

        let event = InputEvent::new("save_btn", "handle_button_click");
        sink.take();
        assert!(pipeline.dispatch(&event).errors.is_empty());
        assert_eq!(sink.len(), 1);
    }
}
