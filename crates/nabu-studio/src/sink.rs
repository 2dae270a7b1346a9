use std::io::Write;

use nabu_runtime::{Command, CommandSink, RuntimeError};
use serde::Serialize;

/// Streams each command as one JSON object per line.
///
/// Errors are written inline as `{"op":"error", ...}` so a renderer reading
/// the stream can show them.
pub struct JsonLinesSink<W> {
    out: W,
}

#[derive(Serialize)]
struct ErrorLine<'a> {
    op: &'static str,
    stage: &'static str,
    message: &'a str,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_line(&mut self, line: &impl Serialize) {
        if let Err(e) = self.try_write_line(line) {
            log::error!("failed to write command stream: {e}");
        }
    }

    fn try_write_line(&mut self, line: &impl Serialize) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> CommandSink for JsonLinesSink<W> {
    fn apply(&mut self, cmd: &Command) {
        self.write_line(cmd);
    }

    fn report(&mut self, err: &RuntimeError) {
        let stage = match err {
            RuntimeError::Reload(_) => {
                log::error!("{err}");
                "reload"
            }
            RuntimeError::Dispatch(_) => {
                log::warn!("{err}");
                "dispatch"
            }
        };
        let message = err.to_string();
        self.write_line(&ErrorLine { op: "error", stage, message: &message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nabu_runtime::{DispatchError, PropMap, PropValue};

    fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn one_line_per_command() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let mut changed = PropMap::new();
        changed.insert("text".into(), PropValue::from("X"));
        sink.apply(&Command::UpdateProperties { id: "result_text".into(), changed });
        sink.apply(&Command::Destroy { id: "b1".into() });

        let out = lines(&sink.out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["op"], "update_properties");
        assert_eq!(out[0]["changed"]["text"], "X");
        assert_eq!(out[1], serde_json::json!({"op": "destroy", "id": "b1"}));
    }

    #[test]
    fn errors_are_inline() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.report(&DispatchError::UnknownHandler { name: "nope".into() }.into());
        let out = lines(&sink.out);
        assert_eq!(out[0]["op"], "error");
        assert_eq!(out[0]["stage"], "dispatch");
        assert!(out[0]["message"].as_str().unwrap().contains("nope"));
    }
}
