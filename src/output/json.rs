use serde::Serialize;

#[derive(Serialize)]
struct Output<'a, T: Serialize> {
    version: &'static str,
    command: &'a str,
    result: &'a T,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [String],
}

fn no_warnings(warnings: &&[String]) -> bool {
    warnings.is_empty()
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Wrap `result` of `command` in the versioned envelope.
    pub fn format<T: Serialize>(&self, command: &str, result: &T, warnings: &[String]) -> String {
        let output = Output { version: env!("CARGO_PKG_VERSION"), command, result, warnings };

        if self.pretty {
            serde_json::to_string_pretty(&output)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(&output).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}
