//! JSON-lines output writer.

use std::io::{BufWriter, Write};

use serde_json::Value as Json;

/// Writes one emitted payload per line.
pub struct FeatureWriter<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> FeatureWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    pub fn write(&mut self, value: &Json) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_json_lines() {
        let mut buffer = Vec::new();
        {
            let mut writer = FeatureWriter::new(&mut buffer);
            writer.write(&json!({"a": 1})).unwrap();
            writer.write(&json!("x")).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(String::from_utf8(buffer).unwrap(), "{\"a\":1}\n\"x\"\n");
    }
}
