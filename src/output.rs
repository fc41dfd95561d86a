//! Destination for `puts`, `print` and `p`.
//!
//! Embedding hosts and tests usually want script output captured instead of
//! written to the process stdout.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub enum OutputHandler {
    Stdout,
    Buffer(Arc<Mutex<String>>),
}

impl Default for OutputHandler {
    fn default() -> Self {
        OutputHandler::Stdout
    }
}

impl OutputHandler {
    pub fn buffer() -> Self {
        OutputHandler::Buffer(Arc::new(Mutex::new(String::new())))
    }

    pub fn print(&self, text: &str) {
        match self {
            OutputHandler::Stdout => {
                use std::io::Write;
                let mut stdout = std::io::stdout().lock();
                // A closed stdout is not a script error.
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
            OutputHandler::Buffer(buffer) => buffer.lock().push_str(text),
        }
    }

    pub fn println(&self, text: &str) {
        match self {
            OutputHandler::Stdout => println!("{text}"),
            OutputHandler::Buffer(buffer) => {
                let mut buf = buffer.lock();
                buf.push_str(text);
                buf.push('\n');
            }
        }
    }

    /// Drains captured output. Always empty when writing to stdout.
    pub fn take(&self) -> String {
        match self {
            OutputHandler::Stdout => String::new(),
            OutputHandler::Buffer(buffer) => std::mem::take(&mut *buffer.lock()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_collects_and_drains() {
        let handler = OutputHandler::buffer();
        handler.print("a");
        handler.println("b");
        assert_eq!(handler.take(), "ab\n");
        assert_eq!(handler.take(), "");
    }
}
