//! Input and output streams, and the form reader used by the evaluation loops.

use std::io::{BufRead, BufReader, Cursor, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use quill_syn::{Parser, Syntax};
use smol_str::SmolStr;

use crate::error::Exception;

/// How characters are turned into bytes on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// One byte per character; characters beyond U+00FF are written as `?`
    Byte,
}

impl Encoding {
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Byte => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "byte" | "latin1" | "latin-1" => Ok(Encoding::Byte),
            _ => Err(format!("unknown encoding `{}`", s)),
        }
    }
}

pub trait OutputStream: Send + Sync {
    fn write(&self, s: &str) -> Result<(), Exception>;

    fn flush(&self) -> Result<(), Exception> {
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::Utf8
    }

    fn writeln(&self, s: &str) -> Result<(), Exception> {
        self.write(s)?;
        self.write("\n")
    }

    /// Write a line and flush, for diagnostics.
    fn errorln(&self, s: &str) -> Result<(), Exception> {
        self.writeln(s)?;
        self.flush()
    }
}

pub trait InputStream: Send + Sync {
    /// Append the next line, newline included, to `buf`. Returns 0 at end of input.
    fn read_line(&self, buf: &mut String) -> Result<usize, Exception>;
}

/// An [`InputStream`] over any buffered reader.
pub struct Input {
    inner: Mutex<Box<dyn BufRead + Send>>,
}

impl Input {
    pub fn new(reader: impl BufRead + Send + 'static) -> Input {
        Input {
            inner: Mutex::new(Box::new(reader)),
        }
    }

    pub fn from_string(s: impl Into<String>) -> Input {
        Input::new(Cursor::new(s.into()))
    }

    pub fn stdin() -> Input {
        Input::new(BufReader::new(std::io::stdin()))
    }
}

impl InputStream for Input {
    fn read_line(&self, buf: &mut String) -> Result<usize, Exception> {
        let mut reader = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reader.read_line(buf)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Stdout,
    Stderr,
}

/// Standard output or standard error.
pub struct Terminal {
    target: Target,
    encoding: Encoding,
}

impl Terminal {
    pub fn stdout(encoding: Encoding) -> Terminal {
        Terminal {
            target: Target::Stdout,
            encoding,
        }
    }

    pub fn stderr(encoding: Encoding) -> Terminal {
        Terminal {
            target: Target::Stderr,
            encoding,
        }
    }
}

impl OutputStream for Terminal {
    fn write(&self, s: &str) -> Result<(), Exception> {
        let bytes = self.encoding.encode(s);
        match self.target {
            Target::Stdout => std::io::stdout().lock().write_all(&bytes)?,
            Target::Stderr => std::io::stderr().lock().write_all(&bytes)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), Exception> {
        match self.target {
            Target::Stdout => std::io::stdout().flush()?,
            Target::Stderr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// An in-memory output stream.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buf: Mutex<String>,
}

impl OutputBuffer {
    pub fn new() -> OutputBuffer {
        OutputBuffer::default()
    }

    pub fn contents(&self) -> String {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Return the contents and empty the buffer.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl OutputStream for OutputBuffer {
    fn write(&self, s: &str) -> Result<(), Exception> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(s);
        Ok(())
    }
}

/// The standard stream triple of an interpreter.
#[derive(Clone)]
pub struct Streams {
    pub input: Arc<dyn InputStream>,
    pub output: Arc<dyn OutputStream>,
    pub error: Arc<dyn OutputStream>,
}

impl Streams {
    /// Streams bound to the process terminal.
    pub fn terminal(encoding: Encoding) -> Streams {
        Streams {
            input: Arc::new(Input::stdin()),
            output: Arc::new(Terminal::stdout(encoding)),
            error: Arc::new(Terminal::stderr(encoding)),
        }
    }

    /// Streams reading from `input` and writing into fresh buffers, which are returned too.
    pub fn buffered(input: &str) -> (Streams, Arc<OutputBuffer>, Arc<OutputBuffer>) {
        let output = Arc::new(OutputBuffer::new());
        let error = Arc::new(OutputBuffer::new());
        let streams = Streams {
            input: Arc::new(Input::from_string(input)),
            output: output.clone(),
            error: error.clone(),
        };
        (streams, output, error)
    }
}

/// Reads forms one at a time from an input stream.
///
/// Lines are accumulated until they hold a complete form. A syntax error discards the pending
/// input, so the next read starts over on a fresh line.
pub struct FormReader {
    input: Arc<dyn InputStream>,
    name: SmolStr,
    buffer: String,
    /// Line number of the start of `buffer`
    line: u32,
    eof: bool,
}

impl FormReader {
    pub fn new(input: Arc<dyn InputStream>, name: impl Into<SmolStr>) -> FormReader {
        FormReader {
            input,
            name: name.into(),
            buffer: String::new(),
            line: 1,
            eof: false,
        }
    }

    pub fn from_string(source: &str, name: impl Into<SmolStr>) -> FormReader {
        FormReader::new(Arc::new(Input::from_string(source)), name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Line number where the next form will be searched for.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Read the next form. Returns `Ok(None)` at end of input.
    pub fn next_form(&mut self) -> Result<Option<Syntax>, Exception> {
        loop {
            if !self.buffer.is_empty() {
                let (res, offset, line) = {
                    let mut parser = Parser::with_line(&self.buffer, self.line);
                    let res = parser.next_form();
                    (res, parser.offset(), parser.line())
                };
                match res {
                    Ok(Some(form)) => {
                        self.buffer.drain(..offset);
                        self.line = line;
                        return Ok(Some(form));
                    }
                    Ok(None) => {
                        self.buffer.clear();
                        self.line = line;
                    }
                    Err(e) if e.is_incomplete() && !self.eof => {}
                    Err(e) => {
                        tracing::debug!(reader = %self.name, error = %e, "discarding unreadable input");
                        self.line += self.buffer.matches('\n').count() as u32;
                        self.buffer.clear();
                        return Err(Exception::from(e));
                    }
                }
            }

            if self.eof {
                return Ok(None);
            }
            if self.input.read_line(&mut self.buffer)? == 0 {
                self.eof = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_env_log::test;

    use super::*;
    use crate::error::ExceptionKind;

    #[test]
    fn test_reads_forms_across_lines() {
        let mut reader = FormReader::from_string("(a\n b)\n\n(c) (d\n)\n", "test");
        let mut forms = vec![];
        while let Some(form) = reader.next_form().unwrap() {
            forms.push((form.to_string(), form.line));
        }
        assert_eq!(
            forms,
            vec![
                ("(a b)".to_string(), 1),
                ("(c)".to_string(), 4),
                ("(d)".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_recovers_after_syntax_error() {
        let mut reader = FormReader::from_string("(a))\n(b)\n", "test");
        assert_eq!(reader.next_form().unwrap().unwrap().to_string(), "(a)");
        let err = reader.next_form().unwrap_err();
        assert_eq!(err.kind(), &ExceptionKind::Syntax);
        assert_eq!(err.line(), Some(1));
        let form = reader.next_form().unwrap().unwrap();
        assert_eq!(form.to_string(), "(b)");
        assert_eq!(form.line, 2);
        assert!(reader.next_form().unwrap().is_none());
    }

    #[test]
    fn test_unterminated_form_at_end() {
        let mut reader = FormReader::from_string("(a\n(b", "test");
        let err = reader.next_form().unwrap_err();
        assert_eq!(err.kind(), &ExceptionKind::Syntax);
        assert!(reader.next_form().unwrap().is_none());
    }

    #[test]
    fn test_output_buffer() {
        let buf = OutputBuffer::new();
        buf.write("a").unwrap();
        buf.writeln("b").unwrap();
        assert_eq!(buf.take(), "ab\n");
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_byte_encoding() {
        assert_eq!(Encoding::Byte.encode("aé€"), vec![b'a', 0xe9, b'?']);
        assert_eq!(Encoding::Utf8.encode("é"), "é".as_bytes());
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
