use crate::ports::LoggingPort;
use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

const LINE_TERMINATOR: char = '\n';

#[derive(Clone, Copy)]
enum Stream {
    Normal,
    Debug,
}

struct Streams {
    normal: Box<dyn Write + Send>,
    debug: Box<dyn Write + Send>,
}

/// Line-atomic writer for the normal (results) and debug (diagnostics) streams.
///
/// Both streams share one lock so a line is never split or interleaved with
/// another, whichever stream it goes to.
pub struct LineLogger {
    streams: Mutex<Streams>,
    verbose: bool,
}

impl LineLogger {
    pub fn new(verbose: bool) -> Self {
        Self::with_writers(io::stdout(), io::stderr(), verbose)
    }

    pub fn with_writers<N, D>(normal: N, debug: D, verbose: bool) -> Self
    where
        N: Write + Send + 'static,
        D: Write + Send + 'static,
    {
        Self {
            streams: Mutex::new(Streams {
                normal: Box::new(normal),
                debug: Box::new(debug),
            }),
            verbose,
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.write_line(Stream::Normal, message);
    }

    /// Only written in verbose mode.
    pub fn debug(&self, message: impl fmt::Display) {
        if self.verbose {
            self.write_line(Stream::Debug, message);
        }
    }

    /// Always written to the debug stream. The caller is responsible for
    /// terminating the process afterwards.
    pub fn fatal(&self, message: impl fmt::Display) {
        self.write_line(Stream::Debug, format_args!("fatal: {message}"));
    }

    fn write_line(&self, stream: Stream, message: impl fmt::Display) {
        let mut line = String::new();
        let _ = write!(line, "{message}");
        if !line.ends_with(LINE_TERMINATOR) {
            line.push(LINE_TERMINATOR);
        }

        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let out = match stream {
            Stream::Normal => &mut streams.normal,
            Stream::Debug => &mut streams.debug,
        };
        // A closed stdout must not take the rest of the sweep down with it.
        if out.write_all(line.as_bytes()).is_ok() {
            let _ = out.flush();
        }
    }
}

impl LoggingPort for LineLogger {
    fn debug(&self, message: fmt::Arguments<'_>) {
        LineLogger::debug(self, message);
    }
}

/// In-memory sink shared between a logger and a test.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CaptureBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

#[cfg(test)]
impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn capture_logger(verbose: bool) -> (LineLogger, CaptureBuffer, CaptureBuffer) {
    let normal = CaptureBuffer::default();
    let debug = CaptureBuffer::default();
    let logger = LineLogger::with_writers(normal.clone(), debug.clone(), verbose);
    (logger, normal, debug)
}
