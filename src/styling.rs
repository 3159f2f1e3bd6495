//! Removes terminal styling codes from build log payloads.
//!
//! Concourse forwards task output verbatim, so payloads carry ANSI color
//! sequences. Some arrive with the ESC byte intact and some have lost it on
//! the way, leaving bare descriptors like `[32m` in the text. Both forms are
//! stripped. A sequence cut off at the end of one payload is held back and
//! resolved against the next one.

const DESCRIPTORS: [&str; 9] = [
    "[1m", "[0;32m", "[31m", "[32m", "[33m", "[36m", "[91m", "[34;1m", "[0m",
];

const ESC: char = '\x1b';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Text,
    /// Saw ESC, waiting for `[`.
    Escape,
    /// Inside `ESC [ params`, waiting for a final byte.
    Csi,
    /// Inside a bare `[...` that still prefixes a known descriptor.
    Descriptor,
}

#[derive(Debug, Default)]
pub struct StylingStripper {
    mode: Mode,
    pending: String,
}

fn is_csi_parameter(c: char) -> bool {
    matches!(c, '\x20'..='\x3f')
}

fn is_csi_final(c: char) -> bool {
    matches!(c, '\x40'..='\x7e')
}

fn is_descriptor(s: &str) -> bool {
    DESCRIPTORS.contains(&s)
}

fn prefixes_descriptor(s: &str) -> bool {
    DESCRIPTORS.iter().any(|d| d.starts_with(s))
}

impl StylingStripper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strip(&mut self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            self.feed(c, &mut out);
        }
        out
    }

    /// Resolve whatever is still held back: a complete descriptor is dropped,
    /// anything else is returned as plain text.
    pub fn finish(&mut self) -> String {
        let held = std::mem::take(&mut self.pending);
        let mode = std::mem::take(&mut self.mode);
        if mode == Mode::Descriptor && is_descriptor(&held) {
            String::new()
        } else {
            held
        }
    }

    fn feed(&mut self, c: char, out: &mut String) {
        match self.mode {
            Mode::Text => self.start(c, out),
            Mode::Escape => {
                if c == '[' {
                    self.pending.push(c);
                    self.mode = Mode::Csi;
                } else {
                    self.flush(out);
                    self.start(c, out);
                }
            }
            Mode::Csi => {
                if is_csi_parameter(c) {
                    self.pending.push(c);
                } else if is_csi_final(c) {
                    self.pending.clear();
                    self.mode = Mode::Text;
                } else {
                    self.flush(out);
                    self.start(c, out);
                }
            }
            Mode::Descriptor => {
                self.pending.push(c);
                if prefixes_descriptor(&self.pending) {
                    return;
                }
                self.pending.pop();
                if is_descriptor(&self.pending) {
                    self.pending.clear();
                    self.mode = Mode::Text;
                } else {
                    self.flush(out);
                }
                self.start(c, out);
            }
        }
    }

    fn start(&mut self, c: char, out: &mut String) {
        match c {
            ESC => {
                self.pending.push(c);
                self.mode = Mode::Escape;
            }
            '[' => {
                self.pending.push(c);
                self.mode = Mode::Descriptor;
            }
            _ => out.push(c),
        }
    }

    fn flush(&mut self, out: &mut String) {
        out.push_str(&self.pending);
        self.pending.clear();
        self.mode = Mode::Text;
    }
}
