use log::{error, info, warn};

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// An ordered buffer of messages for one operation.
///
/// Operations append to the buffer passed by their caller; the caller decides
/// when to flush it. Flushing emits the whole buffer as a single log record,
/// so that the messages of one export are not interleaved with others.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<(Level, String)>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.entries.push((Level::Info, message.into()));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.entries.push((Level::Warning, message.into()));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.entries.push((Level::Error, message.into()));
    }

    pub fn entries(&self) -> &[(Level, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The highest level recorded so far.
    pub fn level(&self) -> Option<Level> {
        self.entries.iter().map(|(l, _)| *l).max()
    }

    pub fn has_warnings(&self) -> bool {
        self.level() >= Some(Level::Warning)
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.entries.iter().any(|(_, m)| m.contains(fragment))
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Emits all the messages at once and empties the buffer.
    pub fn flush(&mut self) {
        let text: Vec<String> = self
            .entries
            .iter()
            .map(|(l, m)| match l {
                Level::Info => m.clone(),
                Level::Warning => format!("warning: {}", m),
                Level::Error => format!("error: {}", m),
            })
            .collect();
        match self.level() {
            None => {}
            Some(Level::Info) => info!("{}", text.join("\n")),
            Some(Level::Warning) => warn!("{}", text.join("\n")),
            Some(Level::Error) => error!("{}", text.join("\n")),
        }
        self.entries.clear();
    }
}
