use std::fmt;

/// Well-known filesystem locations handed out by the
/// [`PathResolver`](crate::services::PathResolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Root,
    Assets,
    Cache,
    /// `Net` subfolder of the cache root
    NetCache,
    /// `Runtime` subfolder of the cache root
    RuntimeCache,
    Chart,
    Settings,
    Skin,
    Logs,
    Lang,
    ScoreDb,
    LogFile,
    RecordOutputs,
}

impl Location {
    pub const ALL: [Location; 13] = [
        Location::Root,
        Location::Assets,
        Location::Cache,
        Location::NetCache,
        Location::RuntimeCache,
        Location::Chart,
        Location::Settings,
        Location::Skin,
        Location::Logs,
        Location::Lang,
        Location::ScoreDb,
        Location::LogFile,
        Location::RecordOutputs,
    ];

    /// Slot index into the resolver's memo table
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Location::Root => "root",
            Location::Assets => "assets",
            Location::Cache => "cache",
            Location::NetCache => "net-cache",
            Location::RuntimeCache => "runtime-cache",
            Location::Chart => "chart",
            Location::Settings => "settings",
            Location::Skin => "skin",
            Location::Logs => "logs",
            Location::Lang => "lang",
            Location::ScoreDb => "score-db",
            Location::LogFile => "log-file",
            Location::RecordOutputs => "record-outputs",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
