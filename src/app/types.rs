/// Requests coming from the interactive host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    /// Value typed by the user, reported without debouncing
    ManualEntry(String),
    SwitchCamera,
    ToggleTorch,
    Quit,
}

/// Why the reader stopped running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    InputClosed,
}
