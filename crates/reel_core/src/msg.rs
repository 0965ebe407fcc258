use crate::StatusEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted a playlist or feed URL for discovery.
    SeedSubmitted(String),
    /// User pasted links, one per line.
    LinksPasted(String),
    /// User changed the selection in the link list (ids of selected items).
    SelectionChanged(Vec<String>),
    SelectAll,
    DeleteSelected,
    ClearAll,
    /// User toggled "merge after download".
    MergeToggled(bool),
    /// User clicked Download; doubles as Stop while a batch runs.
    DownloadClicked,
    /// User asked for the next batch of links from the last seed.
    LoadMoreClicked,
    /// User asked to stop a running discovery.
    StopDiscoveryClicked,
    /// Pipeline event drained from the engine.
    Status(StatusEvent),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
