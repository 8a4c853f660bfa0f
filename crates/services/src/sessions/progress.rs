/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    /// Positions whose answer satisfies the completion rule.
    pub answered: usize,
    pub remaining: usize,
    pub position: usize,
    pub is_complete: bool,
}
