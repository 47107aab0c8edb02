/// Custom actions for User records.
///
/// Wallet changes are deltas applied inside the record's own write, so two
/// concurrent movements can never overwrite each other.
#[derive(Debug, Clone)]
pub enum UserAction {
    /// Add (positive) or take (negative) points. Never drives the balance below zero.
    AdjustPoints(i64),
    /// Absolute balance write, for administrative corrections only.
    SetPoints(u64),
    /// Flip `is_first_order_completed`. It never flips back.
    CompleteFirstOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsAdjustment {
    Applied { balance: u64 },
    Insufficient { requested: u64, available: u64 },
}

/// Results from UserActions - variants match 1:1 with UserAction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserActionResult {
    AdjustPoints(PointsAdjustment),
    SetPoints(u64),
    /// `true` when this call did the flip.
    CompleteFirstOrder(bool),
}
