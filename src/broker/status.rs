use crate::models::OrderState;

/// Map a broker-native status string onto the canonical order state.
///
/// The vocabulary is the TWS-style one the loop was written against. The
/// table is total: an unrecognized string maps to `Unknown` rather than
/// failing, so a venue adding a status never breaks the loop.
pub fn map_broker_status(status: &str) -> OrderState {
    match status {
        "PendingSubmit" | "ApiPending" => OrderState::Pending,
        "PreSubmitted" | "Submitted" => OrderState::Submitted,
        "PartiallyFilled" => OrderState::PartiallyFilled,
        "Filled" => OrderState::Filled,
        "Cancelled" | "ApiCancelled" | "PendingCancel" => OrderState::Cancelled,
        "Inactive" | "Rejected" => OrderState::Rejected,
        _ => OrderState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_vocabulary() {
        assert_eq!(map_broker_status("PendingSubmit"), OrderState::Pending);
        assert_eq!(map_broker_status("ApiPending"), OrderState::Pending);
    }

    #[test]
    fn test_working_vocabulary() {
        assert_eq!(map_broker_status("PreSubmitted"), OrderState::Submitted);
        assert_eq!(map_broker_status("Submitted"), OrderState::Submitted);
        assert_eq!(map_broker_status("PartiallyFilled"), OrderState::PartiallyFilled);
    }

    #[test]
    fn test_terminal_vocabulary() {
        assert_eq!(map_broker_status("Filled"), OrderState::Filled);
        assert_eq!(map_broker_status("Cancelled"), OrderState::Cancelled);
        assert_eq!(map_broker_status("ApiCancelled"), OrderState::Cancelled);
        assert_eq!(map_broker_status("PendingCancel"), OrderState::Cancelled);
        assert_eq!(map_broker_status("Inactive"), OrderState::Rejected);
        assert_eq!(map_broker_status("Rejected"), OrderState::Rejected);
    }

    #[test]
    fn test_unrecognized_maps_to_unknown_without_panicking() {
        assert_eq!(map_broker_status("Frobnicated"), OrderState::Unknown);
        assert_eq!(map_broker_status(""), OrderState::Unknown);
    }
}
