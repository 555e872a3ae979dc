//! Store key construction
//!
//! Every document in the external store is addressed by a string key made
//! of a collection prefix and an identifier. The engine never parses keys
//! out of documents; it builds them from entity ids.

/// Chat threads: `chat_<reportID>`
pub const CHAT_PREFIX: &str = "chat_";
/// Money reports: `report_<reportID>`
pub const REPORT_PREFIX: &str = "report_";
/// Transactions: `transaction_<transactionID>`
pub const TRANSACTION_PREFIX: &str = "transaction_";
/// Draft transactions, consumed then discarded on promotion
pub const TRANSACTION_DRAFT_PREFIX: &str = "transaction_draft_";
/// Report action maps: `report_actions_<reportID>` -> {actionID: action}
pub const REPORT_ACTIONS_PREFIX: &str = "report_actions_";
/// Policies: `policy_<policyID>`
pub const POLICY_PREFIX: &str = "policy_";
/// Singleton map of account id -> personal detail
pub const PERSONAL_DETAILS_KEY: &str = "personal_details";

pub fn chat_key(report_id: &str) -> String {
    format!("{}{}", CHAT_PREFIX, report_id)
}

pub fn report_key(report_id: &str) -> String {
    format!("{}{}", REPORT_PREFIX, report_id)
}

pub fn transaction_key(transaction_id: &str) -> String {
    format!("{}{}", TRANSACTION_PREFIX, transaction_id)
}

pub fn transaction_draft_key(transaction_id: &str) -> String {
    format!("{}{}", TRANSACTION_DRAFT_PREFIX, transaction_id)
}

pub fn report_actions_key(report_id: &str) -> String {
    format!("{}{}", REPORT_ACTIONS_PREFIX, report_id)
}

pub fn policy_key(policy_id: &str) -> String {
    format!("{}{}", POLICY_PREFIX, policy_id)
}

/// Split a key into its collection prefix and identifier.
///
/// Returns `None` for the singleton personal-details key and for keys that
/// match no known collection.
pub fn split_key(key: &str) -> Option<(&'static str, &str)> {
    // Longest prefixes first so `transaction_draft_` wins over `transaction_`
    // and `report_actions_` over `report_`.
    const PREFIXES: [&str; 6] = [
        TRANSACTION_DRAFT_PREFIX,
        TRANSACTION_PREFIX,
        REPORT_ACTIONS_PREFIX,
        REPORT_PREFIX,
        CHAT_PREFIX,
        POLICY_PREFIX,
    ];

    for prefix in PREFIXES {
        if let Some(id) = key.strip_prefix(prefix) {
            return Some((prefix, id));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(chat_key("abc"), "chat_abc");
        assert_eq!(report_key("abc"), "report_abc");
        assert_eq!(report_actions_key("abc"), "report_actions_abc");
        assert_eq!(transaction_draft_key("abc"), "transaction_draft_abc");
    }

    #[test]
    fn test_split_key_prefers_longest_prefix() {
        assert_eq!(
            split_key("transaction_draft_x"),
            Some((TRANSACTION_DRAFT_PREFIX, "x"))
        );
        assert_eq!(split_key("transaction_x"), Some((TRANSACTION_PREFIX, "x")));
        assert_eq!(
            split_key("report_actions_x"),
            Some((REPORT_ACTIONS_PREFIX, "x"))
        );
        assert_eq!(split_key("report_x"), Some((REPORT_PREFIX, "x")));
        assert_eq!(split_key("personal_details"), None);
        assert_eq!(split_key("unknown_x"), None);
    }
}
