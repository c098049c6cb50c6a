// Auctioneer
pub(crate) const LAST_SLOT_DELIVERED_KEY: &str = "last-slot-delivered";
pub(crate) const LAST_HASH_DELIVERED_KEY: &str = "last-hash-delivered";
pub(crate) const BID_TRACE_KEY: &str = "cache-bid-trace";
pub(crate) const EXEC_PAYLOAD_KEY: &str = "cache-exec-payload";
pub(crate) const BEST_BID_KEY: &str = "best-bid";
pub(crate) const LATEST_BUILDER_BID_KEY: &str = "latest-builder-bid";
pub(crate) const LATEST_BID_RECEIVED_AT_KEY: &str = "latest-bid-received-at";
pub(crate) const BUILDER_INFO_KEY: &str = "builder-info";
pub(crate) const ACTIVE_VALIDATORS_KEY: &str = "active-validators";
pub(crate) const RELAY_PUBKEY_KEY: &str = "relay-pubkey";
pub(crate) const KILL_SWITCH_KEY: &str = "kill-switch";
