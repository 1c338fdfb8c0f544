//! Store keys and channels shared with the dealer console and downstream
//! consumers. Changing any of these breaks the wire contract.

/// Channel announcing that a symbol's live configuration changed.
/// Payload: the symbol name.
pub const CONFIG_CHANNEL: &str = "config_pe_message";

/// Channel announcing that a new result record was written.
/// Payload: the symbol name.
pub const RESULT_CHANNEL: &str = "price_engine_message";

/// Prefix of the live configuration key of a symbol.
pub const CONFIG_PREFIX: &str = "config_pe_";

/// Prefix of the result record key of a symbol.
pub const RESULT_PREFIX: &str = "price_engine_data_";

pub fn config_key(symbol: &str) -> String {
    format!("{}{}", CONFIG_PREFIX, symbol)
}

pub fn result_key(symbol: &str) -> String {
    format!("{}{}", RESULT_PREFIX, symbol)
}
