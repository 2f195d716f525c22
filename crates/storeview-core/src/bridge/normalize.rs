//! Flattening of typed store values into their wire form.

use crate::error::Result;
use crate::store::KeyValueStore;

/// Read `key` as a string, whatever kind it was stored as.
///
/// Probes run in a fixed order (string, number, boolean) and the first hit
/// wins. Non-finite numbers are skipped. A key that matches no probe yields
/// `None`, which is a normal outcome.
pub fn read_normalized(store: &dyn KeyValueStore, key: &str) -> Result<Option<String>> {
    if let Some(s) = store.get_string(key)? {
        return Ok(Some(s));
    }
    if let Some(n) = store.get_number(key)? {
        if n.is_finite() {
            return Ok(Some(format_number(n)));
        }
    }
    Ok(store.get_bool(key)?.map(|b| b.to_string()))
}

/// Render a number the way the inspector displays it.
///
/// Integral values print without a fractional part (`42`, not `42.0`);
/// everything else uses the shortest representation that round-trips.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    n.to_string()
}
