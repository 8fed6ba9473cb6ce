//! Dynamic schema resolution.
//!
//! The processing order here is the crux of the design: the schema and the
//! evaluation value tuple must be built from the exact same ordering, or
//! their arity and positions diverge. Both paths go through
//! [`processing_order`].

use flexpreset_core::{Panel, SchemaEntry};

/// Deterministic field processing order for a panel.
///
/// Tracker-known fields come first, in tracker order, filtered to fields
/// that actually exist (stale tracker entries are dropped). Fields the
/// tracker has not seen yet follow in on-disk order.
pub fn processing_order(tracker_order: &[String], panel: &Panel) -> Vec<String> {
    let mut order: Vec<String> = tracker_order
        .iter()
        .filter(|name| panel.contains_key(name.as_str()))
        .cloned()
        .collect();

    for name in panel.keys() {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }

    order
}

/// Resolve the ordered schema for a panel. Never empty: a panel with no
/// fields resolves to the single default entry.
pub fn schema_for_panel(tracker_order: &[String], panel: &Panel) -> Vec<SchemaEntry> {
    let entries: Vec<SchemaEntry> = processing_order(tracker_order, panel)
        .iter()
        .filter_map(|name| {
            panel
                .get(name)
                .map(|field| SchemaEntry::for_field(name, field.declared_type))
        })
        .collect();

    if entries.is_empty() {
        vec![SchemaEntry::default_output()]
    } else {
        entries
    }
}
