//! Default value functions for configuration.
//!
//! Each function is used as a `#[serde(default = "crate::defaults::...")]`
//! attribute on a `Config` field and by `impl Default for Config`.

pub fn persistence_debounce_ms() -> u64 {
    300
}

pub fn reconcile_interval_secs() -> u64 {
    0 // on demand only
}

pub fn auto_close_empty_source_window() -> bool {
    true
}

pub fn expand_parent_on_new_child() -> bool {
    true
}

pub fn default_view_name() -> String {
    "Default".to_string()
}

pub fn default_view_color() -> String {
    "#4a90d9".to_string()
}
