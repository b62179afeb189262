/// Class-level switches deciding which transformation families run
///
/// A policy is chosen once per deployment unit and shared by every class in
/// it; re-augmenting the same descriptor under the same policy is guaranteed
/// to produce the same output. Per-attribute wishes live on the attribute
/// descriptors and only take effect when the matching switch here is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeavePolicy {
    /// Replace eligible attributes with lazy indirection holders
    pub weave_lazy: bool,

    /// Raise change events when tracked attributes are mutated
    pub weave_change_tracking: bool,

    /// Guard attribute access behind partial-fetch checks
    pub weave_fetch_groups: bool,

    /// Add identity bookkeeping, dispatchers, and clone support
    pub weave_identity: bool,

    /// Add the external-binding link carrier, if the binding is present
    pub weave_links: bool,

    /// Whether the external binding framework is on the deployment path
    ///
    /// Link weaving is only useful when the framework that reads the links
    /// exists at runtime, so `weave_links` is ignored unless this is set.
    pub binding_present: bool,
}

impl WeavePolicy {
    /// Policy with the default switches: everything on except links
    pub fn new() -> WeavePolicy {
        WeavePolicy {
            weave_lazy: true,
            weave_change_tracking: true,
            weave_fetch_groups: true,
            weave_identity: true,
            weave_links: true,
            binding_present: false,
        }
    }

    /// Is link weaving both requested and usable?
    pub fn links_enabled(&self) -> bool {
        self.weave_links && self.binding_present
    }
}
