/// Router Module Index
///
/// Routes are grouped by the admission they require. Each group receives its
/// admission chain at the group level, so a handler cannot be mounted without it.

/// Routes open to anyone (health only).
pub mod public;

/// Routes that require a verified identity but no particular role class.
pub mod authenticated;

/// Routes restricted to role classes by one of the role gates.
pub mod gated;
