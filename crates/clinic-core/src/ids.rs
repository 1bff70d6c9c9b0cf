//! ID prefixes for generated identifiers (`{prefix}-{8 hex}`).

pub const PREFIX_PROFILE: &str = "prf";

pub const ALL_PREFIXES: &[&str] = &[PREFIX_PROFILE];
