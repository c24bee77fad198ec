//! Domain-level constants.
//!
//! These constants define business rules and defaults.

// =============================================================================
// Languages
// =============================================================================

/// English language code
pub const LANGUAGE_EN: &str = "EN";

/// Uzbek language code
pub const LANGUAGE_UZ: &str = "UZ";

/// Russian language code
pub const LANGUAGE_RU: &str = "RU";

/// All supported language codes
pub const SUPPORTED_LANGUAGES: &[&str] = &[LANGUAGE_EN, LANGUAGE_UZ, LANGUAGE_RU];

// =============================================================================
// Profile defaults
// =============================================================================

/// New profiles are active
pub const DEFAULT_PROFILE_ACTIVE: bool = true;

/// New profiles are not deleted
pub const DEFAULT_PROFILE_DELETED: bool = false;
