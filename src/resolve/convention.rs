//! Naming conventions linking a derived ("extended") type to its base type.
//!
//! Customization layers often ship `OrderServiceExtended : OrderService`, and
//! callers may name either one. The resolver asks a convention for the base
//! name instead of hardcoding any marker.

/// Maps a type name to the base type name it customizes, if any.
pub trait NamingConvention: Send + Sync {
    fn base_name(&self, type_name: &str) -> Option<String>;
}

/// `<Base><suffix>` names the extension of `<Base>`.
#[derive(Debug, Clone)]
pub struct SuffixConvention {
    suffix: String,
}

impl SuffixConvention {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl NamingConvention for SuffixConvention {
    fn base_name(&self, type_name: &str) -> Option<String> {
        if self.suffix.is_empty() {
            return None;
        }
        type_name
            .strip_suffix(self.suffix.as_str())
            .filter(|base| !base.is_empty())
            .map(str::to_string)
    }
}

/// No derived/base relationship between names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConvention;

impl NamingConvention for NoConvention {
    fn base_name(&self, _type_name: &str) -> Option<String> {
        None
    }
}

impl<F> NamingConvention for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn base_name(&self, type_name: &str) -> Option<String> {
        self(type_name)
    }
}
