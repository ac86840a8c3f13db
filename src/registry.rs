//! Backend registry lookup shared by the stage factories

use crate::{Error, Result};

/// Find a constructor by backend name in a stage registry
///
/// Unknown names fail with a configuration error naming the known
/// backends; nothing is constructed. This is fatal at startup, not
/// retried, since it indicates a deployment mistake.
pub(crate) fn lookup<'a, C>(
    stage: &str,
    registry: &'a [(&'static str, C)],
    name: &str,
) -> Result<&'a C> {
    registry
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, ctor)| ctor)
        .ok_or_else(|| {
            let known: Vec<&str> = registry.iter().map(|(n, _)| *n).collect();
            Error::Config(format!(
                "unknown {stage} backend '{name}', expected one of: {}",
                known.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_registered_constructor() {
        let registry: &[(&str, u8)] = &[("alpha", 1), ("beta", 2)];
        assert_eq!(lookup("test", registry, "beta").copied().unwrap(), 2);
    }

    #[test]
    fn unknown_name_is_config_error_naming_alternatives() {
        let registry: &[(&str, u8)] = &[("alpha", 1), ("beta", 2)];
        let err = lookup("asr", registry, "gamma").unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains("gamma"));
        assert!(message.contains("alpha"));
        assert!(message.contains("beta"));
    }
}
