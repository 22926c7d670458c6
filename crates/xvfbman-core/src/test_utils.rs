//! Test utilities shared across the workspace's test suites.

use std::env;

/// RAII guard that sets an environment variable and restores the previous
/// value (or removes the variable) when dropped.
///
/// Tests that touch `DISPLAY` must be serialized by the caller; the guard
/// only restores state, it does not lock.
///
/// # Example
///
/// ```
/// use xvfbman_core::test_utils::EnvVarGuard;
///
/// let _guard = EnvVarGuard::set("DISPLAY", ":99.0");
/// assert_eq!(std::env::var("DISPLAY").unwrap(), ":99.0");
/// ```
pub struct EnvVarGuard {
    key: String,
    previous: Option<String>,
}

impl EnvVarGuard {
    /// Set an environment variable and return a guard that will restore it.
    #[allow(unsafe_code)]
    pub fn set(key: &str, value: &str) -> Self {
        let previous = env::var(key).ok();
        unsafe {
            env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            previous,
        }
    }

    /// Remove an environment variable and return a guard that will restore it.
    #[allow(unsafe_code)]
    pub fn unset(key: &str) -> Self {
        let previous = env::var(key).ok();
        unsafe {
            env::remove_var(key);
        }
        Self {
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for EnvVarGuard {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        if let Some(ref value) = self.previous {
            unsafe {
                env::set_var(&self.key, value);
            }
        } else {
            unsafe {
                env::remove_var(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_value() {
        let key = "XVFBMAN_TEST_GUARD_VAR";
        {
            let _outer = EnvVarGuard::set(key, "outer");
            {
                let _inner = EnvVarGuard::set(key, "inner");
                assert_eq!(env::var(key).unwrap(), "inner");
            }
            assert_eq!(env::var(key).unwrap(), "outer");
        }
        assert!(env::var(key).is_err());
    }

    #[test]
    fn unset_removes_and_restores() {
        let key = "XVFBMAN_TEST_GUARD_UNSET";
        let _outer = EnvVarGuard::set(key, "present");
        {
            let _inner = EnvVarGuard::unset(key);
            assert!(env::var(key).is_err());
        }
        assert_eq!(env::var(key).unwrap(), "present");
    }
}
