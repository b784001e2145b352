//! Degraded-response providers.
//!
//! A fallback is total: it returns a value for every key and has no error
//! channel. The guard tags whatever it returns as degraded.

/// Produces a degraded value for `key` when the primary call cannot be used.
pub trait Fallback<V> {
    fn degrade(&self, key: &str) -> V;
}

impl<V, F> Fallback<V> for F
where
    F: Fn(&str) -> V,
{
    fn degrade(&self, key: &str) -> V {
        self(key)
    }
}

/// Fallback that always returns a clone of a fixed value.
#[derive(Debug, Clone)]
pub struct StaticFallback<V>(pub V);

impl<V: Clone> Fallback<V> for StaticFallback<V> {
    fn degrade(&self, _key: &str) -> V {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_and_static() {
        let echo = |key: &str| format!("unavailable: {key}");
        assert_eq!(echo.degrade("Paris"), "unavailable: Paris");
        assert_eq!(StaticFallback(0u8).degrade("anything"), 0);
    }
}
