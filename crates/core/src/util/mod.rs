mod weighted;

pub use self::weighted::{sanitize_weight, WeightedTable};

/// A macro to measure the evaluation time of an expression. Wraps an
/// expression, logs how long it took to evaluate, and evaluates to the value
/// of the expression. The log level defaults to `Debug`.
#[macro_export]
macro_rules! timed {
    ($label:expr, $ex:expr) => {
        $crate::timed!($label, log::Level::Debug, $ex)
    };
    ($label:expr, $log_level:expr, $ex:expr) => {{
        let now = std::time::Instant::now();
        let value = $ex;
        let elapsed = now.elapsed();
        log::log!($log_level, "{} took {} ms", $label, elapsed.as_millis());
        value
    }};
}

/// Define a string-backed identifier newtype. Identifiers are how catalog
/// entries (modules, rules, layers) refer to each other, and how cells record
/// what produced them.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            derive_more::Display,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}
pub(crate) use string_id;

/// Chebyshev (chessboard) distance between two grid coordinates. This is the
/// number of 8-directional steps it takes to get from one to the other.
pub fn chebyshev(a: (i32, i32), b: (i32, i32)) -> u32 {
    let dx = (a.0 - b.0).unsigned_abs();
    let dy = (a.1 - b.1).unsigned_abs();
    dx.max(dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chebyshev() {
        assert_eq!(chebyshev((0, 0), (0, 0)), 0);
        assert_eq!(chebyshev((0, 0), (3, 1)), 3);
        assert_eq!(chebyshev((-2, 5), (1, 1)), 4);
    }
}
