//! Bounded-parallel batch scheduling for catalog introspection.

use crate::error::SchemaResult;
use futures_util::future::join_all;
use std::future::Future;

/// Environment variable that overrides the configured concurrency.
pub const MAX_CONCURRENT_ENV: &str = "SUPATOOL_MAX_CONCURRENT";

/// How many introspection queries run at once. Always within `[FLOOR, CEILING]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimit(usize);

impl ConcurrencyLimit {
    pub const DEFAULT: usize = 20;
    pub const CEILING: usize = 50;
    pub const FLOOR: usize = 5;

    /// Clamp `n` into `[FLOOR, CEILING]`.
    pub fn new(n: usize) -> Self {
        Self(n.clamp(Self::FLOOR, Self::CEILING))
    }

    /// Resolve from an optional configured value and an optional env override.
    ///
    /// The env value wins when it parses as a positive integer. Anything
    /// unparseable is ignored and the default applies.
    pub fn resolve(configured: Option<usize>, env_value: Option<&str>) -> Self {
        let from_env = env_value.and_then(|v| v.trim().parse::<usize>().ok());
        Self::new(from_env.or(configured).unwrap_or(Self::DEFAULT))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// An item handed to the batch scheduler, labelled for failure logging.
pub trait BatchItem {
    fn kind(&self) -> &str;
    fn label(&self) -> String;
}

/// Run `f` over `items` in chunks of `limit`, awaiting each chunk in full.
///
/// A failing item is logged and yields `None`; it never cancels its siblings.
/// Results keep the input order.
pub async fn run_batched<'a, I, T, F, Fut>(
    items: &'a [I],
    limit: ConcurrencyLimit,
    f: F,
) -> Vec<Option<T>>
where
    I: BatchItem,
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = SchemaResult<T>>,
{
    let total = items.len();
    let mut out = Vec::with_capacity(total);

    for (batch_index, chunk) in items.chunks(limit.get()).enumerate() {
        let offset = batch_index * limit.get();
        tracing::debug!(
            batch = batch_index + 1,
            size = chunk.len(),
            total,
            "introspecting batch"
        );

        let results = join_all(chunk.iter().map(&f)).await;
        for (i, (item, result)) in chunk.iter().zip(results).enumerate() {
            match result {
                Ok(value) => out.push(Some(value)),
                Err(e) => {
                    tracing::warn!(
                        kind = item.kind(),
                        name = %item.label(),
                        position = offset + i + 1,
                        total,
                        error = %e,
                        "failed to introspect object"
                    );
                    out.push(None);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use std::cell::Cell;

    struct Named(&'static str);

    impl BatchItem for Named {
        fn kind(&self) -> &str {
            "table"
        }
        fn label(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ConcurrencyLimit::new(1).get(), 5);
        assert_eq!(ConcurrencyLimit::new(500).get(), 50);
        assert_eq!(ConcurrencyLimit::new(12).get(), 12);
        assert_eq!(ConcurrencyLimit::default().get(), 20);
    }

    #[test]
    fn env_overrides_config_and_garbage_falls_back() {
        assert_eq!(ConcurrencyLimit::resolve(Some(8), Some("30")).get(), 30);
        assert_eq!(ConcurrencyLimit::resolve(Some(8), None).get(), 8);
        assert_eq!(ConcurrencyLimit::resolve(None, Some("lots")).get(), 20);
        assert_eq!(ConcurrencyLimit::resolve(None, Some("100")).get(), 50);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_order_is_kept() {
        let items = [Named("a"), Named("bad"), Named("c")];
        let results = run_batched(&items, ConcurrencyLimit::new(5), |item| {
            let name = item.0;
            async move {
                if name == "bad" {
                    Err(SchemaError::Other("boom".into()))
                } else {
                    Ok(name.to_uppercase())
                }
            }
        })
        .await;
        assert_eq!(
            results,
            vec![Some("A".to_string()), None, Some("C".to_string())]
        );
    }

    #[tokio::test]
    async fn chunks_never_exceed_the_limit() {
        let items: Vec<Named> = (0..12).map(|_| Named("x")).collect();
        let in_flight = Cell::new(0usize);
        let peak = Cell::new(0usize);

        let results = run_batched(&items, ConcurrencyLimit::new(5), |_| {
            in_flight.set(in_flight.get() + 1);
            peak.set(peak.get().max(in_flight.get()));
            let in_flight = &in_flight;
            async move {
                tokio::task::yield_now().await;
                in_flight.set(in_flight.get() - 1);
                Ok::<_, SchemaError>(())
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert_eq!(peak.get(), 5);
    }
}
