//! Relational combinators built from the primitive operators.
//!
//! These are thin compositions: each one expands into the map / group /
//! per-partition-apply primitives and adds no execution machinery of its
//! own.

use crate::Dataset;

/// Stage function applied per partition that discards its first input and
/// yields the second. Used by the broadcast combinators.
pub const SELECT_SECOND: &str = "select_second";

/// Stage function that reduces a partition to a single zero value, used to
/// seed a repartitioning.
pub const VALUE_ZERO: &str = "value_zero";

impl<T> Dataset<T> {
    /// The standard MapReduce: map every record, hash-exchange by key,
    /// reduce each group.
    pub fn map_reduce<M, K, R, MF, KF, RF>(
        &self,
        mapper: MF,
        key_selector: KF,
        reducer: RF,
    ) -> Dataset<R>
    where
        MF: Fn(T) -> Vec<M> + 'static,
        KF: Fn(&M) -> K + 'static,
        RF: Fn(&K, Vec<M>) -> R + 'static,
    {
        self.select_many(mapper).group_by(key_selector, reducer)
    }

    /// Cross product of two datasets.
    ///
    /// `proc_func` is applied to each pair of the product to form the
    /// output. The right side is broadcast so every partition of `self`
    /// can pair against all of `other`.
    pub fn cross_product<U, R, F>(&self, other: &Dataset<U>, _proc_func: F) -> Dataset<R>
    where
        F: Fn(&T, &U) -> R + 'static,
    {
        self.apply_with(
            other,
            format!("cross::<{}>", std::any::type_name::<F>()),
            true,
        )
    }

    /// Broadcast the dataset: the output has the same partition count as
    /// the input, each partition holding a full copy.
    pub fn broadcast(&self) -> Dataset<T> {
        self.apply_with(self, SELECT_SECOND, true)
    }

    /// Broadcast the dataset to exactly `n` partitions.
    pub fn broadcast_to(&self, n: u32) -> Dataset<T> {
        let seeds: Dataset<i32> = self.apply(VALUE_ZERO);
        let spread = seeds.hash_partition(|v: &i32| *v, n);
        spread.apply_with(self, SELECT_SECOND, true)
    }

    /// Check that each partition is ordered by the extracted key, passing
    /// records through unchanged. The key's `Ord` supplies the comparison.
    pub fn check_order_by<K, KF>(&self, _key_selector: KF, descending: bool) -> Dataset<T>
    where
        K: Ord,
        KF: Fn(&T) -> K + 'static,
    {
        let direction = if descending { "desc" } else { "asc" };
        self.apply(format!(
            "check_sort::<{}>/{}",
            std::any::type_name::<KF>(),
            direction
        ))
    }
}
