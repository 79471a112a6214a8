//! Memoized voxel grid for repeated forward passes of identical shape.

use burn::tensor::backend::Backend;
use burn::tensor::{DType, Tensor};
use dlka_core::grid::voxel_grid;

/// Identity of a cached grid. Any field change forces regeneration.
#[derive(Debug, Clone, PartialEq)]
pub struct GridKey<D> {
    pub batch: usize,
    pub dims: [usize; 3],
    pub dtype: DType,
    pub device: D,
}

/// Single-slot cache of the base sampling grid.
///
/// The cache is owned by exactly one resampler and mutated through
/// `&mut self`, so two shape configurations never race on the slot.
/// Dropping or invalidating it never changes results, only cost.
#[derive(Debug)]
pub struct GridCache<B: Backend> {
    slot: Option<(GridKey<B::Device>, Tensor<B, 3>)>,
    generated: usize,
}

impl<B: Backend> Default for GridCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> GridCache<B> {
    pub fn new() -> Self {
        Self {
            slot: None,
            generated: 0,
        }
    }

    /// Return the grid for `key`, regenerating it when the key differs from
    /// the cached one.
    ///
    /// # Returns
    /// Voxel grid `[batch, D*H*W, 3]`
    pub fn get_or_generate(&mut self, key: GridKey<B::Device>) -> Tensor<B, 3> {
        if let Some((cached, grid)) = &self.slot {
            if *cached == key {
                return grid.clone();
            }
            tracing::debug!(
                "Grid key changed (batch {}, dims {:?} -> batch {}, dims {:?}), regenerating",
                cached.batch,
                cached.dims,
                key.batch,
                key.dims
            );
        }

        let grid = voxel_grid::<B>(key.batch, key.dims, &key.device);
        self.generated += 1;
        self.slot = Some((key, grid.clone()));
        grid
    }

    /// Drop the cached grid.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Key of the currently cached grid, if any.
    pub fn key(&self) -> Option<&GridKey<B::Device>> {
        self.slot.as_ref().map(|(key, _)| key)
    }

    /// Number of grids generated over the cache's lifetime.
    pub fn generated(&self) -> usize {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn key(batch: usize, dims: [usize; 3]) -> GridKey<<TestBackend as Backend>::Device> {
        GridKey {
            batch,
            dims,
            dtype: DType::F32,
            device: Default::default(),
        }
    }

    #[test]
    fn test_hit_reuses_grid() {
        let mut cache = GridCache::<TestBackend>::new();
        let a = cache.get_or_generate(key(2, [2, 3, 4]));
        let b = cache.get_or_generate(key(2, [2, 3, 4]));

        assert_eq!(cache.generated(), 1);
        assert_eq!(a.into_data(), b.into_data());
    }

    #[test]
    fn test_key_change_regenerates() {
        let mut cache = GridCache::<TestBackend>::new();
        cache.get_or_generate(key(2, [2, 3, 4]));
        let grid = cache.get_or_generate(key(3, [2, 3, 4]));

        assert_eq!(cache.generated(), 2);
        assert_eq!(grid.dims(), [3, 24, 3]);
        assert_eq!(cache.key().map(|k| k.batch), Some(3));

        cache.get_or_generate(key(3, [2, 3, 5]));
        assert_eq!(cache.generated(), 3);
    }

    #[test]
    fn test_dtype_is_part_of_key() {
        let mut cache = GridCache::<TestBackend>::new();
        cache.get_or_generate(key(1, [2, 2, 2]));
        let mut other = key(1, [2, 2, 2]);
        other.dtype = DType::F64;
        cache.get_or_generate(other);
        assert_eq!(cache.generated(), 2);
    }

    #[test]
    fn test_invalidate() {
        let mut cache = GridCache::<TestBackend>::new();
        cache.get_or_generate(key(1, [2, 2, 2]));
        cache.invalidate();
        assert!(cache.key().is_none());

        cache.get_or_generate(key(1, [2, 2, 2]));
        assert_eq!(cache.generated(), 2);
    }
}
