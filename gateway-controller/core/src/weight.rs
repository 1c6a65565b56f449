//! Backend weight selection.

/// Default weight for a backend that does not specify one.
pub const DEFAULT_BACKEND_WEIGHT: i32 = 1;

/// Maximum valid backend weight.
pub const MAX_BACKEND_WEIGHT: i32 = 1_000_000;

/// A backend reference with an optional weight.
pub trait Weighted {
    fn weight(&self) -> Option<i32>;
}

impl Weighted for Option<i32> {
    fn weight(&self) -> Option<i32> {
        *self
    }
}

/// Returns the index of the backend with the highest strictly-positive
/// weight. Backends with weight zero are disabled and skipped. Ties break
/// toward the earliest-listed backend. Returns None when the slice is empty
/// or every backend is disabled.
pub fn select_highest_weight<T: Weighted>(refs: &[T]) -> Option<usize> {
    let mut selected = None;
    let mut highest = 0;

    for (i, backend) in refs.iter().enumerate() {
        let weight = backend.weight().unwrap_or(DEFAULT_BACKEND_WEIGHT);
        if weight == 0 {
            continue;
        }
        if selected.is_none() || weight > highest {
            highest = weight;
            selected = Some(i);
        }
    }

    selected
}
