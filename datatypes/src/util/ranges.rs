pub fn value_in_range<T>(value: T, min: T, max: T) -> bool
where
    T: PartialOrd,
{
    (value >= min) && (value <= max)
}

/// Returns the overlap of two inclusive ranges `(min, max)` or `None` if they are disjoint.
pub fn overlap_inclusive<T>(a: (T, T), b: (T, T)) -> Option<(T, T)>
where
    T: Ord + Copy,
{
    let min = a.0.max(b.0);
    let max = a.1.min(b.1);

    (min <= max).then_some((min, max))
}
