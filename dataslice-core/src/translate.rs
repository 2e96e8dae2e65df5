//! Translation of logical slice requests into physical slice requests
//!
//! A dataset stored on disk with shape `physical` may be presented to
//! consumers under a different `logical` shape: squeezed (unit axes
//! removed) or axis-extended (unit axes inserted). Both views address the
//! same elements in the same order, so a slice against the logical view
//! maps axis-by-axis onto the physical one. Physical unit axes with no
//! logical counterpart ("phantom" axes) are pinned to the fixed triple
//! (start 0, step 1, count 1).

use alloc::vec::Vec;

use crate::error::{CoreError, Result};
use crate::slice::SliceSpec;

/// Map a logical slice onto the physical shape of the stored data.
///
/// The slice's source shape is the logical view. Fails with
/// [`CoreError::ShapeMismatch`] when the ordered non-unit extents of
/// the two shapes disagree; that is a caller or configuration bug, not
/// a condition to guess around.
pub fn translate(slice: &SliceSpec, physical: &[usize]) -> Result<SliceSpec> {
    let logical = slice.source();

    // Identity fast path: the views are the same shape.
    if logical == physical {
        return Ok(slice.clone());
    }

    let mut start = Vec::with_capacity(physical.len());
    let mut step = Vec::with_capacity(physical.len());
    let mut count = Vec::with_capacity(physical.len());

    let mut li = 0;
    for &pdim in physical {
        if pdim == 1 {
            // Phantom axis: invisible to the logical view.
            start.push(0);
            step.push(1);
            count.push(1);
            continue;
        }
        // Skip logical unit axes with no physical counterpart (inserted
        // by axis extension); they can only carry a single-element triple.
        while li < logical.len() && logical[li] == 1 {
            li += 1;
        }
        if li >= logical.len() || logical[li] != pdim {
            return Err(CoreError::ShapeMismatch);
        }
        start.push(slice.start()[li]);
        step.push(slice.step()[li]);
        count.push(slice.count()[li]);
        li += 1;
    }

    // Any logical axes left over must be unit insertions (leading ones
    // were consumed above; this covers trailing insertion as well).
    while li < logical.len() {
        if logical[li] != 1 {
            return Err(CoreError::ShapeMismatch);
        }
        li += 1;
    }

    Ok(SliceSpec::from_raw(start, step, count, physical.to_vec()))
}

/// Positions of the physical axes that have no logical counterpart.
///
/// For identical shapes there are none; otherwise every physical unit
/// axis is phantom. Removing these positions from a translated slice's
/// counts yields the logical counts up to inserted logical unit axes.
pub fn phantom_axes(logical: &[usize], physical: &[usize]) -> Result<Vec<usize>> {
    if !crate::shape::non_unit_matches(logical, physical) {
        return Err(CoreError::ShapeMismatch);
    }
    if logical == physical {
        return Ok(Vec::new());
    }
    Ok(physical
        .iter()
        .enumerate()
        .filter(|&(_, &dim)| dim == 1)
        .map(|(axis, _)| axis)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn remove_positions(values: &[usize], positions: &[usize]) -> Vec<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(i))
            .map(|(_, &v)| v)
            .collect()
    }

    #[test]
    fn test_identity() {
        let shape = [3, 4, 5];
        let slice = SliceSpec::new(&shape, vec![1, 0, 2], vec![1, 2, 1], vec![2, 2, 3]).unwrap();
        let translated = translate(&slice, &shape).unwrap();
        assert_eq!(translated, slice);
    }

    #[test]
    fn test_leading_phantom_axis() {
        // Scenario from the original system: physical [1, 4, 4],
        // logical [4, 4], request rows 1..3.
        let slice = SliceSpec::new(&[4, 4], vec![1, 0], vec![1, 1], vec![2, 4]).unwrap();
        let physical = translate(&slice, &[1, 4, 4]).unwrap();
        assert_eq!(physical.start(), &[0, 1, 0]);
        assert_eq!(physical.step(), &[1, 1, 1]);
        assert_eq!(physical.count(), &[1, 2, 4]);
    }

    #[test]
    fn test_interior_and_trailing_phantoms() {
        let slice = SliceSpec::new(&[4, 3], vec![0, 1], vec![2, 1], vec![2, 2]).unwrap();
        let physical = translate(&slice, &[4, 1, 3, 1]).unwrap();
        assert_eq!(physical.start(), &[0, 0, 1, 0]);
        assert_eq!(physical.step(), &[2, 1, 1, 1]);
        assert_eq!(physical.count(), &[2, 1, 2, 1]);
    }

    #[test]
    fn test_leading_extension() {
        // Logical view extended with two leading unit axes.
        let slice = SliceSpec::new(&[1, 1, 4], vec![0, 0, 1], vec![1, 1, 1], vec![1, 1, 3]).unwrap();
        let physical = translate(&slice, &[4]).unwrap();
        assert_eq!(physical.start(), &[1]);
        assert_eq!(physical.count(), &[3]);
    }

    #[test]
    fn test_trailing_extension() {
        // Unit axis inserted at the end of the logical view.
        let slice = SliceSpec::new(&[4, 1], vec![2, 0], vec![1, 1], vec![2, 1]).unwrap();
        let physical = translate(&slice, &[4]).unwrap();
        assert_eq!(physical.start(), &[2]);
        assert_eq!(physical.count(), &[2]);
    }

    #[test]
    fn test_non_unit_mismatch_rejected() {
        let slice = SliceSpec::full(&[3, 2]);
        assert_eq!(translate(&slice, &[2, 3]), Err(CoreError::ShapeMismatch));

        let slice = SliceSpec::full(&[4]);
        assert_eq!(translate(&slice, &[1]), Err(CoreError::ShapeMismatch));
    }

    #[test]
    fn test_round_trip_squeeze() {
        // For squeezed logical views, dropping phantom positions from the
        // physical triples reproduces the logical triples exactly.
        let cases: &[(&[usize], &[usize])] = &[
            (&[4, 4], &[1, 4, 4]),
            (&[4, 3], &[4, 1, 3]),
            (&[4, 3], &[4, 3, 1]),
            (&[2, 5], &[1, 2, 1, 5, 1]),
            (&[6], &[1, 1, 6]),
        ];
        for &(logical, physical) in cases {
            let slice = SliceSpec::new(
                logical,
                logical.iter().map(|_| 0).collect(),
                logical.iter().map(|_| 1).collect(),
                logical.iter().map(|&d| d / 2).collect(),
            )
            .unwrap();
            let translated = translate(&slice, physical).unwrap();
            let phantoms = phantom_axes(logical, physical).unwrap();
            assert_eq!(
                remove_positions(translated.start(), &phantoms),
                slice.start()
            );
            assert_eq!(remove_positions(translated.step(), &phantoms), slice.step());
            assert_eq!(
                remove_positions(translated.count(), &phantoms),
                slice.count()
            );
        }
    }

    #[test]
    fn test_round_trip_extension() {
        // For extended logical views, the physical triples equal the
        // logical triples with the inserted unit axes dropped.
        let cases: &[(&[usize], &[usize])] = &[
            (&[1, 4, 4], &[4, 4]),
            (&[1, 1, 6], &[6]),
            (&[4, 1], &[4]),
        ];
        for &(logical, physical) in cases {
            let slice = SliceSpec::full(logical);
            let translated = translate(&slice, physical).unwrap();
            let kept: Vec<usize> = (0..logical.len()).filter(|&i| logical[i] != 1).collect();
            let expect_count: Vec<usize> = kept.iter().map(|&i| slice.count()[i]).collect();
            assert_eq!(translated.count(), expect_count);
        }
    }

    #[test]
    fn test_phantom_axes() {
        assert_eq!(phantom_axes(&[4, 4], &[1, 4, 4]), Ok(vec![0]));
        assert_eq!(phantom_axes(&[4, 3], &[4, 1, 3, 1]), Ok(vec![1, 3]));
        assert_eq!(phantom_axes(&[4, 4], &[4, 4]), Ok(vec![]));
        assert_eq!(phantom_axes(&[4, 2], &[2, 4]), Err(CoreError::ShapeMismatch));
    }
}
